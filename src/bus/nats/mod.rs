//! NATS core event bus implementation.
//!
//! Events travel as JSON on plain NATS subjects; queue-group subscriptions
//! map onto NATS queue groups. Delivery is at most once (no JetStream).

use async_nats::{Client, Subscriber};
use async_trait::async_trait;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{BusError, EventBus, EventStream, Result};
use crate::events::Event;

/// NATS implementation of EventBus.
pub struct NatsEventBus {
    client: Client,
}

impl NatsEventBus {
    /// Wrap an existing NATS connection.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect to a NATS server.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = async_nats::connect(url)
            .await
            .map_err(|e| BusError::Connection(e.to_string()))?;
        Ok(Self::new(client))
    }

    /// Underlying client, for flushing or sharing the connection.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Decode a subscriber into an event stream that ends on cancellation.
///
/// Dropping the stream drops the subscriber, which unsubscribes.
fn event_stream(subscriber: Subscriber, cancel: CancellationToken) -> EventStream {
    let stream = subscriber
        .take_until(cancel.cancelled_owned())
        .filter_map(|message| async move {
            match serde_json::from_slice::<Event>(&message.payload) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(
                        subject = %message.subject,
                        error = %e,
                        "Skipping undecodable event"
                    );
                    None
                }
            }
        });
    Box::pin(stream)
}

#[async_trait]
impl EventBus for NatsEventBus {
    #[tracing::instrument(name = "bus.publish", skip_all, fields(subject = %subject))]
    async fn publish(&self, subject: &str, event: &Event) -> Result<()> {
        let payload = serde_json::to_vec(event)?;

        self.client
            .publish(subject.to_string(), payload.into())
            .await
            .map_err(|e| BusError::Publish(e.to_string()))?;

        debug!(subject = %subject, event_id = %event.id, "Published event to NATS");
        Ok(())
    }

    async fn subscribe(&self, subject: &str, cancel: CancellationToken) -> Result<EventStream> {
        let subscriber = self
            .client
            .subscribe(subject.to_string())
            .await
            .map_err(|e| BusError::Subscribe(e.to_string()))?;

        debug!(subject = %subject, "Subscribed to NATS subject");
        Ok(event_stream(subscriber, cancel))
    }

    async fn subscribe_group(
        &self,
        pattern: &str,
        group: &str,
        cancel: CancellationToken,
    ) -> Result<EventStream> {
        let subscriber = self
            .client
            .queue_subscribe(pattern.to_string(), group.to_string())
            .await
            .map_err(|e| BusError::Subscribe(e.to_string()))?;

        debug!(pattern = %pattern, group = %group, "Joined NATS queue group");
        Ok(event_stream(subscriber, cancel))
    }
}
