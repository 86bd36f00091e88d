//! Subscription streamer.
//!
//! Forwards a user's personal events to one connected device until the
//! connection is cancelled or the subscription ends.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::{BusError, EventBus};
use crate::events::{is_subject_token, SubjectScheme};
use crate::model::Project;

/// Errors from delivering one project to a client connection.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The connection is gone. Ends the stream normally.
    #[error("Sink closed")]
    Closed,

    /// A transient send failure. The stream keeps going.
    #[error("Sink send failed: {0}")]
    Send(String),
}

/// Errors that prevent a stream from starting.
#[derive(Debug, thiserror::Error)]
pub enum StreamerError {
    #[error("Invalid stream request: {0}")]
    InvalidArgument(String),

    #[error("Subscription failed: {0}")]
    Subscribe(#[from] BusError),
}

/// Outbound side of a streaming client connection.
#[async_trait]
pub trait ProjectSink: Send + Sync {
    async fn send(&self, project: Project) -> Result<(), SinkError>;
}

#[async_trait]
impl ProjectSink for mpsc::Sender<Project> {
    async fn send(&self, project: Project) -> Result<(), SinkError> {
        mpsc::Sender::send(self, project)
            .await
            .map_err(|_| SinkError::Closed)
    }
}

/// Bridges personal subjects to client connections.
pub struct SubscriptionStreamer {
    bus: Arc<dyn EventBus>,
    subjects: SubjectScheme,
}

impl SubscriptionStreamer {
    pub fn new(bus: Arc<dyn EventBus>, subjects: SubjectScheme) -> Self {
        Self { bus, subjects }
    }

    /// Forward every project event of `user_id` to `sink`.
    ///
    /// Returns once `cancel` fires, the subscription ends, or the sink
    /// reports `Closed`. The subscription is released in every case.
    pub async fn stream(
        &self,
        user_id: &str,
        device_id: &str,
        sink: &dyn ProjectSink,
        cancel: &CancellationToken,
    ) -> Result<(), StreamerError> {
        for (field, value) in [("user_id", user_id), ("device_id", device_id)] {
            if !is_subject_token(value) {
                return Err(StreamerError::InvalidArgument(format!(
                    "{field} must be a single subject token, got {value:?}"
                )));
            }
        }

        let topic = self.subjects.personal_topic(user_id, device_id);
        let subscription = cancel.child_token();
        let _release = subscription.clone().drop_guard();

        let mut events = self.bus.subscribe(&topic.subject, subscription).await?;
        info!(subject = %topic.subject, key = %topic.key, "Streaming user events");

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(key = %topic.key, "Stream cancelled");
                    break;
                }
                next = events.next() => match next {
                    Some(event) => event,
                    None => {
                        debug!(key = %topic.key, "Subscription ended");
                        break;
                    }
                },
            };

            // A full client buffer must not outlive cancellation
            let sent = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(key = %topic.key, "Stream cancelled while sending");
                    break;
                }
                sent = sink.send(event.project) => sent,
            };

            match sent {
                Ok(()) => {}
                Err(SinkError::Closed) => {
                    debug!(key = %topic.key, "Client connection closed");
                    break;
                }
                Err(e) => {
                    warn!(key = %topic.key, event_id = %event.id, error = %e, "Failed to forward project");
                }
            }
        }

        info!(key = %topic.key, "User event stream finished");
        Ok(())
    }
}
