//! Event bus for project event delivery.
//!
//! This module contains:
//! - `EventBus` trait: subject-addressed publish, broadcast subscriptions
//!   and queue-group (competing consumer) subscriptions
//! - `BusError`: error kinds surfaced to callers
//! - Implementations: in-process channels, NATS

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{MessagingConfig, MessagingType};
use crate::events::Event;

#[cfg(feature = "channel")]
pub mod channel;
#[cfg(feature = "nats")]
pub mod nats;

#[cfg(feature = "channel")]
pub use channel::ChannelEventBus;
#[cfg(feature = "nats")]
pub use nats::NatsEventBus;

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;

/// Errors that can occur during bus operations.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Subscribe failed: {0}")]
    Subscribe(String),

    #[error("Event codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("Event bus closed")]
    Closed,
}

/// Events received by one subscription.
///
/// Ends when the subscription's cancellation token fires or the transport
/// goes away. Dropping it releases the subscription.
pub type EventStream = Pin<Box<dyn Stream<Item = Event> + Send>>;

/// Interface for subject-addressed event delivery.
///
/// Subjects are `.`-separated tokens; subscription patterns may use `*` for
/// one token and a trailing `>` for the rest (see
/// [`subject_matches`](crate::events::subject_matches)). Delivery is at most
/// once.
///
/// Implementations:
/// - `ChannelEventBus`: in-process, single instance
/// - `NatsEventBus`: NATS core subjects and queue groups
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish one event to a concrete subject.
    async fn publish(&self, subject: &str, event: &Event) -> Result<()>;

    /// Independent subscription: receives every event published to a
    /// matching subject.
    async fn subscribe(&self, subject: &str, cancel: CancellationToken) -> Result<EventStream>;

    /// Queue-group subscription: each matching event goes to exactly one
    /// subscriber sharing `(pattern, group)`.
    async fn subscribe_group(
        &self,
        pattern: &str,
        group: &str,
        cancel: CancellationToken,
    ) -> Result<EventStream>;
}

/// Initialize the event bus based on configuration.
pub async fn init_event_bus(
    config: &MessagingConfig,
) -> std::result::Result<Arc<dyn EventBus>, Box<dyn std::error::Error + Send + Sync>> {
    match config.messaging_type {
        MessagingType::Channel => {
            #[cfg(feature = "channel")]
            {
                info!(
                    messaging_type = "channel",
                    capacity = config.channel.capacity,
                    "Event bus initialized"
                );
                Ok(Arc::new(ChannelEventBus::with_capacity(
                    config.channel.capacity,
                )))
            }

            #[cfg(not(feature = "channel"))]
            {
                Err("Channel messaging requires the 'channel' feature. Rebuild with --features channel".into())
            }
        }
        MessagingType::Nats => {
            #[cfg(feature = "nats")]
            {
                let url = &config.nats.url;
                let client = crate::utils::bootstrap::connect_with_retry("nats", url, || {
                    async_nats::connect(url.as_str())
                })
                .await?;
                info!(messaging_type = "nats", url = %url, "Event bus initialized");
                Ok(Arc::new(NatsEventBus::new(client)))
            }

            #[cfg(not(feature = "nats"))]
            {
                Err("NATS messaging requires the 'nats' feature. Rebuild with --features nats".into())
            }
        }
    }
}
