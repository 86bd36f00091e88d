//! Messaging and event bus configuration types.

use serde::Deserialize;

/// Default bounded channel capacity per in-process subscriber.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Messaging type discriminator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessagingType {
    /// In-process channels (single instance, no external broker).
    #[default]
    Channel,
    /// NATS core messaging.
    Nats,
}

/// Messaging configuration (discriminated union).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    /// Messaging type discriminator.
    #[serde(rename = "type")]
    pub messaging_type: MessagingType,
    /// Channel-specific configuration.
    pub channel: ChannelConfig,
    /// NATS-specific configuration.
    pub nats: NatsConfig,
}

/// In-process channel bus configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Buffered events per subscriber before publishers wait.
    pub capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// NATS-specific configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    /// NATS server URL.
    pub url: String,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
        }
    }
}
