//! Service, distributor and logging configuration types.

use std::time::Duration;

use serde::Deserialize;

use crate::events::DEFAULT_SERVICE_NAME;

/// Default queue group shared by distributor instances.
pub const DEFAULT_DISTRIBUTOR_GROUP: &str = "user-worker-group";

/// Service identity and lifecycle settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Service name; also the first token of every subject.
    pub name: String,
    /// How long shutdown waits for background tasks.
    pub shutdown_timeout_secs: u64,
}

impl ServiceConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_SERVICE_NAME.to_string(),
            shutdown_timeout_secs: 5,
        }
    }
}

/// User events distributor settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DistributorConfig {
    /// Run a distributor in this process.
    pub enabled: bool,
    /// Queue group name. Instances sharing it split the event stream.
    pub group: String,
}

impl Default for DistributorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            group: DEFAULT_DISTRIBUTOR_GROUP.to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging settings.
///
/// `level` is used only when the log env var is unset.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}
