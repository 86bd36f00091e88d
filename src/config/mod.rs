//! Application configuration.
//!
//! Aggregates configuration from all modules into a single Config struct
//! that can be loaded from YAML files or environment variables.

mod messaging;
mod service;
mod storage;

pub use messaging::{
    ChannelConfig, MessagingConfig, MessagingType, NatsConfig, DEFAULT_CHANNEL_CAPACITY,
};
pub use service::{
    DistributorConfig, LogFormat, LoggingConfig, ServiceConfig, DEFAULT_DISTRIBUTOR_GROUP,
};
pub use storage::{MongodbConfig, StorageConfig, StorageType};

use serde::Deserialize;

use crate::events::is_subject_token;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "TODO_SV_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "TODO_SV";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "TODO_SV_LOG";

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service identity and shutdown.
    pub service: ServiceConfig,
    /// Project store backend.
    pub storage: StorageConfig,
    /// Event bus backend.
    pub messaging: MessagingConfig,
    /// User events distributor.
    pub distributor: DistributorConfig,
    /// Log level and format.
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix, sections
    ///    separated by `__` (`TODO_SV__STORAGE__TYPE=mongodb`)
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the runtime cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let name = &self.service.name;
        if !is_subject_token(name) {
            return Err(ConfigError::Invalid(format!(
                "service.name must be a single subject token, got {:?}",
                name
            )));
        }
        if self.messaging.channel.capacity == 0 {
            return Err(ConfigError::Invalid(
                "messaging.channel.capacity must be greater than zero".to_string(),
            ));
        }
        if self.distributor.enabled && self.distributor.group.is_empty() {
            return Err(ConfigError::Invalid(
                "distributor.group must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
