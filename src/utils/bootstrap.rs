//! Bootstrap utilities for the todo-sv binary.

use std::future::Future;
use std::time::Duration;

use backon::Retryable;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::retry::connection_backoff;
use crate::config::{LogFormat, LoggingConfig, LOG_ENV_VAR};

/// Initialize tracing with the TODO_SV_LOG environment variable.
///
/// Falls back to `logging.level` when TODO_SV_LOG is not set.
pub fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let registry = tracing_subscriber::registry().with(filter);
    match logging.format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Connect to a backend with exponential backoff retry.
///
/// # Arguments
/// * `service_name` - Human-readable name for logging (e.g., "mongodb", "nats")
/// * `address` - The address being connected to
/// * `connect` - Async function that attempts to establish a connection
///
/// # Returns
/// The connected client on success, or the last error once retries run out.
pub async fn connect_with_retry<T, E, F, Fut>(
    service_name: &str,
    address: &str,
    connect: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let client = connect
        .retry(connection_backoff())
        .notify(|err: &E, dur: Duration| {
            warn!(
                service = %service_name,
                address = %address,
                error = %err,
                delay = ?dur,
                "Connection failed, retrying"
            );
        })
        .await?;

    info!(service = %service_name, address = %address, "Connected");
    Ok(client)
}

/// Config file path from `--config <path>` or `--config=<path>`.
pub fn parse_config_path<I>(args: I) -> Option<String>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next();
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return Some(path.to_string());
        }
    }
    None
}
