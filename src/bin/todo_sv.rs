//! todo-sv: project service host
//!
//! Checks the configured project store, connects the event bus and runs the
//! user events distributor until shutdown.
//!
//! ## Configuration
//! ```yaml
//! service:
//!   name: todo-sv
//!   shutdown_timeout_secs: 5
//! storage:
//!   type: mongodb
//!   mongodb:
//!     uri: mongodb://localhost:27017
//!     database: todo
//! messaging:
//!   type: nats
//!   nats:
//!     url: nats://localhost:4222
//! distributor:
//!   group: user-worker-group
//! ```
//!
//! Config file: `--config <path>` or TODO_SV_CONFIG. Overrides:
//! `TODO_SV__SECTION__KEY`. Log filter: TODO_SV_LOG.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use todo_sv::bus::init_event_bus;
use todo_sv::config::Config;
use todo_sv::distributor::UserEventsDistributor;
use todo_sv::events::SubjectScheme;
use todo_sv::storage::init_storage;
use todo_sv::utils::bootstrap::{init_tracing, parse_config_path};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = parse_config_path(std::env::args().skip(1));
    let config = Config::load(config_path.as_deref())?;
    init_tracing(&config.logging);

    info!(
        service = %config.service.name,
        storage = ?config.storage.storage_type,
        messaging = ?config.messaging.messaging_type,
        "todo-sv starting"
    );

    let subjects = SubjectScheme::new(&config.service.name);
    // Fail fast on an unreachable store; connecting also creates its indexes
    init_storage(&config.storage).await.map_err(|e| e.to_string())?;
    let bus = init_event_bus(&config.messaging)
        .await
        .map_err(|e| e.to_string())?;

    let cancel = CancellationToken::new();

    let distributor = if config.distributor.enabled {
        let distributor =
            UserEventsDistributor::new(&config.distributor.group, subjects, Arc::clone(&bus));
        let cancel = cancel.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = distributor.run(cancel).await {
                error!(error = %e, "User events distributor failed");
            }
        }))
    } else {
        info!("User events distributor disabled");
        None
    };

    info!("todo-sv ready");
    wait_for_shutdown().await?;

    info!("Shutting down");
    cancel.cancel();

    if let Some(handle) = distributor {
        let timeout = config.service.shutdown_timeout();
        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "Distributor task panicked"),
            Err(_) => warn!(timeout = ?timeout, "Distributor did not stop in time"),
        }
    }

    info!("todo-sv stopped");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
