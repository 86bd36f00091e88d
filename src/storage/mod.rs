//! Project storage.
//!
//! This module contains:
//! - `ProjectStore` trait: persistence of `Project` aggregates with
//!   optimistic concurrency on `replace`
//! - `StorageError`: error kinds surfaced to callers
//! - Implementations: in-memory, MongoDB

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::{StorageConfig, StorageType};
use crate::model::{Project, Version};

pub mod memory;
#[cfg(feature = "mongodb")]
pub mod mongodb;

pub use memory::MemoryProjectStore;
#[cfg(feature = "mongodb")]
pub use self::mongodb::MongoProjectStore;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Project not found: {id}")]
    NotFound { id: String },

    #[error("Project already exists: {id}")]
    AlreadyExists { id: String },

    #[error("Project ids mismatch: previous={previous}, next={next}")]
    IdsMismatch { previous: String, next: String },

    #[error("Project version mismatch: id={id}, expected={expected}")]
    VersionMismatch { id: String, expected: Version },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[cfg(feature = "mongodb")]
    #[error("MongoDB error: {0}")]
    Mongo(#[from] ::mongodb::error::Error),
}

impl StorageError {
    /// True for errors caused by a concurrent writer. The caller should
    /// re-read the current version, recompute its change and retry.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::VersionMismatch { .. })
    }

    /// True for the error kinds that are part of the store's contract, as
    /// opposed to backend failures.
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            StorageError::NotFound { .. }
                | StorageError::AlreadyExists { .. }
                | StorageError::IdsMismatch { .. }
                | StorageError::VersionMismatch { .. }
        )
    }
}

/// Interface for project persistence.
///
/// Implementations:
/// - `MemoryProjectStore`: in-process map, for tests and single-instance use
/// - `MongoProjectStore`: MongoDB collection
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Fetch a project by id.
    async fn by_id(&self, id: &str) -> Result<Project>;

    /// Every project the user owns or participates in. Order is unspecified.
    async fn by_participant(&self, user_id: &str) -> Result<Vec<Project>>;

    /// Store a new project. Fails with `AlreadyExists` if the id is taken.
    async fn insert(&self, project: &Project) -> Result<()>;

    /// Optimistic-concurrency replace.
    ///
    /// Succeeds only if the stored version equals `previous.version`; the
    /// stored document then becomes `next` verbatim. Checks, in order:
    /// `IdsMismatch`, `NotFound`, `VersionMismatch`.
    async fn replace(&self, previous: &Project, next: &Project) -> Result<()>;

    /// Remove a project with all its tasks. Deleting a missing id succeeds.
    async fn delete(&self, id: &str) -> Result<()>;
}

/// Reject cross-entity replaces before touching storage.
pub(crate) fn ensure_same_id(previous: &Project, next: &Project) -> Result<()> {
    if previous.id != next.id {
        return Err(StorageError::IdsMismatch {
            previous: previous.id.clone(),
            next: next.id.clone(),
        });
    }
    Ok(())
}

/// Initialize storage based on configuration.
pub async fn init_storage(
    config: &StorageConfig,
) -> std::result::Result<Arc<dyn ProjectStore>, Box<dyn std::error::Error + Send + Sync>> {
    match config.storage_type {
        StorageType::Memory => {
            info!(storage_type = "memory", "Project store initialized");
            Ok(Arc::new(MemoryProjectStore::new()))
        }
        StorageType::Mongodb => {
            #[cfg(feature = "mongodb")]
            {
                let mongo = &config.mongodb;
                let client = crate::utils::bootstrap::connect_with_retry(
                    "mongodb",
                    &mongo.uri,
                    || ::mongodb::Client::with_uri_str(&mongo.uri),
                )
                .await?;
                let store =
                    MongoProjectStore::new(&client, &mongo.database, &mongo.collection).await?;
                info!(
                    storage_type = "mongodb",
                    database = %mongo.database,
                    collection = %mongo.collection,
                    "Project store initialized"
                );
                Ok(Arc::new(store))
            }

            #[cfg(not(feature = "mongodb"))]
            {
                Err("MongoDB storage requires the 'mongodb' feature. Rebuild with --features mongodb".into())
            }
        }
    }
}
