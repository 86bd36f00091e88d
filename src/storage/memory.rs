//! In-memory ProjectStore implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{ensure_same_id, ProjectStore, Result, StorageError};
use crate::model::Project;

/// Project store backed by a map.
///
/// `replace` compares and swaps under the write lock, so concurrent replaces
/// of the same version have exactly one winner.
#[derive(Default)]
pub struct MemoryProjectStore {
    projects: RwLock<HashMap<String, Project>>,
}

impl MemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored projects.
    pub async fn len(&self) -> usize {
        self.projects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.projects.read().await.is_empty()
    }
}

#[async_trait]
impl ProjectStore for MemoryProjectStore {
    async fn by_id(&self, id: &str) -> Result<Project> {
        self.projects
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound { id: id.to_string() })
    }

    async fn by_participant(&self, user_id: &str) -> Result<Vec<Project>> {
        Ok(self
            .projects
            .read()
            .await
            .values()
            .filter(|p| p.can_edit(user_id))
            .cloned()
            .collect())
    }

    async fn insert(&self, project: &Project) -> Result<()> {
        let mut projects = self.projects.write().await;
        if projects.contains_key(&project.id) {
            return Err(StorageError::AlreadyExists {
                id: project.id.clone(),
            });
        }
        projects.insert(project.id.clone(), project.clone());
        debug!(project_id = %project.id, "Inserted project");
        Ok(())
    }

    async fn replace(&self, previous: &Project, next: &Project) -> Result<()> {
        ensure_same_id(previous, next)?;

        let mut projects = self.projects.write().await;
        let stored = projects
            .get_mut(&previous.id)
            .ok_or_else(|| StorageError::NotFound {
                id: previous.id.clone(),
            })?;

        if stored.version != previous.version {
            debug!(
                project_id = %previous.id,
                expected = %previous.version,
                actual = %stored.version,
                "Replace lost version race"
            );
            return Err(StorageError::VersionMismatch {
                id: previous.id.clone(),
                expected: previous.version.clone(),
            });
        }

        *stored = next.clone();
        debug!(project_id = %next.id, version = %next.version, "Replaced project");
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        if self.projects.write().await.remove(id).is_some() {
            debug!(project_id = %id, "Deleted project");
        }
        Ok(())
    }
}
