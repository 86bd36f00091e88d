//! MongoDB ProjectStore implementation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{self, doc};
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::{Client, Collection, IndexModel};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ensure_same_id, ProjectStore, Result, StorageError};
use crate::model::{Project, Task, Version};

/// Default collection name.
pub const PROJECTS_COLLECTION: &str = "projects";

/// Server error code for unique index violations.
const DUPLICATE_KEY_CODE: i32 = 11000;

/// MongoDB implementation of ProjectStore.
///
/// One document per project, keyed by `_id`; tasks are embedded. `replace`
/// is a single `find_one_and_replace` filtered on id and version, so the
/// compare-and-swap is atomic on the server.
pub struct MongoProjectStore {
    projects: Collection<ProjectDocument>,
}

impl MongoProjectStore {
    /// Create a new MongoDB project store and ensure its indexes.
    pub async fn new(client: &Client, database_name: &str, collection_name: &str) -> Result<Self> {
        let projects = client.database(database_name).collection(collection_name);

        let store = Self { projects };
        store.init().await?;

        Ok(store)
    }

    /// Initialize indexes for membership queries.
    async fn init(&self) -> Result<()> {
        let owner_index = IndexModel::builder().keys(doc! { "owner_id": 1 }).build();
        self.projects.create_index(owner_index).await?;

        // Multikey index over the participant array
        let participants_index = IndexModel::builder()
            .keys(doc! { "participants": 1 })
            .build();
        self.projects.create_index(participants_index).await?;

        Ok(())
    }
}

#[async_trait]
impl ProjectStore for MongoProjectStore {
    async fn by_id(&self, id: &str) -> Result<Project> {
        self.projects
            .find_one(doc! { "_id": id })
            .await?
            .map(Project::from)
            .ok_or_else(|| StorageError::NotFound { id: id.to_string() })
    }

    async fn by_participant(&self, user_id: &str) -> Result<Vec<Project>> {
        let filter = doc! {
            "$or": [
                { "owner_id": user_id },
                { "participants": user_id },
            ]
        };

        let documents: Vec<ProjectDocument> = self.projects.find(filter).await?.try_collect().await?;

        debug!(user_id = %user_id, count = documents.len(), "Loaded user projects");

        Ok(documents.into_iter().map(Project::from).collect())
    }

    async fn insert(&self, project: &Project) -> Result<()> {
        self.projects
            .insert_one(ProjectDocument::from(project))
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    return StorageError::AlreadyExists {
                        id: project.id.clone(),
                    };
                }
                StorageError::from(e)
            })?;

        Ok(())
    }

    async fn replace(&self, previous: &Project, next: &Project) -> Result<()> {
        ensure_same_id(previous, next)?;

        let filter = doc! { "_id": &previous.id, "version": previous.version.as_str() };
        let replaced = self
            .projects
            .find_one_and_replace(filter, ProjectDocument::from(next))
            .await?;

        if replaced.is_some() {
            return Ok(());
        }

        // Nothing matched id+version: tell a missing project from a lost race
        let exists = self
            .projects
            .count_documents(doc! { "_id": &previous.id })
            .await?
            > 0;

        if exists {
            Err(StorageError::VersionMismatch {
                id: previous.id.clone(),
                expected: previous.version.clone(),
            })
        } else {
            Err(StorageError::NotFound {
                id: previous.id.clone(),
            })
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.projects.delete_one(doc! { "_id": id }).await?;
        Ok(())
    }
}

fn is_duplicate_key(error: &MongoError) -> bool {
    matches!(
        *error.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref write_err)) if write_err.code == DUPLICATE_KEY_CODE
    )
}

/// Stored form of a [`Project`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ProjectDocument {
    #[serde(rename = "_id")]
    id: String,
    version: String,
    name: String,
    owner_id: String,
    participants: Vec<String>,
    tasks: BTreeMap<String, TaskDocument>,
    created_at: bson::DateTime,
    updated_at: bson::DateTime,
}

/// Stored form of a [`Task`], embedded in its project document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TaskDocument {
    id: String,
    version: String,
    title: String,
    description: String,
    tags: Vec<String>,
    is_important: bool,
    is_finished: bool,
    created_at: bson::DateTime,
    updated_at: bson::DateTime,
}

impl From<&Project> for ProjectDocument {
    fn from(p: &Project) -> Self {
        Self {
            id: p.id.clone(),
            version: p.version.as_str().to_string(),
            name: p.name.clone(),
            owner_id: p.owner_id.clone(),
            participants: p.participants.iter().cloned().collect(),
            tasks: p
                .tasks
                .iter()
                .map(|(id, task)| (id.clone(), TaskDocument::from(task)))
                .collect(),
            created_at: to_bson_datetime(p.created_at),
            updated_at: to_bson_datetime(p.updated_at),
        }
    }
}

impl From<ProjectDocument> for Project {
    fn from(d: ProjectDocument) -> Self {
        Self {
            id: d.id,
            version: Version::from_raw(d.version),
            name: d.name,
            owner_id: d.owner_id,
            participants: d.participants.into_iter().collect(),
            tasks: d
                .tasks
                .into_iter()
                .map(|(id, task)| (id, Task::from(task)))
                .collect(),
            created_at: from_bson_datetime(d.created_at),
            updated_at: from_bson_datetime(d.updated_at),
        }
    }
}

impl From<&Task> for TaskDocument {
    fn from(t: &Task) -> Self {
        Self {
            id: t.id.clone(),
            version: t.version.as_str().to_string(),
            title: t.title.clone(),
            description: t.description.clone(),
            tags: t.tags.iter().cloned().collect(),
            is_important: t.is_important,
            is_finished: t.is_finished,
            created_at: to_bson_datetime(t.created_at),
            updated_at: to_bson_datetime(t.updated_at),
        }
    }
}

impl From<TaskDocument> for Task {
    fn from(d: TaskDocument) -> Self {
        Self {
            id: d.id,
            version: Version::from_raw(d.version),
            title: d.title,
            description: d.description,
            tags: d.tags.into_iter().collect(),
            is_important: d.is_important,
            is_finished: d.is_finished,
            created_at: from_bson_datetime(d.created_at),
            updated_at: from_bson_datetime(d.updated_at),
        }
    }
}

fn to_bson_datetime(dt: DateTime<Utc>) -> bson::DateTime {
    bson::DateTime::from_millis(dt.timestamp_millis())
}

/// Out-of-range stored timestamps fall back to the epoch.
fn from_bson_datetime(dt: bson::DateTime) -> DateTime<Utc> {
    let millis = dt.timestamp_millis();
    DateTime::from_timestamp_millis(millis).unwrap_or_else(|| {
        warn!(millis, "Stored timestamp out of range, using epoch");
        DateTime::<Utc>::default()
    })
}
