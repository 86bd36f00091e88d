//! Task value type. Tasks only exist inside their owning [`Project`].
//!
//! [`Project`]: super::Project

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::update::{TaskUpdate, UpdateError, TASK_FIELDS};
use super::{new_id, now_millis, Version};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub tags: BTreeSet<String>,
    pub is_important: bool,
    pub is_finished: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: Version,
}

/// Fields supplied when adding a task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub tags: BTreeSet<String>,
    pub is_important: bool,
}

impl Task {
    /// Create an unfinished task with a fresh id and version.
    pub fn new(new: NewTask) -> Self {
        let now = now_millis();
        Self {
            id: new_id(),
            title: new.title,
            description: new.description,
            tags: new.tags,
            is_important: new.is_important,
            is_finished: false,
            created_at: now,
            updated_at: now,
            version: Version::generate(),
        }
    }

    pub fn with_title(&self, title: impl Into<String>) -> Self {
        let mut updated = self.clone();
        updated.title = title.into();
        updated.touch()
    }

    pub fn with_description(&self, description: impl Into<String>) -> Self {
        let mut updated = self.clone();
        updated.description = description.into();
        updated.touch()
    }

    pub fn with_tags<I, S>(&self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut updated = self.clone();
        updated.tags = tags.into_iter().map(Into::into).collect();
        updated.touch()
    }

    pub fn with_finished(&self, is_finished: bool) -> Self {
        let mut updated = self.clone();
        updated.is_finished = is_finished;
        updated.touch()
    }

    pub fn with_important(&self, is_important: bool) -> Self {
        let mut updated = self.clone();
        updated.is_important = is_important;
        updated.touch()
    }

    /// Apply the fields selected by the update's mask.
    pub fn apply_update(&self, update: &TaskUpdate) -> Result<Self, UpdateError> {
        let mut updated = self.clone();
        TASK_FIELDS.apply(&update.mask, &mut updated, update)?;
        Ok(updated.touch())
    }

    fn touch(mut self) -> Self {
        self.version = Version::generate();
        self.updated_at = now_millis();
        self
    }
}
