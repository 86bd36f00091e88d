//! Project aggregate.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::update::{ProjectUpdate, UpdateError, PROJECT_FIELDS};
use super::{new_id, now_millis, Task, Version};

/// A shared project and the tasks it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    /// Users other than the owner with edit access.
    pub participants: BTreeSet<String>,
    pub tasks: BTreeMap<String, Task>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: Version,
}

impl Project {
    /// Create a project with a fresh id and version.
    ///
    /// Participants are deduplicated and the owner is dropped from them.
    pub fn new<I, S>(name: impl Into<String>, owner_id: impl Into<String>, participants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let now = now_millis();
        let owner_id = owner_id.into();
        let participants = normalize_participants(&owner_id, participants);

        Self {
            id: new_id(),
            name: name.into(),
            owner_id,
            participants,
            tasks: BTreeMap::new(),
            created_at: now,
            updated_at: now,
            version: Version::generate(),
        }
    }

    pub fn with_name(&self, name: impl Into<String>) -> Self {
        let mut updated = self.clone();
        updated.name = name.into();
        updated.touch()
    }

    /// Hand ownership to another user. A new owner that was a participant
    /// stops being listed as one.
    pub fn with_owner_id(&self, owner_id: impl Into<String>) -> Self {
        let mut updated = self.clone();
        updated.owner_id = owner_id.into();
        updated.participants.remove(&updated.owner_id);
        updated.touch()
    }

    /// Replace the whole participant set.
    pub fn with_participants<I, S>(&self, participants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut updated = self.clone();
        updated.participants = normalize_participants(&updated.owner_id, participants);
        updated.touch()
    }

    /// Add or overwrite a task, keyed by its id.
    pub fn with_task(&self, task: Task) -> Self {
        let mut updated = self.clone();
        updated.tasks.insert(task.id.clone(), task);
        updated.touch()
    }

    /// Remove a task. Removing an unknown task still produces a new version.
    pub fn without_task(&self, task_id: &str) -> Self {
        let mut updated = self.clone();
        updated.tasks.remove(task_id);
        updated.touch()
    }

    /// Apply the fields selected by the update's mask.
    pub fn apply_update(&self, update: &ProjectUpdate) -> Result<Self, UpdateError> {
        let mut updated = self.clone();
        PROJECT_FIELDS.apply(&update.mask, &mut updated, update)?;
        updated.participants.remove(&updated.owner_id);
        Ok(updated.touch())
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.get(task_id)
    }

    pub fn is_owner(&self, user_id: &str) -> bool {
        self.owner_id == user_id
    }

    /// Owners and participants may read and edit tasks.
    pub fn can_edit(&self, user_id: &str) -> bool {
        self.is_owner(user_id) || self.participants.contains(user_id)
    }

    /// Every user that must be notified about a change: owner and
    /// participants, deduplicated.
    pub fn affected_users(&self) -> BTreeSet<&str> {
        std::iter::once(self.owner_id.as_str())
            .chain(self.participants.iter().map(String::as_str))
            .collect()
    }

    fn touch(mut self) -> Self {
        self.version = Version::generate();
        self.updated_at = now_millis();
        self
    }
}

fn normalize_participants<I, S>(owner_id: &str, participants: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    participants
        .into_iter()
        .map(Into::into)
        .filter(|p| p != owner_id)
        .collect()
}
