//! Domain events published after every successful project mutation.

mod subject;

pub use subject::{
    is_subject_token, subject_matches, PersonalTopic, SubjectScheme, DEFAULT_SERVICE_NAME,
};

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{new_id, now_millis, Project};

/// Kind of change an [`Event`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    ProjectCreated,
    ProjectUpdated,
    ProjectDeleted,
}

impl EventType {
    /// Wire and subject token for this event type.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ProjectCreated => "PROJECT_CREATED",
            EventType::ProjectUpdated => "PROJECT_UPDATED",
            EventType::ProjectDeleted => "PROJECT_DELETED",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A project-level change notification.
///
/// Task changes are reported as `ProjectUpdated` carrying the whole project;
/// there are no task-scoped events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub project: Project,
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn new(event_type: EventType, project: Project) -> Self {
        Self {
            id: new_id(),
            event_type,
            project,
            created_at: now_millis(),
        }
    }

    pub fn project_created(project: Project) -> Self {
        Self::new(EventType::ProjectCreated, project)
    }

    pub fn project_updated(project: Project) -> Self {
        Self::new(EventType::ProjectUpdated, project)
    }

    pub fn project_deleted(project: Project) -> Self {
        Self::new(EventType::ProjectDeleted, project)
    }
}
