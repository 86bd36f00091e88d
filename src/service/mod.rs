//! Project command service.
//!
//! Every mutation is a store write followed by one event publication.
//! Read-modify-replace operations re-read and retry when a concurrent writer
//! wins the version race. Publication is best effort: a failed publish is
//! logged and the already committed write stands.

mod error;

pub use error::{ErrorCode, Result, ServiceError};

use std::sync::Arc;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tracing::{debug, info, warn};

use crate::bus::EventBus;
use crate::events::{is_subject_token, Event, SubjectScheme};
use crate::model::{NewTask, Project, ProjectUpdate, Task, TaskUpdate};
use crate::storage::ProjectStore;
use crate::utils::retry::conflict_backoff;

/// Application layer over a [`ProjectStore`] and an [`EventBus`].
pub struct ProjectService {
    store: Arc<dyn ProjectStore>,
    bus: Arc<dyn EventBus>,
    subjects: SubjectScheme,
    backoff: ExponentialBuilder,
}

impl ProjectService {
    pub fn new(store: Arc<dyn ProjectStore>, bus: Arc<dyn EventBus>, subjects: SubjectScheme) -> Self {
        Self {
            store,
            bus,
            subjects,
            backoff: conflict_backoff(),
        }
    }

    /// Override the conflict retry policy.
    pub fn with_backoff(mut self, backoff: ExponentialBuilder) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn store(&self) -> &Arc<dyn ProjectStore> {
        &self.store
    }

    /// Create a project owned by `owner_id` and announce it.
    pub async fn create_project<I, S>(
        &self,
        name: &str,
        owner_id: &str,
        participants: I,
    ) -> Result<Project>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        require("name", name)?;
        require("owner_id", owner_id)?;

        let project = Project::new(name, owner_id, participants);
        require_user_ids(&project)?;
        self.store.insert(&project).await?;

        info!(project_id = %project.id, owner_id = %owner_id, "Project created");
        self.publish(Event::project_created(project.clone())).await;
        Ok(project)
    }

    /// Fetch a project the user can see.
    pub async fn get_project(&self, user_id: &str, project_id: &str) -> Result<Project> {
        require("user_id", user_id)?;
        require("project_id", project_id)?;

        let project = self.store.by_id(project_id).await?;
        if !project.can_edit(user_id) {
            return Err(denied(user_id, project_id, "read"));
        }
        Ok(project)
    }

    /// Every project the user owns or participates in.
    pub async fn all_projects(&self, user_id: &str) -> Result<Vec<Project>> {
        require("user_id", user_id)?;
        Ok(self.store.by_participant(user_id).await?)
    }

    /// Apply a masked update. Owner only.
    pub async fn update_project(
        &self,
        user_id: &str,
        project_id: &str,
        update: &ProjectUpdate,
    ) -> Result<Project> {
        require("user_id", user_id)?;
        require("project_id", project_id)?;

        let updated = self
            .mutate(project_id, |current| {
                if !current.is_owner(user_id) {
                    return Err(denied(user_id, project_id, "update"));
                }
                let next = current.apply_update(update)?;
                require("name", &next.name)?;
                require_user_ids(&next)?;
                Ok(next)
            })
            .await?;

        self.publish(Event::project_updated(updated.clone())).await;
        Ok(updated)
    }

    /// Add a task to a project the user can edit.
    pub async fn add_task(&self, user_id: &str, project_id: &str, new_task: NewTask) -> Result<Task> {
        require("user_id", user_id)?;
        require("project_id", project_id)?;
        require("title", &new_task.title)?;

        // Built once so retries insert the same task
        let task = Task::new(new_task);
        let updated = self
            .mutate(project_id, |current| {
                if !current.can_edit(user_id) {
                    return Err(denied(user_id, project_id, "edit"));
                }
                Ok(current.with_task(task.clone()))
            })
            .await?;

        debug!(project_id = %project_id, task_id = %task.id, "Task added");
        self.publish(Event::project_updated(updated)).await;
        Ok(task)
    }

    /// Apply a masked task update.
    pub async fn update_task(
        &self,
        user_id: &str,
        project_id: &str,
        task_id: &str,
        update: &TaskUpdate,
    ) -> Result<Task> {
        require("user_id", user_id)?;
        require("project_id", project_id)?;
        require("task_id", task_id)?;

        let updated = self
            .mutate(project_id, |current| {
                if !current.can_edit(user_id) {
                    return Err(denied(user_id, project_id, "edit"));
                }
                let task = current
                    .task(task_id)
                    .ok_or_else(|| task_not_found(project_id, task_id))?;
                let next = task.apply_update(update)?;
                require("title", &next.title)?;
                Ok(current.with_task(next))
            })
            .await?;

        let task = updated
            .task(task_id)
            .cloned()
            .ok_or_else(|| task_not_found(project_id, task_id))?;

        self.publish(Event::project_updated(updated)).await;
        Ok(task)
    }

    /// Remove a task. Removing a task that is already gone succeeds without
    /// a write.
    pub async fn delete_task(&self, user_id: &str, project_id: &str, task_id: &str) -> Result<()> {
        require("user_id", user_id)?;
        require("project_id", project_id)?;
        require("task_id", task_id)?;

        let result = self
            .mutate(project_id, |current| {
                if !current.can_edit(user_id) {
                    return Err(denied(user_id, project_id, "edit"));
                }
                if current.task(task_id).is_none() {
                    return Err(task_not_found(project_id, task_id));
                }
                Ok(current.without_task(task_id))
            })
            .await;

        match result {
            Ok(updated) => {
                self.publish(Event::project_updated(updated)).await;
                Ok(())
            }
            Err(ServiceError::TaskNotFound { .. }) => {
                debug!(project_id = %project_id, task_id = %task_id, "Task already gone");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Delete a project with its tasks. Owner only.
    pub async fn delete_project(&self, user_id: &str, project_id: &str) -> Result<()> {
        require("user_id", user_id)?;
        require("project_id", project_id)?;

        let project = self.store.by_id(project_id).await?;
        if !project.is_owner(user_id) {
            return Err(denied(user_id, project_id, "delete"));
        }

        self.store.delete(project_id).await?;

        info!(project_id = %project_id, "Project deleted");
        self.publish(Event::project_deleted(project)).await;
        Ok(())
    }

    /// Read, transform and conditionally replace, retrying on version
    /// conflicts with a fresh read each attempt.
    async fn mutate<F>(&self, project_id: &str, transform: F) -> Result<Project>
    where
        F: Fn(&Project) -> Result<Project> + Send + Sync,
    {
        (|| async {
            let current = self.store.by_id(project_id).await?;
            let next = transform(&current)?;
            self.store.replace(&current, &next).await?;
            Ok(next)
        })
        .retry(self.backoff)
        .when(ServiceError::is_conflict)
        .notify(|err: &ServiceError, dur: Duration| {
            debug!(project_id = %project_id, error = %err, delay = ?dur, "Version conflict, retrying");
        })
        .await
    }

    async fn publish(&self, event: Event) {
        let subject = self
            .subjects
            .project_subject(event.event_type, &event.project.id);
        if let Err(e) = self.bus.publish(&subject, &event).await {
            warn!(
                subject = %subject,
                event_id = %event.id,
                error = %e,
                "Failed to publish project event"
            );
        }
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ServiceError::InvalidArgument(format!("{field} is required")));
    }
    Ok(())
}

/// Owner and participant ids name personal subjects, so each must be a
/// single literal subject token.
fn require_user_ids(project: &Project) -> Result<()> {
    for (field, id) in std::iter::once(("owner_id", &project.owner_id))
        .chain(project.participants.iter().map(|p| ("participants", p)))
    {
        if !is_subject_token(id) {
            return Err(ServiceError::InvalidArgument(format!(
                "{field} must be a single subject token, got {id:?}"
            )));
        }
    }
    Ok(())
}

fn denied(user_id: &str, project_id: &str, action: &'static str) -> ServiceError {
    ServiceError::PermissionDenied {
        user_id: user_id.to_string(),
        project_id: project_id.to_string(),
        action,
    }
}

fn task_not_found(project_id: &str, task_id: &str) -> ServiceError {
    ServiceError::TaskNotFound {
        project_id: project_id.to_string(),
        task_id: task_id.to_string(),
    }
}
