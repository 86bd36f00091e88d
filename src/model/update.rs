//! Field-mask driven partial updates.
//!
//! Each entity type declares a [`FieldTable`] mapping field tags to the
//! function that copies that field from an update request. A mask selects
//! which tags to apply; the empty mask applies every field.

use std::collections::BTreeSet;

use super::{Project, Task};

/// Errors raised while applying a partial update.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpdateError {
    #[error("Unknown {entity} field in update mask: {field}")]
    UnknownField { entity: &'static str, field: String },
}

/// Set of field tags selected for an update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMask(BTreeSet<String>);

impl FieldMask {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for FieldMask {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Copies one field from an update request onto the target.
pub type ApplyFn<T, U> = fn(&mut T, &U);

/// Recognised field tags for an entity type and how to apply each.
pub struct FieldTable<T: 'static, U: 'static> {
    entity: &'static str,
    fields: &'static [(&'static str, ApplyFn<T, U>)],
}

impl<T: 'static, U: 'static> FieldTable<T, U> {
    pub fn tags(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|(tag, _)| *tag)
    }

    /// Apply the masked fields of `update` to `target`.
    ///
    /// Nothing is applied if the mask names an unknown tag.
    pub fn apply(&self, mask: &FieldMask, target: &mut T, update: &U) -> Result<(), UpdateError> {
        if let Some(unknown) = mask.iter().find(|tag| !self.tags().any(|t| t == *tag)) {
            return Err(UpdateError::UnknownField {
                entity: self.entity,
                field: unknown.to_string(),
            });
        }

        for (tag, apply) in self.fields {
            if mask.is_empty() || mask.contains(tag) {
                apply(target, update);
            }
        }

        Ok(())
    }
}

/// Requested changes to a project's own fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectUpdate {
    pub mask: FieldMask,
    pub name: String,
    pub owner_id: String,
    pub participants: BTreeSet<String>,
}

/// Requested changes to a task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskUpdate {
    pub mask: FieldMask,
    pub title: String,
    pub description: String,
    pub tags: BTreeSet<String>,
    pub is_important: bool,
    pub is_finished: bool,
}

pub static PROJECT_FIELDS: FieldTable<Project, ProjectUpdate> = FieldTable {
    entity: "project",
    fields: &[
        ("name", apply_project_name),
        ("owner_id", apply_project_owner_id),
        ("participants", apply_project_participants),
    ],
};

pub static TASK_FIELDS: FieldTable<Task, TaskUpdate> = FieldTable {
    entity: "task",
    fields: &[
        ("title", apply_task_title),
        ("description", apply_task_description),
        ("is_important", apply_task_is_important),
        ("is_finished", apply_task_is_finished),
        ("tags", apply_task_tags),
    ],
};

fn apply_project_name(p: &mut Project, u: &ProjectUpdate) {
    p.name = u.name.clone();
}

fn apply_project_owner_id(p: &mut Project, u: &ProjectUpdate) {
    p.owner_id = u.owner_id.clone();
}

fn apply_project_participants(p: &mut Project, u: &ProjectUpdate) {
    p.participants = u.participants.clone();
}

fn apply_task_title(t: &mut Task, u: &TaskUpdate) {
    t.title = u.title.clone();
}

fn apply_task_description(t: &mut Task, u: &TaskUpdate) {
    t.description = u.description.clone();
}

fn apply_task_is_important(t: &mut Task, u: &TaskUpdate) {
    t.is_important = u.is_important;
}

fn apply_task_is_finished(t: &mut Task, u: &TaskUpdate) {
    t.is_finished = u.is_finished;
}

fn apply_task_tags(t: &mut Task, u: &TaskUpdate) {
    t.tags = u.tags.clone();
}
