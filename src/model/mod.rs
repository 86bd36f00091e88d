//! Versioned value types.
//!
//! `Project` is the aggregate: it owns its `Task`s and is the unit of storage
//! and concurrency control. Values are immutable by convention; every
//! `with_*` operation returns a new value carrying a fresh [`Version`] and
//! `updated_at`.

mod project;
mod task;
mod update;
mod version;

pub use project::Project;
pub use task::{NewTask, Task};
pub use update::{
    FieldMask, FieldTable, ProjectUpdate, TaskUpdate, UpdateError, PROJECT_FIELDS, TASK_FIELDS,
};
pub use version::{new_id, Version};

use chrono::{DateTime, SubsecRound, Utc};

/// Current time truncated to millisecond precision.
///
/// Timestamps round-trip through JSON and BSON without drift at this precision.
pub fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}
