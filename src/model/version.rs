//! Opaque, time-ordered version tokens.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Version token used for optimistic concurrency control.
///
/// Backed by a UUIDv7 in canonical lowercase form. Within a process, tokens
/// generated later compare greater, so staleness is decided by `Ord` alone
/// without a separate sequence counter.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(String);

impl Version {
    /// Generate a fresh token.
    pub fn generate() -> Self {
        Self(new_id())
    }

    /// Wrap a token previously produced by [`Version::generate`] (e.g. read
    /// back from storage).
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generate a unique, time-sortable identifier.
///
/// Used for project, task and event ids.
pub fn new_id() -> String {
    Uuid::now_v7().to_string()
}
