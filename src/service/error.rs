//! Service error kinds and their client-facing classification.

use std::fmt;

use crate::model::UpdateError;
use crate::storage::StorageError;

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Errors returned by [`ProjectService`](super::ProjectService).
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("User {user_id} may not {action} project {project_id}")]
    PermissionDenied {
        user_id: String,
        project_id: String,
        action: &'static str,
    },

    #[error("Task {task_id} not found in project {project_id}")]
    TaskNotFound { project_id: String, task_id: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<UpdateError> for ServiceError {
    fn from(e: UpdateError) -> Self {
        ServiceError::InvalidArgument(e.to_string())
    }
}

impl ServiceError {
    /// Client-facing status class of this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            ServiceError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            ServiceError::PermissionDenied { .. } => ErrorCode::PermissionDenied,
            ServiceError::TaskNotFound { .. } => ErrorCode::NotFound,
            ServiceError::Storage(e) => match e {
                StorageError::NotFound { .. } => ErrorCode::NotFound,
                StorageError::AlreadyExists { .. } => ErrorCode::AlreadyExists,
                StorageError::IdsMismatch { .. } => ErrorCode::InvalidArgument,
                StorageError::VersionMismatch { .. } => ErrorCode::Aborted,
                _ => ErrorCode::Internal,
            },
        }
    }

    /// A concurrent writer won; re-reading and retrying may succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ServiceError::Storage(e) if e.is_conflict())
    }
}

/// Status classes a wire layer maps onto its own codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidArgument,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    /// Optimistic concurrency conflict; the client should re-read and retry.
    Aborted,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::AlreadyExists => "ALREADY_EXISTS",
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
            ErrorCode::Aborted => "ABORTED",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
