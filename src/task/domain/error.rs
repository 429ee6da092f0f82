//! Error types for task domain validation and parsing.

use super::TaskId;
use thiserror::Error;

/// Errors returned while constructing or mutating tasks.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskDomainError {
    /// The title is empty after trimming.
    #[error("task title must not be empty")]
    EmptyTitle,

    /// The task is already soft-deleted.
    #[error("task {0} is already deleted")]
    AlreadyDeleted(TaskId),

    /// The task is not soft-deleted, so it cannot be restored.
    #[error("task {0} is not deleted")]
    NotDeleted(TaskId),

    /// The task is soft-deleted and must be restored before it can change.
    #[error("task {0} is deleted")]
    Deleted(TaskId),
}

/// Error returned while parsing task statuses or priorities.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task {field}: {value}")]
pub struct ParseTaskFieldError {
    /// Field being parsed.
    pub field: &'static str,
    /// Rejected input.
    pub value: String,
}
