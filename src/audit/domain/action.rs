//! Enumerations describing audited actions and the sinks that accept them.

use super::ParseAuditActionError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Task lifecycle action captured by an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A task was created.
    Created,
    /// A task was updated.
    Updated,
    /// A task was soft-deleted.
    Deleted,
    /// A soft-deleted task was restored.
    Restored,
    /// A task was permanently removed.
    ForceDeleted,
}

impl AuditAction {
    /// Every action in canonical order.
    pub const ALL: [Self; 5] = [
        Self::Created,
        Self::Updated,
        Self::Deleted,
        Self::Restored,
        Self::ForceDeleted,
    ];

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
            Self::Restored => "restored",
            Self::ForceDeleted => "force_deleted",
        }
    }

    /// Returns the past-tense phrase used in event descriptions.
    #[must_use]
    pub const fn verb_phrase(self) -> &'static str {
        match self {
            Self::Created => "was created",
            Self::Updated => "was updated",
            Self::Deleted => "was deleted",
            Self::Restored => "was restored",
            Self::ForceDeleted => "was permanently deleted",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for AuditAction {
    type Error = ParseAuditActionError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "created" => Ok(Self::Created),
            "updated" => Ok(Self::Updated),
            "deleted" => Ok(Self::Deleted),
            "restored" => Ok(Self::Restored),
            "force_deleted" => Ok(Self::ForceDeleted),
            _ => Err(ParseAuditActionError(value.to_owned())),
        }
    }
}

/// Kind of deletion-related lifecycle change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionType {
    /// Recoverable deletion that only marks the task as deleted.
    Soft,
    /// Irreversible removal of the task.
    Force,
    /// Reversal of an earlier soft deletion.
    Restore,
}

impl DeletionType {
    /// Returns the canonical representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Soft => "soft",
            Self::Force => "force",
            Self::Restore => "restore",
        }
    }

    /// Returns the audit action recorded for this deletion type.
    #[must_use]
    pub const fn action(self) -> AuditAction {
        match self {
            Self::Soft => AuditAction::Deleted,
            Self::Force => AuditAction::ForceDeleted,
            Self::Restore => AuditAction::Restored,
        }
    }
}

/// Persistence target that accepted an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// The primary document store.
    Primary,
    /// The relational fallback table.
    FallbackRelational,
    /// The dated JSON-lines fallback file.
    FallbackFile,
    /// The process error channel, used as the last resort.
    FallbackErrorlog,
}

impl SinkKind {
    /// Returns the canonical identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::FallbackRelational => "fallback_relational",
            Self::FallbackFile => "fallback_file",
            Self::FallbackErrorlog => "fallback_errorlog",
        }
    }

    /// Returns `true` for every sink other than the primary store.
    #[must_use]
    pub const fn is_fallback(self) -> bool {
        !matches!(self, Self::Primary)
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}
