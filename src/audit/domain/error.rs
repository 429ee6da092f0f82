//! Error types for audit domain parsing and query validation.

use thiserror::Error;

/// Error returned while parsing audit actions from persistence or input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown audit action: {0}")]
pub struct ParseAuditActionError(pub String);

/// Errors raised while converting persisted audit data back into events.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuditDomainError {
    /// The stored action is not part of the action enum.
    #[error(transparent)]
    UnknownAction(#[from] ParseAuditActionError),

    /// A serialized payload could not be decoded.
    #[error("malformed audit payload: {0}")]
    MalformedPayload(String),
}

/// Errors raised while validating read-side query parameters.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuditQueryError {
    /// The sort field is not in the whitelist.
    #[error("unsupported sort field '{0}', expected one of created_at, action, entity_id, actor_id")]
    UnsupportedSortField(String),

    /// The sort order is neither `asc` nor `desc`.
    #[error("unsupported sort order '{0}', expected asc or desc")]
    UnsupportedSortOrder(String),

    /// An action filter value is not a known action.
    #[error(transparent)]
    UnknownAction(#[from] ParseAuditActionError),

    /// The date range ends before it starts.
    #[error("date_from must not be later than date_to")]
    InvertedDateRange,

    /// The store failed for a reason that does not allow a degraded read.
    #[error("audit store error: {0}")]
    Store(String),
}
