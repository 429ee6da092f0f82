//! Domain model for the audit trail.
//!
//! Everything here is pure data: events, outcomes, persisted record shapes,
//! query criteria, and the error classification table. Infrastructure
//! concerns live behind the ports.

mod action;
mod classification;
mod context;
mod error;
mod event;
mod outcome;
mod query;
mod record;

pub use action::{AuditAction, DeletionType, SinkKind};
pub use classification::{
    CONNECTION_SIGNATURES, CONNECTION_SQLSTATES, ErrorClass, TRANSIENT_SIGNATURES,
    TRANSIENT_SQLSTATES, is_connection_message,
};
pub use context::{AuditActor, RequestContext};
pub use error::{AuditDomainError, AuditQueryError, ParseAuditActionError};
pub use event::{AuditEvent, AuditEventParts, StateMap};
pub use outcome::WriteOutcome;
pub use query::{
    ActionParam, AuditQuery, AuditQueryRequest, DateRange, MAX_QUERY_LIMIT, QueryLimits,
    SortField, SortOrder,
};
pub use record::{AuditDocument, AuditRecordId, FallbackRecord, StoredAuditEvent};
