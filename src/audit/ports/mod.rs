//! Port contracts for the audit trail.
//!
//! Ports define infrastructure-agnostic interfaces used by audit services.

pub mod recorder;
pub mod sink;
pub mod store;

pub use recorder::AuditRecorder;
pub use sink::{FallbackSink, FallbackSinkError};
pub use store::{AuditReader, AuditStore, AuditStoreError, AuditStoreResult, StoreProbe};
