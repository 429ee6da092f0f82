//! Task lifecycle management.
//!
//! Tasks are the audited entity. Every committed mutation (create, update,
//! soft delete, restore, force delete) produces an audit event that is
//! handed to an [`AuditRecorder`](crate::audit::ports::AuditRecorder). The
//! recorder never fails, so audit trouble cannot change the result of a task
//! operation. The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
