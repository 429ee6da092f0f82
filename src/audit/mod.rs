//! Resilient audit trail for task lifecycle operations.
//!
//! Every task mutation produces an immutable [`domain::AuditEvent`] that is
//! written through a health-aware, retrying path into a primary store and,
//! when the primary cannot take it, into an ordered cascade of fallback
//! sinks. Recording never fails from the caller's point of view: it always
//! yields a [`domain::WriteOutcome`] naming the sink that accepted the
//! event.
//!
//! The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Write and read services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
