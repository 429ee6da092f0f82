//! Tasktrail: task lifecycle management with a resilient audit trail.
//!
//! Every committed task mutation is recorded as an immutable audit event.
//! Recording never fails from the caller's point of view: events that the
//! primary document store cannot take are diverted through a relational
//! fallback table, a dated JSON-lines file, and finally the process error
//! stream.
//!
//! # Architecture
//!
//! Tasktrail follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (database, files, memory)
//!
//! # Modules
//!
//! - [`audit`]: Audit event construction, the write path, and the read side
//! - [`config`]: Runtime-replaceable audit configuration
//! - [`task`]: Audited task lifecycle operations

pub mod audit;
pub mod config;
pub mod task;
