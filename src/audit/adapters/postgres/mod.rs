//! `PostgreSQL` adapters for audit persistence.
//!
//! All Diesel calls run on the blocking thread pool via
//! [`tokio::task::spawn_blocking`] so the write path never stalls the async
//! executor.

mod blocking_helpers;
mod document_store;
mod errors;
mod fallback_table;
mod models;
mod schema;

pub use blocking_helpers::{AuditPgPool, build_pool};
pub use document_store::PostgresAuditStore;
pub use errors::{map_diesel_error, map_pool_error};
pub use fallback_table::PostgresFallbackSink;
