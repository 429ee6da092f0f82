//! Store ports for audit persistence and retrieval.

use crate::audit::domain::{
    AuditAction, AuditEvent, AuditQuery, AuditRecordId, DateRange, ErrorClass, StoredAuditEvent,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Result type for audit store operations.
pub type AuditStoreResult<T> = Result<T, AuditStoreError>;

/// Liveness probe implemented once per store kind.
#[async_trait]
pub trait StoreProbe: Send + Sync {
    /// Returns the configured store name used in health reports.
    fn store_name(&self) -> &str;

    /// Performs a trivial round trip against the store.
    ///
    /// # Errors
    ///
    /// Returns [`AuditStoreError`] when the store cannot be reached.
    async fn ping(&self) -> AuditStoreResult<()>;
}

/// Write contract for the primary audit store.
#[async_trait]
pub trait AuditStore: StoreProbe {
    /// Persists one event.
    ///
    /// # Errors
    ///
    /// Returns [`AuditStoreError`] when the store rejects the write.
    async fn insert(&self, event: &AuditEvent) -> AuditStoreResult<AuditRecordId>;
}

/// Read contract shared by the primary store and the fallback table.
#[async_trait]
pub trait AuditReader: Send + Sync {
    /// Returns one sorted page of events matching `query`.
    async fn find(&self, query: &AuditQuery) -> AuditStoreResult<Vec<StoredAuditEvent>>;

    /// Counts every event matching the filters of `query`, ignoring
    /// pagination.
    async fn count(&self, query: &AuditQuery) -> AuditStoreResult<u64>;

    /// Counts events per action inside `range`.
    async fn count_by_action(
        &self,
        range: &DateRange,
    ) -> AuditStoreResult<BTreeMap<AuditAction, u64>>;
}

/// Errors returned by audit store adapters.
#[derive(Debug, Clone, Error)]
pub enum AuditStoreError {
    /// The store could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// The operation did not finish in time.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// The store reported a failure that may clear up on retry.
    #[error("transient store error: {0}")]
    Transient(String),

    /// Any other database failure.
    #[error("database error: {0}")]
    Database(Arc<dyn std::error::Error + Send + Sync>),

    /// The event could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Local I/O failed.
    #[error("i/o error: {0}")]
    Io(Arc<std::io::Error>),

    /// An in-process lock was poisoned.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

impl AuditStoreError {
    /// Creates a connection error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Creates a transient error.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    /// Wraps a database error.
    #[must_use]
    pub fn database(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Database(Arc::new(err))
    }

    /// Creates a serialization error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Wraps an I/O error.
    #[must_use]
    pub fn io(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }

    /// Classifies the error for retry decisions.
    ///
    /// Connection and timeout variants are always connectivity failures and
    /// transient variants are always transient. Everything else is matched
    /// against the signature table, so a driver error that merely wraps
    /// "connection refused" is still recognised.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Connection(_) | Self::Timeout(_) => ErrorClass::Connectivity,
            Self::Transient(_) => ErrorClass::Transient,
            Self::Serialization(_) | Self::LockPoisoned(_) => ErrorClass::Permanent,
            Self::Database(err) => ErrorClass::of_message(&err.to_string()),
            Self::Io(err) => ErrorClass::of_message(&err.to_string()),
        }
    }
}
