//! Mapping of Diesel and pool failures onto audit store errors.

use crate::audit::ports::AuditStoreError;
use diesel::r2d2::PoolError;
use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// Maps a Diesel error onto the audit store taxonomy.
///
/// Lost connections become connection errors and serialization conflicts
/// become transient errors. Everything else is wrapped as a database error
/// and classified later by message.
#[must_use]
pub fn map_diesel_error(err: DieselError) -> AuditStoreError {
    match err {
        DieselError::DatabaseError(
            DatabaseErrorKind::ClosedConnection | DatabaseErrorKind::UnableToSendCommand,
            info,
        ) => AuditStoreError::connection(info.message()),
        DieselError::DatabaseError(DatabaseErrorKind::SerializationFailure, info) => {
            AuditStoreError::transient(info.message())
        }
        other => AuditStoreError::database(other),
    }
}

/// Maps a pool checkout failure onto a connection error.
#[must_use]
pub fn map_pool_error(err: PoolError) -> AuditStoreError {
    AuditStoreError::connection(err.to_string())
}
