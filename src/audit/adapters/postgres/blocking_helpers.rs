//! Blocking operation helpers for the audit `PostgreSQL` adapters.

use super::errors::map_pool_error;
use crate::audit::ports::{AuditStoreError, AuditStoreResult};
use diesel::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use std::time::Duration;

/// `PostgreSQL` connection pool type used by audit adapters.
pub type AuditPgPool = Pool<ConnectionManager<PgConnection>>;

/// Builds a pool whose checkout waits at most `connection_timeout`.
///
/// The pool is built lazily: no connection is opened until first use, so an
/// unreachable database surfaces as a connection error on the write path
/// rather than at start-up.
#[must_use]
pub fn build_pool(database_url: &str, connection_timeout: Duration) -> AuditPgPool {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    Pool::builder()
        .connection_timeout(connection_timeout)
        .min_idle(Some(0))
        .build_unchecked(manager)
}

/// Runs `f` with a pooled connection on the blocking thread pool.
pub(super) async fn run_blocking<F, T>(pool: &AuditPgPool, f: F) -> AuditStoreResult<T>
where
    F: FnOnce(&mut PgConnection) -> AuditStoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    let owned_pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut connection = owned_pool.get().map_err(map_pool_error)?;
        f(&mut connection)
    })
    .await
    .map_err(AuditStoreError::database)?
}
