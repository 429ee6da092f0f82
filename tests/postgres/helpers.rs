//! Shared helpers for `PostgreSQL` integration tests.

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use pg_embedded_setup_unpriv::TestCluster;
use std::time::Duration;
use tasktrail::audit::adapters::postgres::{AuditPgPool, build_pool};
use tokio::runtime::Runtime;
use uuid::Uuid;

/// SQL creating the audit tables.
pub const CREATE_AUDIT_TABLES_SQL: &str =
    include_str!("../../migrations/2026-10-01-000000_create_audit_tables/up.sql");

/// Template database name for the pre-migrated schema.
pub const TEMPLATE_DB: &str = "tasktrail_test_template";

/// Pool checkout timeout used by tests.
pub const POOL_TIMEOUT: Duration = Duration::from_secs(2);

/// Creates a tokio runtime for async operations in tests.
///
/// # Errors
///
/// Returns an error if the runtime cannot be built.
pub fn test_runtime() -> eyre::Result<Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

/// Ensures the template database exists with the audit tables applied.
///
/// # Errors
///
/// Returns an error if template creation or migration fails.
pub fn ensure_template(cluster: &TestCluster) -> eyre::Result<()> {
    cluster
        .ensure_template_exists(TEMPLATE_DB, |db_name| {
            let url = cluster.connection().database_url(db_name);
            let mut conn = PgConnection::establish(&url).map_err(|e| eyre::eyre!("{e}"))?;
            conn.batch_execute(CREATE_AUDIT_TABLES_SQL)
                .map_err(|e| eyre::eyre!("{e}"))?;
            Ok(())
        })
        .map_err(|e| eyre::eyre!("template setup failed: {e}"))
}

/// A database cloned from the template for one test.
///
/// The database is dropped when the value goes out of scope, even if the
/// test panics. Declare it before anything holding one of its pools so the
/// pools close first.
pub struct TestDatabase {
    cluster: &'static TestCluster,
    name: String,
    url: String,
}

impl TestDatabase {
    /// Clones the template into a fresh database whose name starts with
    /// `prefix`.
    ///
    /// # Errors
    ///
    /// Returns an error if the template or the database cannot be created.
    pub fn create(cluster: &'static TestCluster, prefix: &str) -> eyre::Result<Self> {
        ensure_template(cluster)?;
        let name = format!("{prefix}_{}", Uuid::new_v4().simple());
        cluster
            .create_database_from_template(name.as_str(), TEMPLATE_DB)
            .map_err(|e| eyre::eyre!("failed to create {name}: {e}"))?;
        let url = cluster.connection().database_url(&name);
        Ok(Self { cluster, name, url })
    }

    /// Returns a new pool connected to this database.
    #[must_use]
    pub fn pool(&self) -> AuditPgPool {
        build_pool(&self.url, POOL_TIMEOUT)
    }
}

impl Drop for TestDatabase {
    fn drop(&mut self) {
        if let Err(err) = self.cluster.drop_database(self.name.as_str()) {
            tracing::warn!(database = %self.name, error = %err, "failed to drop test database");
        }
    }
}

/// Returns a pool pointing at a port nothing listens on.
#[must_use]
pub fn unreachable_pool() -> AuditPgPool {
    build_pool(
        "postgres://tasktrail@127.0.0.1:1/tasktrail",
        Duration::from_millis(200),
    )
}
