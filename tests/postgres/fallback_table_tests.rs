//! Relational fallback table and degraded reads against a real database.

use super::helpers::{TestDatabase, test_runtime, unreachable_pool};
use crate::test_helpers::{FixedClock, SharedBuffer};
use camino::Utf8PathBuf;
use pg_embedded_setup_unpriv::{TestCluster, test_support::shared_test_cluster};
use rstest::rstest;
use std::sync::Arc;
use tasktrail::audit::{
    adapters::{
        FileSink, ProcessErrorSink,
        postgres::{PostgresAuditStore, PostgresFallbackSink},
    },
    domain::{AuditAction, AuditActor, AuditQuery, RequestContext, SinkKind, StateMap},
    ports::{AuditReader, FallbackSink},
    services::{AuditEventBuilder, AuditQueryService, FallbackChain, QuerySource, RetryingWriter},
};
use tasktrail::config::{AuditConfig, AuditConfigHandle};

#[rstest]
fn unreachable_primary_writes_to_table_and_reads_degrade(
    shared_test_cluster: &'static TestCluster,
) -> eyre::Result<()> {
    let database = TestDatabase::create(shared_test_cluster, "fallback_degraded")?;
    let rt = test_runtime()?;
    let log_dir = tempfile::tempdir()?;
    let clock = Arc::new(FixedClock::frozen());
    let config = AuditConfigHandle::new(AuditConfig::fast())?;
    let stderr = SharedBuffer::default();

    let primary = Arc::new(PostgresAuditStore::with_clock(
        unreachable_pool(),
        Arc::clone(&clock),
    ));
    let table = Arc::new(PostgresFallbackSink::with_clock(
        database.pool(),
        Arc::clone(&clock),
    ));
    let file = FileSink::new(
        Utf8PathBuf::try_from(log_dir.path().to_path_buf())?,
        "audit-fallback",
        Arc::clone(&clock),
    );
    let chain = FallbackChain::new(
        Arc::clone(&table) as Arc<dyn FallbackSink>,
        Arc::new(file),
        Arc::new(ProcessErrorSink::with_writer(stderr.clone()).with_clock(Arc::clone(&clock))),
        Arc::clone(&clock),
    );
    let writer = RetryingWriter::new(
        Arc::clone(&primary),
        chain,
        config.clone(),
        Arc::clone(&clock),
    );
    let event = AuditEventBuilder::new(Arc::clone(&clock)).build_from_activity(
        42,
        AuditAction::Created,
        StateMap::new(),
        StateMap::new(),
        AuditActor::new(7, "Ada"),
        RequestContext::empty().with_method("POST"),
    );

    let outcome = rt.block_on(writer.write(event.clone()));

    assert_eq!(outcome.sink(), SinkKind::FallbackRelational);
    assert!(!outcome.is_terminal_failure());
    assert!(stderr.contents().is_empty());

    let stored = rt.block_on(table.find(&AuditQuery::default().for_entity(42)))?;
    let [row] = stored.as_slice() else {
        eyre::bail!("expected one fallback row, found {}", stored.len());
    };
    assert_eq!(row.event, event);
    assert_eq!(row.source, SinkKind::FallbackRelational);

    let queries = AuditQueryService::new(primary, table, config, clock);
    let page = rt.block_on(queries.entity_history(42, None))?;
    assert_eq!(page.source, QuerySource::DEGRADED);
    assert_eq!(page.total_count, 1);
    Ok(())
}

#[rstest]
fn duplicate_rows_are_tolerated(shared_test_cluster: &'static TestCluster) -> eyre::Result<()> {
    let database = TestDatabase::create(shared_test_cluster, "fallback_duplicates")?;
    let rt = test_runtime()?;
    let clock = Arc::new(FixedClock::frozen());
    let table = PostgresFallbackSink::with_clock(database.pool(), Arc::clone(&clock));
    let event = AuditEventBuilder::new(clock).build_from_activity(
        7,
        AuditAction::Created,
        StateMap::new(),
        StateMap::new(),
        AuditActor::anonymous(),
        RequestContext::empty(),
    );

    rt.block_on(table.accept(&event, Some("connection refused")))?;
    rt.block_on(table.accept(&event, Some("connection refused")))?;

    let stored = rt.block_on(table.count(&AuditQuery::default().for_entity(7)))?;
    assert_eq!(stored, 2);
    Ok(())
}
