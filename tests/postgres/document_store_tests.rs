//! Primary JSONB document store against a real database.

use super::helpers::{TestDatabase, test_runtime};
use crate::test_helpers::FixedClock;
use chrono::TimeDelta;
use pg_embedded_setup_unpriv::{TestCluster, test_support::shared_test_cluster};
use rstest::rstest;
use serde_json::{Value, json};
use std::sync::Arc;
use tasktrail::audit::{
    adapters::postgres::PostgresAuditStore,
    domain::{
        AuditAction, AuditActor, AuditEvent, AuditQuery, DateRange, RequestContext, SinkKind,
        SortField, SortOrder, StateMap,
    },
    ports::{AuditReader, AuditStore, StoreProbe},
    services::AuditEventBuilder,
};

fn state(value: Value) -> StateMap {
    value.as_object().cloned().unwrap_or_default()
}

fn created(builder: &AuditEventBuilder<FixedClock>, entity_id: i64, actor: i64) -> AuditEvent {
    builder.build_from_activity(
        entity_id,
        AuditAction::Created,
        StateMap::new(),
        state(json!({ "id": entity_id, "title": "Write report", "status": "pending" })),
        AuditActor::new(actor, "Ada"),
        RequestContext::empty()
            .with_ip("10.0.0.1")
            .with_request_id("req-1"),
    )
}

#[rstest]
fn ping_and_round_trip_an_event(shared_test_cluster: &'static TestCluster) -> eyre::Result<()> {
    let database = TestDatabase::create(shared_test_cluster, "documents_round_trip")?;
    let rt = test_runtime()?;
    let clock = Arc::new(FixedClock::frozen());
    let builder = AuditEventBuilder::new(Arc::clone(&clock));
    let store = PostgresAuditStore::with_clock(database.pool(), Arc::clone(&clock));

    rt.block_on(store.ping())?;
    let event = created(&builder, 42, 7);
    rt.block_on(store.insert(&event))?;

    let found = rt.block_on(store.find(&AuditQuery::default().for_entity(42)))?;
    let [stored] = found.as_slice() else {
        eyre::bail!("expected one document, found {}", found.len());
    };
    assert_eq!(stored.event, event);
    assert_eq!(stored.source, SinkKind::Primary);
    Ok(())
}

#[rstest]
fn filters_sorting_and_counts(shared_test_cluster: &'static TestCluster) -> eyre::Result<()> {
    let database = TestDatabase::create(shared_test_cluster, "documents_filters")?;
    let rt = test_runtime()?;
    let clock = Arc::new(FixedClock::frozen());
    let builder = AuditEventBuilder::new(Arc::clone(&clock));
    let store = PostgresAuditStore::with_clock(database.pool(), Arc::clone(&clock));

    rt.block_on(store.insert(&created(&builder, 1, 7)))?;
    clock.advance(TimeDelta::minutes(1));
    rt.block_on(store.insert(&created(&builder, 2, 8)))?;
    clock.advance(TimeDelta::minutes(1));
    rt.block_on(store.insert(&builder.build_from_activity(
        1,
        AuditAction::Updated,
        state(json!({ "status": "pending" })),
        state(json!({ "status": "completed" })),
        AuditActor::new(8, "Grace"),
        RequestContext::empty(),
    )))?;

    let mut by_actor = AuditQuery::default();
    by_actor.actor_id = Some(8);
    by_actor.sort_by = SortField::EntityId;
    by_actor.sort_order = SortOrder::Asc;
    let found = rt.block_on(store.find(&by_actor))?;
    let entities: Vec<i64> = found.iter().map(|stored| stored.event.entity_id()).collect();
    assert_eq!(entities, vec![1, 2]);
    assert_eq!(rt.block_on(store.count(&by_actor))?, 2);

    let updates = AuditQuery::default().with_actions([AuditAction::Updated]);
    assert_eq!(rt.block_on(store.count(&updates))?, 1);

    let counts = rt.block_on(store.count_by_action(&DateRange::unbounded()))?;
    assert_eq!(counts.get(&AuditAction::Created), Some(&2));
    assert_eq!(counts.get(&AuditAction::Updated), Some(&1));
    Ok(())
}
