//! `PostgreSQL` relational fallback sink backed by `audit_log_fallbacks`.

use super::{
    blocking_helpers::{AuditPgPool, run_blocking},
    document_store::collect_counts,
    errors::map_diesel_error,
    models::{ActionCountRow, FallbackRow, NewFallbackRow},
    schema::audit_log_fallbacks,
};
use crate::audit::{
    domain::{
        AuditAction, AuditEvent, AuditQuery, AuditRecordId, DateRange, FallbackRecord, SinkKind,
        SortField, SortOrder, StoredAuditEvent,
    },
    ports::{
        AuditReader, AuditStoreError, AuditStoreResult, FallbackSink, FallbackSinkError,
        StoreProbe,
    },
};
use async_trait::async_trait;
use diesel::pg::{Pg, PgConnection};
use diesel::prelude::*;
use mockable::{Clock, DefaultClock};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

const COUNT_BY_ACTION_SQL: &str = concat!(
    "SELECT action, COUNT(*) AS total FROM audit_log_fallbacks ",
    "WHERE ($1::timestamptz IS NULL OR created_at >= $1) ",
    "AND ($2::timestamptz IS NULL OR created_at <= $2) ",
    "GROUP BY action",
);

/// Relational fallback sink and degraded-read source.
///
/// Rows are plain inserts with no uniqueness constraint, so a retried write
/// may produce a duplicate row.
pub struct PostgresFallbackSink<C = DefaultClock> {
    pool: AuditPgPool,
    clock: Arc<C>,
}

impl PostgresFallbackSink {
    /// Creates a sink from a connection pool.
    #[must_use]
    pub fn new(pool: AuditPgPool) -> Self {
        Self::with_clock(pool, Arc::new(DefaultClock))
    }
}

impl<C> Clone for PostgresFallbackSink<C> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<C> fmt::Debug for PostgresFallbackSink<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresFallbackSink").finish_non_exhaustive()
    }
}

impl<C> PostgresFallbackSink<C>
where
    C: Clock + Send + Sync,
{
    /// Creates a sink that stamps rows with `clock`.
    #[must_use]
    pub const fn with_clock(pool: AuditPgPool, clock: Arc<C>) -> Self {
        Self { pool, clock }
    }

    async fn insert(
        &self,
        event: &AuditEvent,
        original_error: Option<&str>,
    ) -> AuditStoreResult<i64> {
        let row = NewFallbackRow::from(FallbackRecord::from_event(
            event,
            original_error,
            self.clock.utc(),
        ));
        run_blocking(&self.pool, move |connection| {
            diesel::insert_into(audit_log_fallbacks::table)
                .values(&row)
                .returning(audit_log_fallbacks::id)
                .get_result::<i64>(connection)
                .map_err(map_diesel_error)
        })
        .await
    }
}

#[async_trait]
impl<C> StoreProbe for PostgresFallbackSink<C>
where
    C: Clock + Send + Sync,
{
    fn store_name(&self) -> &str {
        SinkKind::FallbackRelational.as_str()
    }

    async fn ping(&self) -> AuditStoreResult<()> {
        run_blocking(&self.pool, |connection| {
            diesel::sql_query("SELECT 1")
                .execute(connection)
                .map_err(map_diesel_error)?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl<C> FallbackSink for PostgresFallbackSink<C>
where
    C: Clock + Send + Sync,
{
    fn kind(&self) -> SinkKind {
        SinkKind::FallbackRelational
    }

    async fn accept(
        &self,
        event: &AuditEvent,
        original_error: Option<&str>,
    ) -> Result<(), FallbackSinkError> {
        self.insert(event, original_error)
            .await
            .map(drop)
            .map_err(|err| FallbackSinkError::new(self.kind(), err))
    }
}

#[async_trait]
impl<C> AuditReader for PostgresFallbackSink<C>
where
    C: Clock + Send + Sync,
{
    async fn find(&self, query: &AuditQuery) -> AuditStoreResult<Vec<StoredAuditEvent>> {
        let criteria = query.clone();
        run_blocking(&self.pool, move |connection| {
            let rows = load_page(connection, &criteria)?;
            rows.into_iter().map(row_to_stored).collect()
        })
        .await
    }

    async fn count(&self, query: &AuditQuery) -> AuditStoreResult<u64> {
        let criteria = query.clone();
        run_blocking(&self.pool, move |connection| {
            let total = filtered(&criteria)
                .count()
                .get_result::<i64>(connection)
                .map_err(map_diesel_error)?;
            Ok(u64::try_from(total).unwrap_or_default())
        })
        .await
    }

    async fn count_by_action(
        &self,
        range: &DateRange,
    ) -> AuditStoreResult<BTreeMap<AuditAction, u64>> {
        let window = *range;
        run_blocking(&self.pool, move |connection| {
            let rows = diesel::sql_query(COUNT_BY_ACTION_SQL)
                .bind::<diesel::sql_types::Nullable<diesel::sql_types::Timestamptz>, _>(
                    window.from,
                )
                .bind::<diesel::sql_types::Nullable<diesel::sql_types::Timestamptz>, _>(window.to)
                .load::<ActionCountRow>(connection)
                .map_err(map_diesel_error)?;
            collect_counts(rows)
        })
        .await
    }
}

fn row_to_stored(row: FallbackRow) -> AuditStoreResult<StoredAuditEvent> {
    let record = FallbackRecord::from(row);
    let event = record
        .to_event()
        .map_err(|err| AuditStoreError::serialization(err.to_string()))?;
    Ok(StoredAuditEvent {
        id: AuditRecordId::Fallback(record.id),
        event,
        source: SinkKind::FallbackRelational,
    })
}

fn filtered(query: &AuditQuery) -> audit_log_fallbacks::BoxedQuery<'static, Pg> {
    let mut statement = audit_log_fallbacks::table.into_boxed();
    if let Some(entity_id) = query.entity_id {
        statement = statement.filter(audit_log_fallbacks::entity_id.eq(entity_id));
    }
    if !query.actions.is_empty() {
        let names: Vec<String> = query
            .actions
            .iter()
            .map(|action| action.as_str().to_owned())
            .collect();
        statement = statement.filter(audit_log_fallbacks::action.eq_any(names));
    }
    if let Some(actor_id) = query.actor_id {
        statement = statement.filter(audit_log_fallbacks::actor_id.eq(actor_id));
    }
    if let Some(from) = query.date_range.from {
        statement = statement.filter(audit_log_fallbacks::created_at.ge(from));
    }
    if let Some(to) = query.date_range.to {
        statement = statement.filter(audit_log_fallbacks::created_at.le(to));
    }
    statement
}

fn load_page(
    connection: &mut PgConnection,
    query: &AuditQuery,
) -> AuditStoreResult<Vec<FallbackRow>> {
    let statement = filtered(query);
    let ordered = match (query.sort_by, query.sort_order) {
        (SortField::CreatedAt, SortOrder::Asc) => {
            statement.order(audit_log_fallbacks::created_at.asc())
        }
        (SortField::CreatedAt, SortOrder::Desc) => {
            statement.order(audit_log_fallbacks::created_at.desc())
        }
        (SortField::Action, SortOrder::Asc) => {
            statement.order(audit_log_fallbacks::action.asc())
        }
        (SortField::Action, SortOrder::Desc) => {
            statement.order(audit_log_fallbacks::action.desc())
        }
        (SortField::EntityId, SortOrder::Asc) => {
            statement.order(audit_log_fallbacks::entity_id.asc())
        }
        (SortField::EntityId, SortOrder::Desc) => {
            statement.order(audit_log_fallbacks::entity_id.desc())
        }
        (SortField::ActorId, SortOrder::Asc) => {
            statement.order(audit_log_fallbacks::actor_id.asc())
        }
        (SortField::ActorId, SortOrder::Desc) => {
            statement.order(audit_log_fallbacks::actor_id.desc())
        }
    };

    ordered
        .then_order_by(audit_log_fallbacks::id.asc())
        .limit(i64::from(query.limit))
        .offset(i64::try_from(query.offset).unwrap_or(i64::MAX))
        .select(FallbackRow::as_select())
        .load::<FallbackRow>(connection)
        .map_err(map_diesel_error)
}
