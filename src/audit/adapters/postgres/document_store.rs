//! `PostgreSQL` primary store keeping audit events as JSONB documents.

use super::{
    blocking_helpers::{AuditPgPool, run_blocking},
    errors::map_diesel_error,
    models::{ActionCountRow, DocumentRow, NewDocumentRow},
    schema::audit_documents,
};
use crate::audit::{
    domain::{
        AuditAction, AuditDocument, AuditEvent, AuditQuery, AuditRecordId, DateRange, SinkKind,
        SortField, SortOrder, StoredAuditEvent,
    },
    ports::{AuditReader, AuditStore, AuditStoreError, AuditStoreResult, StoreProbe},
};
use async_trait::async_trait;
use diesel::pg::{Pg, PgConnection};
use diesel::prelude::*;
use mockable::{Clock, DefaultClock};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

const COUNT_BY_ACTION_SQL: &str = concat!(
    "SELECT action, COUNT(*) AS total FROM audit_documents ",
    "WHERE ($1::timestamptz IS NULL OR created_at >= $1) ",
    "AND ($2::timestamptz IS NULL OR created_at <= $2) ",
    "GROUP BY action",
);

/// `PostgreSQL`-backed primary audit store.
///
/// `created_at` is taken from the injected clock at insert time.
pub struct PostgresAuditStore<C = DefaultClock> {
    name: String,
    pool: AuditPgPool,
    clock: Arc<C>,
}

impl PostgresAuditStore {
    /// Creates a store named `primary` from a connection pool.
    #[must_use]
    pub fn new(pool: AuditPgPool) -> Self {
        Self::with_clock(pool, Arc::new(DefaultClock))
    }
}

impl<C> Clone for PostgresAuditStore<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            pool: self.pool.clone(),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<C> fmt::Debug for PostgresAuditStore<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresAuditStore")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<C> PostgresAuditStore<C>
where
    C: Clock + Send + Sync,
{
    /// Creates a store named `primary` that stamps documents with `clock`.
    #[must_use]
    pub fn with_clock(pool: AuditPgPool, clock: Arc<C>) -> Self {
        Self {
            name: SinkKind::Primary.as_str().to_owned(),
            pool,
            clock,
        }
    }

    /// Overrides the name reported in health checks.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[async_trait]
impl<C> StoreProbe for PostgresAuditStore<C>
where
    C: Clock + Send + Sync,
{
    fn store_name(&self) -> &str {
        &self.name
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
impl<C> AuditStore for PostgresAuditStore<C>
where
    C: Clock + Send + Sync,
{
    async fn insert(&self, event: &AuditEvent) -> AuditStoreResult<AuditRecordId> {
        let id = Uuid::new_v4();
        let row = NewDocumentRow::from(AuditDocument::from_event(id, event, self.clock.utc()));

        run_blocking(&self.pool, move |connection| {
            diesel::insert_into(audit_documents::table)
                .values(&row)
                .execute(connection)
                .map_err(map_diesel_error)?;
            Ok(AuditRecordId::Document(id))
        })
        .await
    }
}

#[async_trait]
impl<C> AuditReader for PostgresAuditStore<C>
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

/// Folds per-action rows into a map, rejecting unknown action names.
pub(super) fn collect_counts(
    rows: Vec<ActionCountRow>,
) -> AuditStoreResult<BTreeMap<AuditAction, u64>> {
    let mut counts = BTreeMap::new();
    for row in rows {
        let action = AuditAction::try_from(row.action.as_str())
            .map_err(|err| AuditStoreError::serialization(err.to_string()))?;
        let total = u64::try_from(row.total).unwrap_or_default();
        *counts.entry(action).or_insert(0) += total;
    }
    Ok(counts)
}

fn row_to_stored(row: DocumentRow) -> AuditStoreResult<StoredAuditEvent> {
    let document = row.into_document()?;
    let id = AuditRecordId::Document(document.id);
    let event = document
        .into_event()
        .map_err(|err| AuditStoreError::serialization(err.to_string()))?;
    Ok(StoredAuditEvent {
        id,
        event,
        source: SinkKind::Primary,
    })
}

fn filtered(query: &AuditQuery) -> audit_documents::BoxedQuery<'static, Pg> {
    let mut statement = audit_documents::table.into_boxed();
    if let Some(entity_id) = query.entity_id {
        statement = statement.filter(audit_documents::entity_id.eq(entity_id));
    }
    if !query.actions.is_empty() {
        let names: Vec<String> = query
            .actions
            .iter()
            .map(|action| action.as_str().to_owned())
            .collect();
        statement = statement.filter(audit_documents::action.eq_any(names));
    }
    if let Some(actor_id) = query.actor_id {
        statement = statement.filter(audit_documents::actor_id.eq(actor_id));
    }
    if let Some(from) = query.date_range.from {
        statement = statement.filter(audit_documents::created_at.ge(from));
    }
    if let Some(to) = query.date_range.to {
        statement = statement.filter(audit_documents::created_at.le(to));
    }
    statement
}

fn load_page(
    connection: &mut PgConnection,
    query: &AuditQuery,
) -> AuditStoreResult<Vec<DocumentRow>> {
    let statement = filtered(query);
    let ordered = match (query.sort_by, query.sort_order) {
        (SortField::CreatedAt, SortOrder::Asc) => {
            statement.order(audit_documents::created_at.asc())
        }
        (SortField::CreatedAt, SortOrder::Desc) => {
            statement.order(audit_documents::created_at.desc())
        }
        (SortField::Action, SortOrder::Asc) => statement.order(audit_documents::action.asc()),
        (SortField::Action, SortOrder::Desc) => statement.order(audit_documents::action.desc()),
        (SortField::EntityId, SortOrder::Asc) => {
            statement.order(audit_documents::entity_id.asc())
        }
        (SortField::EntityId, SortOrder::Desc) => {
            statement.order(audit_documents::entity_id.desc())
        }
        (SortField::ActorId, SortOrder::Asc) => statement.order(audit_documents::actor_id.asc()),
        (SortField::ActorId, SortOrder::Desc) => {
            statement.order(audit_documents::actor_id.desc())
        }
    };

    ordered
        .limit(i64::from(query.limit))
        .offset(i64::try_from(query.offset).unwrap_or(i64::MAX))
        .select(DocumentRow::as_select())
        .load::<DocumentRow>(connection)
        .map_err(map_diesel_error)
}
