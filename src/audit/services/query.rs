//! Read-side filtering, pagination, and statistics.

use super::ConnectionHealthChecker;
use crate::audit::{
    domain::{
        AuditAction, AuditQuery, AuditQueryError, AuditQueryRequest, DateRange, ErrorClass,
        StoredAuditEvent,
    },
    ports::{AuditReader, AuditStoreError, AuditStoreResult, StoreProbe},
};
use crate::config::{AuditConfig, AuditConfigHandle};
use mockable::Clock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

/// Where a read was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuerySource {
    /// The primary store answered.
    Primary,
    /// The primary store was unreachable and the relational fallback table
    /// answered instead.
    Fallback {
        /// Always `true`: the fallback table only holds events that missed
        /// the primary store.
        incomplete: bool,
    },
}

impl QuerySource {
    /// The degraded source.
    pub const DEGRADED: Self = Self::Fallback { incomplete: true };

    /// Returns `true` if results came from the fallback table.
    #[must_use]
    pub const fn is_degraded(self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditPage {
    /// Events on this page, sorted as requested.
    pub events: Vec<StoredAuditEvent>,
    /// Number of events matching the filters across all pages.
    pub total_count: u64,
    /// Store that served the page.
    pub source: QuerySource,
    /// Effective page size.
    pub limit: u32,
    /// Effective offset.
    pub offset: u64,
}

/// Aggregate counts over a time window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditStatistics {
    /// Requested window.
    pub window: DateRange,
    /// Number of events inside `window`.
    pub total: u64,
    /// Events inside `window` per action; actions with no events are absent.
    pub counts_by_action: BTreeMap<AuditAction, u64>,
    /// Trailing window ending now used for `recent_count`.
    pub recent_window: DateRange,
    /// Number of events inside `recent_window`.
    pub recent_count: u64,
    /// Store that served the counts.
    pub source: QuerySource,
}

/// Query service over the primary store with a degraded path against the
/// relational fallback table.
///
/// The degraded path is taken when the primary fails its health probe or a
/// primary read fails with a connectivity error. Any other read failure is
/// reported as [`AuditQueryError::Store`].
pub struct AuditQueryService<P, F, C>
where
    P: AuditReader + StoreProbe,
    F: AuditReader,
    C: Clock + Send + Sync,
{
    primary: Arc<P>,
    fallback: Arc<F>,
    config: AuditConfigHandle,
    clock: Arc<C>,
}

impl<P, F, C> AuditQueryService<P, F, C>
where
    P: AuditReader + StoreProbe,
    F: AuditReader,
    C: Clock + Send + Sync,
{
    /// Creates a query service.
    #[must_use]
    pub const fn new(
        primary: Arc<P>,
        fallback: Arc<F>,
        config: AuditConfigHandle,
        clock: Arc<C>,
    ) -> Self {
        Self {
            primary,
            fallback,
            config,
            clock,
        }
    }

    /// Validates raw parameters and runs [`Self::find_with_filters`].
    ///
    /// # Errors
    ///
    /// Returns [`AuditQueryError`] for invalid parameters or store failures.
    pub async fn find(&self, request: AuditQueryRequest) -> Result<AuditPage, AuditQueryError> {
        let limits = self.config.snapshot().query;
        let query = AuditQuery::try_from_request(request, limits)?;
        self.find_with_filters(&query).await
    }

    /// Returns one page of events matching `query` and the total match
    /// count.
    ///
    /// # Errors
    ///
    /// Returns [`AuditQueryError::Store`] when the serving store fails with
    /// anything other than a connectivity error.
    pub async fn find_with_filters(
        &self,
        query: &AuditQuery,
    ) -> Result<AuditPage, AuditQueryError> {
        let config = self.config.snapshot();
        let criteria = bounded(query, &config);

        if self.primary_available(&config).await {
            match read_page(self.primary.as_ref(), &criteria).await {
                Ok((events, total_count)) => {
                    return Ok(page(events, total_count, QuerySource::Primary, &criteria));
                }
                Err(err) => degrade_or_fail(&err)?,
            }
        }

        let (events, total_count) = read_page(self.fallback.as_ref(), &criteria)
            .await
            .map_err(|err| store_error(&err))?;
        Ok(page(events, total_count, QuerySource::DEGRADED, &criteria))
    }

    /// Returns the most recent events for one entity, newest first.
    ///
    /// # Errors
    ///
    /// See [`Self::find_with_filters`].
    pub async fn entity_history(
        &self,
        entity_id: i64,
        limit: Option<u32>,
    ) -> Result<AuditPage, AuditQueryError> {
        let default_limit = self.config.snapshot().query.default_limit;
        let query = AuditQuery::default()
            .for_entity(entity_id)
            .with_limit(limit.unwrap_or(default_limit));
        self.find_with_filters(&query).await
    }

    /// Counts events per action inside `window` plus the recent activity
    /// count.
    ///
    /// # Errors
    ///
    /// Returns [`AuditQueryError::Store`] when the serving store fails with
    /// anything other than a connectivity error.
    pub async fn statistics(
        &self,
        window: &DateRange,
    ) -> Result<AuditStatistics, AuditQueryError> {
        let config = self.config.snapshot();
        let recent_window =
            DateRange::last_hours(config.statistics.recent_window_hours, self.clock.utc());

        if self.primary_available(&config).await {
            match read_counts(self.primary.as_ref(), window, &recent_window).await {
                Ok((counts, recent_count)) => {
                    return Ok(statistics(
                        *window,
                        counts,
                        recent_window,
                        recent_count,
                        QuerySource::Primary,
                    ));
                }
                Err(err) => degrade_or_fail(&err)?,
            }
        }

        let (counts, recent_count) = read_counts(self.fallback.as_ref(), window, &recent_window)
            .await
            .map_err(|err| store_error(&err))?;
        Ok(statistics(
            *window,
            counts,
            recent_window,
            recent_count,
            QuerySource::DEGRADED,
        ))
    }

    /// Counts events per action over the last `days` days.
    ///
    /// # Errors
    ///
    /// See [`Self::statistics`].
    pub async fn statistics_for_last_days(
        &self,
        days: u32,
    ) -> Result<AuditStatistics, AuditQueryError> {
        let window = DateRange::last_days(days, self.clock.utc());
        self.statistics(&window).await
    }

    async fn primary_available(&self, config: &AuditConfig) -> bool {
        let checker =
            ConnectionHealthChecker::new(config.connection_timeout(), Arc::clone(&self.clock));
        let report = checker.probe(self.primary.as_ref()).await;
        if !report.is_healthy() {
            warn!(
                store = %report.store,
                error = report.error.as_deref().unwrap_or_default(),
                "primary audit store unavailable, reading from fallback table"
            );
        }
        report.is_healthy()
    }
}

fn bounded(query: &AuditQuery, config: &AuditConfig) -> AuditQuery {
    let mut criteria = query.clone();
    criteria.limit = criteria.limit.clamp(1, config.query.max_limit.max(1));
    criteria
}

fn degrade_or_fail(err: &AuditStoreError) -> Result<(), AuditQueryError> {
    if err.class() == ErrorClass::Connectivity {
        warn!(
            error = %err,
            "primary audit read lost its connection, reading from fallback table"
        );
        Ok(())
    } else {
        Err(store_error(err))
    }
}

fn store_error(err: &AuditStoreError) -> AuditQueryError {
    AuditQueryError::Store(err.to_string())
}

async fn read_page<R>(
    reader: &R,
    query: &AuditQuery,
) -> AuditStoreResult<(Vec<StoredAuditEvent>, u64)>
where
    R: AuditReader + ?Sized,
{
    let events = reader.find(query).await?;
    let total_count = reader.count(query).await?;
    Ok((events, total_count))
}

async fn read_counts<R>(
    reader: &R,
    window: &DateRange,
    recent_window: &DateRange,
) -> AuditStoreResult<(BTreeMap<AuditAction, u64>, u64)>
where
    R: AuditReader + ?Sized,
{
    let counts = reader.count_by_action(window).await?;
    let recent_count = reader
        .count(&AuditQuery::default().within(*recent_window))
        .await?;
    Ok((counts, recent_count))
}

fn page(
    events: Vec<StoredAuditEvent>,
    total_count: u64,
    source: QuerySource,
    criteria: &AuditQuery,
) -> AuditPage {
    AuditPage {
        events,
        total_count,
        source,
        limit: criteria.limit,
        offset: criteria.offset,
    }
}

fn statistics(
    window: DateRange,
    counts_by_action: BTreeMap<AuditAction, u64>,
    recent_window: DateRange,
    recent_count: u64,
    source: QuerySource,
) -> AuditStatistics {
    AuditStatistics {
        window,
        total: counts_by_action.values().sum(),
        counts_by_action,
        recent_window,
        recent_count,
        source,
    }
}
