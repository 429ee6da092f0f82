//! In-memory relational fallback table.

use super::{poisoned, tally_actions};
use crate::audit::{
    domain::{
        AuditAction, AuditEvent, AuditQuery, AuditRecordId, DateRange, FallbackRecord, SinkKind,
        StoredAuditEvent,
    },
    ports::{
        AuditReader, AuditStoreError, AuditStoreResult, FallbackSink, FallbackSinkError,
        StoreProbe,
    },
};
use async_trait::async_trait;
use mockable::{Clock, DefaultClock};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};

/// Thread-safe in-memory stand-in for the `audit_log_fallbacks` table.
///
/// Rows are append-only and duplicates are accepted.
pub struct InMemoryFallbackTable<C = DefaultClock> {
    state: Arc<RwLock<InMemoryTableState>>,
    clock: Arc<C>,
}

#[derive(Debug, Default)]
struct InMemoryTableState {
    records: Vec<FallbackRecord>,
    last_id: i64,
    failing: Option<String>,
}

impl Default for InMemoryFallbackTable {
    fn default() -> Self {
        Self {
            state: Arc::new(RwLock::new(InMemoryTableState::default())),
            clock: Arc::new(DefaultClock),
        }
    }
}

impl InMemoryFallbackTable {
    /// Creates an empty, healthy table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C> Clone for InMemoryFallbackTable<C> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<C> fmt::Debug for InMemoryFallbackTable<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryFallbackTable").finish_non_exhaustive()
    }
}

impl<C> InMemoryFallbackTable<C>
where
    C: Clock + Send + Sync,
{
    /// Stamps new rows with `clock` instead of the wall clock.
    #[must_use]
    pub fn with_clock<D>(self, clock: Arc<D>) -> InMemoryFallbackTable<D>
    where
        D: Clock + Send + Sync,
    {
        InMemoryFallbackTable {
            state: self.state,
            clock,
        }
    }

    /// Makes every operation fail with `message`, or heals the table when
    /// `None`.
    ///
    /// # Errors
    ///
    /// Returns [`AuditStoreError::LockPoisoned`] when lock acquisition fails.
    pub fn set_failing(&self, message: Option<String>) -> AuditStoreResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        state.failing = message;
        Ok(())
    }

    /// Returns every row in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`AuditStoreError::LockPoisoned`] when lock acquisition fails.
    pub fn records(&self) -> AuditStoreResult<Vec<FallbackRecord>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.records.clone())
    }

    fn readable_events(&self) -> AuditStoreResult<Vec<StoredAuditEvent>> {
        let state = self.state.read().map_err(poisoned)?;
        if let Some(message) = &state.failing {
            return Err(AuditStoreError::connection(message.clone()));
        }
        state
            .records
            .iter()
            .map(|record| {
                let event = record
                    .to_event()
                    .map_err(|err| AuditStoreError::serialization(err.to_string()))?;
                Ok(StoredAuditEvent {
                    id: AuditRecordId::Fallback(record.id),
                    event,
                    source: SinkKind::FallbackRelational,
                })
            })
            .collect()
    }
}

#[async_trait]
impl<C> StoreProbe for InMemoryFallbackTable<C>
where
    C: Clock + Send + Sync,
{
    fn store_name(&self) -> &str {
        SinkKind::FallbackRelational.as_str()
    }

    async fn ping(&self) -> AuditStoreResult<()> {
        let state = self.state.read().map_err(poisoned)?;
        state.failing.as_ref().map_or(Ok(()), |message| {
            Err(AuditStoreError::connection(message.clone()))
        })
    }
}

#[async_trait]
impl<C> FallbackSink for InMemoryFallbackTable<C>
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
        let mut state = self
            .state
            .write()
            .map_err(|err| FallbackSinkError::new(self.kind(), poisoned(err)))?;
        if let Some(message) = &state.failing {
            return Err(FallbackSinkError::new(
                self.kind(),
                AuditStoreError::connection(message.clone()),
            ));
        }

        state.last_id += 1;
        let record = FallbackRecord::from_event(event, original_error, self.clock.utc())
            .with_id(state.last_id);
        state.records.push(record);
        Ok(())
    }
}

#[async_trait]
impl<C> AuditReader for InMemoryFallbackTable<C>
where
    C: Clock + Send + Sync,
{
    async fn find(&self, query: &AuditQuery) -> AuditStoreResult<Vec<StoredAuditEvent>> {
        let matching = self
            .readable_events()?
            .into_iter()
            .filter(|stored| query.matches(&stored.event))
            .collect();
        Ok(query.sort_and_page(matching))
    }

    async fn count(&self, query: &AuditQuery) -> AuditStoreResult<u64> {
        let events = self.readable_events()?;
        let count = events
            .iter()
            .filter(|stored| query.matches(&stored.event))
            .count();
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }

    async fn count_by_action(
        &self,
        range: &DateRange,
    ) -> AuditStoreResult<BTreeMap<AuditAction, u64>> {
        let events = self.readable_events()?;
        Ok(tally_actions(events.iter(), range))
    }
}
