//! In-memory primary audit store.

use super::{poisoned, tally_actions};
use crate::audit::{
    domain::{
        AuditAction, AuditDocument, AuditEvent, AuditQuery, AuditRecordId, DateRange, SinkKind,
        StoredAuditEvent,
    },
    ports::{AuditReader, AuditStore, AuditStoreError, AuditStoreResult, StoreProbe},
};
use async_trait::async_trait;
use mockable::{Clock, DefaultClock};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use uuid::Uuid;

const UNREACHABLE_MESSAGE: &str = "connection refused";

/// Thread-safe in-memory document store.
///
/// Failure injection mirrors the ways a networked store misbehaves: the
/// whole store can be unreachable, individual inserts can fail with a
/// chosen error, reads can fail, and pings or inserts can be slowed down to
/// exercise timeouts. Documents are stamped with the injected clock.
pub struct InMemoryAuditStore<C = DefaultClock> {
    name: String,
    state: Arc<RwLock<InMemoryStoreState>>,
    clock: Arc<C>,
}

#[derive(Debug, Default)]
struct InMemoryStoreState {
    documents: Vec<AuditDocument>,
    unreachable: bool,
    pending_failures: VecDeque<AuditStoreError>,
    read_failure: Option<AuditStoreError>,
    ping_latency: Option<Duration>,
    insert_latency: Option<Duration>,
    insert_count: u32,
}

impl Default for InMemoryAuditStore {
    fn default() -> Self {
        Self::named(SinkKind::Primary.as_str())
    }
}

impl InMemoryAuditStore {
    /// Creates an empty, reachable store named `primary`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store reported under `name`.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(RwLock::new(InMemoryStoreState::default())),
            clock: Arc::new(DefaultClock),
        }
    }
}

impl<C> Clone for InMemoryAuditStore<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            state: Arc::clone(&self.state),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<C> fmt::Debug for InMemoryAuditStore<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryAuditStore")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<C> InMemoryAuditStore<C>
where
    C: Clock + Send + Sync,
{
    /// Stamps stored documents with `clock` instead of the wall clock.
    #[must_use]
    pub fn with_clock<D>(self, clock: Arc<D>) -> InMemoryAuditStore<D>
    where
        D: Clock + Send + Sync,
    {
        InMemoryAuditStore {
            name: self.name,
            state: self.state,
            clock,
        }
    }

    /// Makes every operation fail with a connection error, or restores the
    /// store.
    ///
    /// # Errors
    ///
    /// Returns [`AuditStoreError::LockPoisoned`] when lock acquisition fails.
    pub fn set_unreachable(&self, unreachable: bool) -> AuditStoreResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        state.unreachable = unreachable;
        Ok(())
    }

    /// Queues `count` insert failures, each returning a clone of `error`.
    ///
    /// # Errors
    ///
    /// Returns [`AuditStoreError::LockPoisoned`] when lock acquisition fails.
    pub fn fail_next(&self, count: usize, error: AuditStoreError) -> AuditStoreResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        state
            .pending_failures
            .extend(std::iter::repeat_n(error, count));
        Ok(())
    }

    /// Makes every read fail with `error` until cleared with `None`.
    ///
    /// # Errors
    ///
    /// Returns [`AuditStoreError::LockPoisoned`] when lock acquisition fails.
    pub fn set_read_failure(&self, error: Option<AuditStoreError>) -> AuditStoreResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        state.read_failure = error;
        Ok(())
    }

    /// Delays every ping by `latency`.
    ///
    /// # Errors
    ///
    /// Returns [`AuditStoreError::LockPoisoned`] when lock acquisition fails.
    pub fn set_ping_latency(&self, latency: Option<Duration>) -> AuditStoreResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        state.ping_latency = latency;
        Ok(())
    }

    /// Delays every insert by `latency` before it touches the store.
    ///
    /// # Errors
    ///
    /// Returns [`AuditStoreError::LockPoisoned`] when lock acquisition fails.
    pub fn set_insert_latency(&self, latency: Option<Duration>) -> AuditStoreResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        state.insert_latency = latency;
        Ok(())
    }

    /// Returns every stored document in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`AuditStoreError::LockPoisoned`] when lock acquisition fails.
    pub fn documents(&self) -> AuditStoreResult<Vec<AuditDocument>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.documents.clone())
    }

    /// Returns how many inserts reached the store, successful or not.
    ///
    /// # Errors
    ///
    /// Returns [`AuditStoreError::LockPoisoned`] when lock acquisition fails.
    pub fn insert_count(&self) -> AuditStoreResult<u32> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.insert_count)
    }

    fn readable_events(&self) -> AuditStoreResult<Vec<StoredAuditEvent>> {
        let state = self.state.read().map_err(poisoned)?;
        if state.unreachable {
            return Err(AuditStoreError::connection(UNREACHABLE_MESSAGE));
        }
        if let Some(error) = &state.read_failure {
            return Err(error.clone());
        }
        state
            .documents
            .iter()
            .cloned()
            .map(|document| {
                let id = AuditRecordId::Document(document.id);
                let event = document
                    .into_event()
                    .map_err(|err| AuditStoreError::serialization(err.to_string()))?;
                Ok(StoredAuditEvent {
                    id,
                    event,
                    source: SinkKind::Primary,
                })
            })
            .collect()
    }
}

#[async_trait]
impl<C> StoreProbe for InMemoryAuditStore<C>
where
    C: Clock + Send + Sync,
{
    fn store_name(&self) -> &str {
        &self.name
    }

    async fn ping(&self) -> AuditStoreResult<()> {
        let (unreachable, latency) = {
            let state = self.state.read().map_err(poisoned)?;
            (state.unreachable, state.ping_latency)
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if unreachable {
            return Err(AuditStoreError::connection(UNREACHABLE_MESSAGE));
        }
        Ok(())
    }
}

#[async_trait]
impl<C> AuditStore for InMemoryAuditStore<C>
where
    C: Clock + Send + Sync,
{
    async fn insert(&self, event: &AuditEvent) -> AuditStoreResult<AuditRecordId> {
        let latency = {
            let mut state = self.state.write().map_err(poisoned)?;
            state.insert_count = state.insert_count.saturating_add(1);
            state.insert_latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.write().map_err(poisoned)?;
        if state.unreachable {
            return Err(AuditStoreError::connection(UNREACHABLE_MESSAGE));
        }
        if let Some(error) = state.pending_failures.pop_front() {
            return Err(error);
        }

        let id = Uuid::new_v4();
        state
            .documents
            .push(AuditDocument::from_event(id, event, self.clock.utc()));
        Ok(AuditRecordId::Document(id))
    }
}

#[async_trait]
impl<C> AuditReader for InMemoryAuditStore<C>
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
