//! Store liveness probing and health aggregation.

use crate::audit::{
    domain::{ErrorClass, is_connection_message},
    ports::{AuditStoreError, StoreProbe},
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

const NOT_CONFIGURED: &str = "store not configured";

/// Health of one store or of the whole set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// The probe round trip succeeded.
    Healthy,
    /// Some, but not all, stores are healthy.
    Degraded,
    /// The probe failed or timed out.
    Failed,
}

impl HealthStatus {
    /// Returns the canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Failed => "failed",
        }
    }
}

/// Result of probing one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    /// Probed store name.
    pub store: String,
    /// Probe verdict.
    pub status: HealthStatus,
    /// Round-trip time, or the time spent before giving up.
    pub response_time: Duration,
    /// Failure description when the probe failed.
    pub error: Option<String>,
    /// Failure classification when the probe failed.
    pub error_class: Option<ErrorClass>,
    /// When the probe finished.
    pub checked_at: DateTime<Utc>,
}

impl HealthReport {
    /// Returns `true` if the store answered in time.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }

    /// Returns the response time in whole milliseconds.
    #[must_use]
    pub fn response_time_ms(&self) -> u64 {
        u64::try_from(self.response_time.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Aggregated health across every configured store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthSummary {
    /// Healthy when all stores are healthy, failed when all failed or none
    /// are configured, degraded otherwise.
    pub overall: HealthStatus,
    /// Per-store reports in registration order.
    pub stores: Vec<HealthReport>,
    /// When the summary was assembled.
    pub checked_at: DateTime<Utc>,
}

/// Probes stores within a bounded timeout.
#[derive(Clone)]
pub struct ConnectionHealthChecker<C>
where
    C: Clock + Send + Sync,
{
    timeout: Duration,
    clock: Arc<C>,
    stores: Vec<Arc<dyn StoreProbe>>,
}

impl<C> ConnectionHealthChecker<C>
where
    C: Clock + Send + Sync,
{
    /// Creates a checker with no registered stores.
    #[must_use]
    pub const fn new(timeout: Duration, clock: Arc<C>) -> Self {
        Self {
            timeout,
            clock,
            stores: Vec::new(),
        }
    }

    /// Registers a store for [`Self::test_connection`] and
    /// [`Self::health_summary`].
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn StoreProbe>) -> Self {
        self.stores.push(store);
        self
    }

    /// Returns the probe timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Pings `store`, giving up after the configured timeout.
    pub async fn probe(&self, store: &dyn StoreProbe) -> HealthReport {
        let started = tokio::time::Instant::now();
        let outcome = tokio::time::timeout(self.timeout, store.ping()).await;
        let response_time = started.elapsed();

        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(err),
            Err(_elapsed) => Some(AuditStoreError::Timeout(self.timeout)),
        };
        HealthReport {
            store: store.store_name().to_owned(),
            status: if failure.is_some() {
                HealthStatus::Failed
            } else {
                HealthStatus::Healthy
            },
            response_time,
            error_class: failure.as_ref().map(AuditStoreError::class),
            error: failure.map(|err| err.to_string()),
            checked_at: self.clock.utc(),
        }
    }

    /// Probes the registered store called `name`.
    ///
    /// Unknown names produce a failed report rather than an error.
    pub async fn test_connection(&self, name: &str) -> HealthReport {
        let registered = self
            .stores
            .iter()
            .find(|store| store.store_name() == name)
            .cloned();
        match registered {
            Some(store) => self.probe(store.as_ref()).await,
            None => HealthReport {
                store: name.to_owned(),
                status: HealthStatus::Failed,
                response_time: Duration::ZERO,
                error: Some(NOT_CONFIGURED.to_owned()),
                error_class: Some(ErrorClass::Permanent),
                checked_at: self.clock.utc(),
            },
        }
    }

    /// Probes every registered store in order and aggregates the verdicts.
    pub async fn health_summary(&self) -> HealthSummary {
        let mut stores = Vec::with_capacity(self.stores.len());
        for store in &self.stores {
            stores.push(self.probe(store.as_ref()).await);
        }

        let healthy = stores.iter().filter(|report| report.is_healthy()).count();
        let overall = if stores.is_empty() || healthy == 0 {
            HealthStatus::Failed
        } else if healthy == stores.len() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };
        HealthSummary {
            overall,
            stores,
            checked_at: self.clock.utc(),
        }
    }

    /// Returns `true` if `error` means the store could not be reached.
    #[must_use]
    pub fn is_connection_error(error: &AuditStoreError) -> bool {
        error.class() == ErrorClass::Connectivity
    }

    /// Returns `true` if `message` matches the connection-class signature
    /// table.
    #[must_use]
    pub fn is_connection_error_message(message: &str) -> bool {
        is_connection_message(message)
    }
}
