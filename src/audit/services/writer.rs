//! Health-aware retrying writer for the primary store.

use super::{ConnectionHealthChecker, FallbackChain};
use crate::audit::{
    domain::{AuditEvent, SinkKind, WriteOutcome},
    ports::{AuditRecorder, AuditStore, AuditStoreError},
};
use crate::config::AuditConfigHandle;
use async_trait::async_trait;
use mockable::Clock;
use std::sync::Arc;
use tracing::{debug, warn};

const UNHEALTHY_WITHOUT_DETAIL: &str = "primary store failed its health check";

/// Writes audit events to the primary store with bounded retries and hands
/// them to the fallback chain when the store cannot take them.
///
/// Each call reads a configuration snapshot, so a reload applies to the
/// next write. Before every attempt the store is probed; a failed probe
/// abandons the remaining attempts. The probe, the insert and every
/// fallback sink call are each bounded by `connection_timeout`; an insert
/// that overruns counts as a connectivity failure. Connectivity and
/// transient failures are retried after `base_delay * 2^(attempt - 1)`;
/// anything else goes straight to the fallback chain. The writer never
/// returns an error.
pub struct RetryingWriter<S, C>
where
    S: AuditStore,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    fallback: FallbackChain<C>,
    config: AuditConfigHandle,
    clock: Arc<C>,
}

impl<S, C> RetryingWriter<S, C>
where
    S: AuditStore,
    C: Clock + Send + Sync,
{
    /// Creates a writer.
    #[must_use]
    pub const fn new(
        store: Arc<S>,
        fallback: FallbackChain<C>,
        config: AuditConfigHandle,
        clock: Arc<C>,
    ) -> Self {
        Self {
            store,
            fallback,
            config,
            clock,
        }
    }

    /// Returns the fallback chain.
    #[must_use]
    pub const fn fallback(&self) -> &FallbackChain<C> {
        &self.fallback
    }

    /// Persists `event`, reporting where it ended up.
    pub async fn write(&self, event: AuditEvent) -> WriteOutcome {
        let config = self.config.snapshot();
        let policy = config.retry_policy();
        let timeout = config.connection_timeout();
        let checker = ConnectionHealthChecker::new(timeout, Arc::clone(&self.clock));

        let mut attempt = 0;
        let mut last_error: Option<String> = None;
        while attempt < policy.max_attempts() {
            attempt += 1;

            let report = checker.probe(self.store.as_ref()).await;
            if !report.is_healthy() {
                let reason = report
                    .error
                    .unwrap_or_else(|| UNHEALTHY_WITHOUT_DETAIL.to_owned());
                warn!(
                    store = %report.store,
                    attempt,
                    error = %reason,
                    "primary audit store unhealthy, skipping remaining attempts"
                );
                last_error = Some(reason);
                break;
            }

            let inserted = tokio::time::timeout(timeout, self.store.insert(&event))
                .await
                .unwrap_or_else(|_elapsed| Err(AuditStoreError::Timeout(timeout)));
            match inserted {
                Ok(record_id) => {
                    debug!(
                        record_id = %record_id,
                        entity_id = event.entity_id(),
                        action = %event.action(),
                        attempt,
                        "audit event written to primary store"
                    );
                    return WriteOutcome::accepted(SinkKind::Primary, attempt, self.clock.utc())
                        .with_last_error(last_error);
                }
                Err(err) => {
                    let class = err.class();
                    warn!(
                        entity_id = event.entity_id(),
                        action = %event.action(),
                        attempt,
                        class = class.as_str(),
                        error = %err,
                        "primary audit write failed"
                    );
                    last_error = Some(err.to_string());
                    if !policy.should_retry(class, attempt) {
                        break;
                    }
                    tokio::time::sleep(policy.delay_for_attempt(attempt)).await;
                }
            }
        }

        self.fallback
            .try_write_within(&event, last_error, attempt, timeout)
            .await
    }
}

#[async_trait]
impl<S, C> AuditRecorder for RetryingWriter<S, C>
where
    S: AuditStore,
    C: Clock + Send + Sync,
{
    async fn record(&self, event: AuditEvent) -> WriteOutcome {
        self.write(event).await
    }
}
