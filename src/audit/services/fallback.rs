//! Ordered cascade of fallback sinks.

use crate::audit::{
    domain::{AuditAction, AuditEvent, SinkKind, WriteOutcome},
    ports::{AuditStoreError, FallbackSink, FallbackSinkError},
};
use mockable::Clock;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Every sink, including the last resort, refused an event.
///
/// This value is only ever logged; it never reaches the domain caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("audit event for entity {entity_id} ({action}) was not persisted: {last_error}")]
pub struct TerminalFailure {
    /// Audited entity identifier.
    pub entity_id: i64,
    /// Audited action.
    pub action: AuditAction,
    /// Failure reported by the last-resort sink.
    pub last_error: String,
}

/// Per-sink time limit used when the caller supplies none.
pub const DEFAULT_SINK_TIMEOUT: Duration = Duration::from_secs(5);

/// Walks the fallback sinks in a fixed order until one accepts.
///
/// Each sink gets its own time limit; a sink that overruns it is treated
/// as having refused the event and the chain moves on.
#[derive(Clone)]
pub struct FallbackChain<C>
where
    C: Clock + Send + Sync,
{
    sinks: Vec<Arc<dyn FallbackSink>>,
    sink_timeout: Duration,
    clock: Arc<C>,
}

impl<C> FallbackChain<C>
where
    C: Clock + Send + Sync,
{
    /// Creates the chain `[relational, file, last_resort]`.
    #[must_use]
    pub fn new(
        relational: Arc<dyn FallbackSink>,
        file: Arc<dyn FallbackSink>,
        last_resort: Arc<dyn FallbackSink>,
        clock: Arc<C>,
    ) -> Self {
        Self {
            sinks: vec![relational, file, last_resort],
            sink_timeout: DEFAULT_SINK_TIMEOUT,
            clock,
        }
    }

    /// Overrides the per-sink time limit used by [`Self::try_write`].
    #[must_use]
    pub const fn with_sink_timeout(mut self, sink_timeout: Duration) -> Self {
        self.sink_timeout = sink_timeout;
        self
    }

    /// Returns the sink kinds in the order they are tried.
    #[must_use]
    pub fn order(&self) -> Vec<SinkKind> {
        self.sinks.iter().map(|sink| sink.kind()).collect()
    }

    /// Offers `event` to each sink in turn.
    ///
    /// `original_error` is the primary failure handed to every sink for
    /// diagnostics and `attempts` is the number of primary attempts already
    /// made. The returned outcome names the first sink that accepted; if
    /// none did, it names the last resort and is flagged as a terminal
    /// failure.
    pub async fn try_write(
        &self,
        event: &AuditEvent,
        original_error: Option<String>,
        attempts: u32,
    ) -> WriteOutcome {
        self.try_write_within(event, original_error, attempts, self.sink_timeout)
            .await
    }

    /// Offers `event` to each sink in turn, allowing each at most
    /// `sink_timeout`.
    pub async fn try_write_within(
        &self,
        event: &AuditEvent,
        original_error: Option<String>,
        attempts: u32,
        sink_timeout: Duration,
    ) -> WriteOutcome {
        let mut last_error = original_error.clone();
        let mut last_sink = SinkKind::FallbackErrorlog;

        for sink in &self.sinks {
            last_sink = sink.kind();
            match accept_within(sink.as_ref(), event, original_error.as_deref(), sink_timeout)
                .await
            {
                Ok(()) => {
                    info!(
                        sink = %last_sink,
                        entity_id = event.entity_id(),
                        action = %event.action(),
                        attempts,
                        "audit event accepted by fallback sink"
                    );
                    return WriteOutcome::accepted(last_sink, attempts, self.clock.utc())
                        .with_last_error(last_error);
                }
                Err(err) => {
                    warn!(
                        sink = %last_sink,
                        entity_id = event.entity_id(),
                        action = %event.action(),
                        error = %err,
                        "fallback sink rejected audit event"
                    );
                    last_error = Some(err.to_string());
                }
            }
        }

        let failure = TerminalFailure {
            entity_id: event.entity_id(),
            action: event.action(),
            last_error: last_error.clone().unwrap_or_default(),
        };
        error!(error = %failure, attempts, "audit trail terminal failure");
        WriteOutcome::accepted(last_sink, attempts, self.clock.utc())
            .with_last_error(last_error)
            .into_terminal_failure()
    }
}

async fn accept_within(
    sink: &dyn FallbackSink,
    event: &AuditEvent,
    original_error: Option<&str>,
    limit: Duration,
) -> Result<(), FallbackSinkError> {
    tokio::time::timeout(limit, sink.accept(event, original_error))
        .await
        .unwrap_or_else(|_elapsed| {
            Err(FallbackSinkError::new(
                sink.kind(),
                AuditStoreError::Timeout(limit),
            ))
        })
}
