//! Last-resort sink writing to the process error channel.

use crate::audit::{
    domain::{AuditEvent, SinkKind},
    ports::{AuditStoreError, FallbackSink, FallbackSinkError},
};
use async_trait::async_trait;
use chrono::SecondsFormat;
use mockable::{Clock, DefaultClock};
use serde_json::json;
use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex};

const LINE_MESSAGE: &str = "Audit event could not be persisted to any store";

type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

/// Writes one structured line per event to an injected writer and emits a
/// `tracing` error.
///
/// The writer defaults to standard error. The sink is not retried; if the
/// writer itself fails the failure is returned so the chain can report a
/// terminal failure.
pub struct ProcessErrorSink<C = DefaultClock> {
    writer: SharedWriter,
    clock: Arc<C>,
}

impl ProcessErrorSink {
    /// Creates a sink writing to standard error.
    #[must_use]
    pub fn new() -> Self {
        Self::with_writer(std::io::stderr())
    }

    /// Creates a sink writing to `writer`.
    #[must_use]
    pub fn with_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Arc::new(Mutex::new(Box::new(writer))),
            clock: Arc::new(DefaultClock),
        }
    }
}

impl<C> Clone for ProcessErrorSink<C> {
    fn clone(&self) -> Self {
        Self {
            writer: Arc::clone(&self.writer),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<C> ProcessErrorSink<C>
where
    C: Clock + Send + Sync,
{
    /// Timestamps lines with `clock` instead of the wall clock.
    #[must_use]
    pub fn with_clock<D>(self, clock: Arc<D>) -> ProcessErrorSink<D>
    where
        D: Clock + Send + Sync,
    {
        ProcessErrorSink {
            writer: self.writer,
            clock,
        }
    }

    fn write_line(
        &self,
        event: &AuditEvent,
        original_error: Option<&str>,
    ) -> Result<(), AuditStoreError> {
        let line = json!({
            "timestamp": self.clock.utc().to_rfc3339_opts(SecondsFormat::Micros, true),
            "level": "error",
            "message": LINE_MESSAGE,
            "context": {
                "entity_id": event.entity_id(),
                "action": event.action().as_str(),
                "payload": {
                    "event": event,
                    "original_error": original_error,
                },
                "source": "audit_fallback",
            },
        });
        let mut rendered = serde_json::to_string(&line)
            .map_err(|err| AuditStoreError::serialization(err.to_string()))?;
        rendered.push('\n');

        let mut writer = self
            .writer
            .lock()
            .map_err(|err| AuditStoreError::LockPoisoned(err.to_string()))?;
        writer
            .write_all(rendered.as_bytes())
            .and_then(|()| writer.flush())
            .map_err(AuditStoreError::io)
    }
}

impl Default for ProcessErrorSink {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for ProcessErrorSink<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessErrorSink").finish_non_exhaustive()
    }
}

#[async_trait]
impl<C> FallbackSink for ProcessErrorSink<C>
where
    C: Clock + Send + Sync,
{
    fn kind(&self) -> SinkKind {
        SinkKind::FallbackErrorlog
    }

    async fn accept(
        &self,
        event: &AuditEvent,
        original_error: Option<&str>,
    ) -> Result<(), FallbackSinkError> {
        tracing::error!(
            entity_id = event.entity_id(),
            action = %event.action(),
            original_error = original_error.unwrap_or_default(),
            "audit event could not be persisted to any store"
        );
        self.write_line(event, original_error)
            .map_err(|err| FallbackSinkError::new(self.kind(), err))
    }
}
