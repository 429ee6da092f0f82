//! Fallback sink port.

use super::AuditStoreError;
use crate::audit::domain::{AuditEvent, SinkKind};
use async_trait::async_trait;
use thiserror::Error;

/// Alternate persistence target tried after the primary store fails.
///
/// Each sink reports failure as a value so the fallback chain can decide
/// whether to advance; sinks never panic to signal a fallback.
#[async_trait]
pub trait FallbackSink: Send + Sync {
    /// Returns the identifier reported in write outcomes.
    fn kind(&self) -> SinkKind;

    /// Persists `event`, recording `original_error` when the sink supports
    /// it.
    ///
    /// # Errors
    ///
    /// Returns [`FallbackSinkError`] when the sink cannot accept the event.
    async fn accept(
        &self,
        event: &AuditEvent,
        original_error: Option<&str>,
    ) -> Result<(), FallbackSinkError>;
}

/// Failure of one fallback sink.
#[derive(Debug, Clone, Error)]
#[error("{sink} sink failed: {source}")]
pub struct FallbackSinkError {
    /// Sink that failed.
    pub sink: SinkKind,
    /// Underlying failure.
    pub source: AuditStoreError,
}

impl FallbackSinkError {
    /// Creates a sink error.
    #[must_use]
    pub const fn new(sink: SinkKind, source: AuditStoreError) -> Self {
        Self { sink, source }
    }
}
