//! Domain-facing recording port.

use crate::audit::domain::{AuditEvent, WriteOutcome};
use async_trait::async_trait;

/// Infallible audit recording contract consumed by domain services.
///
/// Implementations must absorb every failure and always report where the
/// event ended up.
#[async_trait]
pub trait AuditRecorder: Send + Sync {
    /// Records `event` somewhere and reports the outcome.
    async fn record(&self, event: AuditEvent) -> WriteOutcome;
}
