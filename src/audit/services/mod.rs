//! Application services for the audit trail: event construction, the
//! resilient write path, and the read side.

mod builder;
mod fallback;
mod health;
mod query;
mod retry;
mod writer;

pub use builder::{AuditEventBuilder, DEFAULT_RETENTION_DAYS, SIGNIFICANT_FIELDS};
pub use fallback::{DEFAULT_SINK_TIMEOUT, FallbackChain, TerminalFailure};
pub use health::{ConnectionHealthChecker, HealthReport, HealthStatus, HealthSummary};
pub use query::{AuditPage, AuditQueryService, AuditStatistics, QuerySource};
pub use retry::RetryPolicy;
pub use writer::RetryingWriter;
