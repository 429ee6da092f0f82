//! Result of a single audit write.

use super::SinkKind;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Describes where an audit event ended up.
///
/// Produced once per write and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteOutcome {
    sink: SinkKind,
    attempts: u32,
    accepted_at: DateTime<Utc>,
    last_error: Option<String>,
    terminal_failure: bool,
}

impl WriteOutcome {
    /// Creates an outcome for an event accepted by `sink`.
    ///
    /// `attempts` is clamped to at least one.
    #[must_use]
    pub fn accepted(sink: SinkKind, attempts: u32, accepted_at: DateTime<Utc>) -> Self {
        Self {
            sink,
            attempts: attempts.max(1),
            accepted_at,
            last_error: None,
            terminal_failure: false,
        }
    }

    /// Attaches the most recent diagnostic error.
    #[must_use]
    pub fn with_last_error(mut self, error: Option<String>) -> Self {
        self.last_error = error;
        self
    }

    /// Marks that even the last-resort sink failed.
    #[must_use]
    pub const fn into_terminal_failure(mut self) -> Self {
        self.terminal_failure = true;
        self
    }

    /// Returns the sink that accepted the event.
    #[must_use]
    pub const fn sink(&self) -> SinkKind {
        self.sink
    }

    /// Returns the number of primary-store attempts made.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Returns when the event was accepted.
    #[must_use]
    pub const fn accepted_at(&self) -> DateTime<Utc> {
        self.accepted_at
    }

    /// Returns the last error seen before acceptance, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Returns `true` when every sink, including the last resort, failed.
    #[must_use]
    pub const fn is_terminal_failure(&self) -> bool {
        self.terminal_failure
    }
}
