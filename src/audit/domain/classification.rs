//! Store error classification.
//!
//! A single signature table decides whether a store failure is worth
//! retrying. Matching is case-insensitive and substring-based so it works
//! for driver messages, pool errors, and `SQLSTATE` codes alike.

use serde::{Deserialize, Serialize};

/// Message fragments that indicate the store cannot be reached.
pub const CONNECTION_SIGNATURES: [&str; 15] = [
    "connection refused",
    "server has gone away",
    "lost connection",
    "too many connections",
    "timeout",
    "timed out",
    "broken pipe",
    "connection reset",
    "could not connect",
    "no connection to the server",
    "server closed the connection unexpectedly",
    "terminating connection",
    "connection is closed",
    "network is unreachable",
    "error connecting",
];

/// `PostgreSQL` `SQLSTATE` codes in the connection-exception class.
pub const CONNECTION_SQLSTATES: [&str; 9] = [
    "08000", "08001", "08003", "08004", "08006", "53300", "57P01", "57P02", "57P03",
];

/// Message fragments for failures that succeed when simply retried.
pub const TRANSIENT_SIGNATURES: [&str; 4] = [
    "deadlock detected",
    "could not serialize access",
    "try restarting transaction",
    "lock wait timeout",
];

/// `PostgreSQL` `SQLSTATE` codes for serialization and deadlock failures.
pub const TRANSIENT_SQLSTATES: [&str; 2] = ["40001", "40P01"];

/// Retry classification of a store failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// The store is unreachable or timed out.
    Connectivity,
    /// The store rejected the operation for a reason that may clear up.
    Transient,
    /// Retrying cannot help.
    Permanent,
}

impl ErrorClass {
    /// Classifies an error message against the signature tables.
    ///
    /// Transient signatures are checked first so that messages such as
    /// "lock wait timeout" are not mistaken for connectivity failures.
    ///
    /// # Examples
    ///
    /// ```
    /// use tasktrail::audit::domain::ErrorClass;
    ///
    /// assert_eq!(
    ///     ErrorClass::of_message("SQLSTATE[HY000]: connection refused"),
    ///     ErrorClass::Connectivity,
    /// );
    /// assert_eq!(
    ///     ErrorClass::of_message("duplicate key violation"),
    ///     ErrorClass::Permanent,
    /// );
    /// ```
    #[must_use]
    pub fn of_message(message: &str) -> Self {
        let lowered = message.to_ascii_lowercase();
        let uppered = message.to_ascii_uppercase();
        if contains_any(&lowered, &TRANSIENT_SIGNATURES)
            || contains_any(&uppered, &TRANSIENT_SQLSTATES)
        {
            return Self::Transient;
        }
        if contains_any(&lowered, &CONNECTION_SIGNATURES)
            || contains_any(&uppered, &CONNECTION_SQLSTATES)
        {
            return Self::Connectivity;
        }
        Self::Permanent
    }

    /// Returns `true` when the failure is worth retrying.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Connectivity | Self::Transient)
    }

    /// Returns the canonical representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connectivity => "connectivity",
            Self::Transient => "transient",
            Self::Permanent => "permanent",
        }
    }
}

/// Returns `true` if `message` matches the connection-class table.
#[must_use]
pub fn is_connection_message(message: &str) -> bool {
    ErrorClass::of_message(message) == ErrorClass::Connectivity
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}
