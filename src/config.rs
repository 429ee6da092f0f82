//! Explicit configuration for the audit trail.
//!
//! Configuration is an ordinary value built by the application and injected
//! into writers, sinks, and query services at construction time. The
//! [`AuditConfigHandle`] allows a validated configuration to be swapped in
//! at runtime. The writer and query service read a snapshot at the start of
//! each operation, as does the task service once given the handle through
//! `with_config`. The `file_sink` section is only read when the file sink is
//! built; a reload does not move an existing sink.

use crate::audit::adapters::FileSink;
use crate::audit::domain::{MAX_QUERY_LIMIT, QueryLimits};
use crate::audit::services::RetryPolicy;
use camino::Utf8PathBuf;
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;

/// Retry settings for the primary store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total number of primary attempts per write.
    pub max_attempts: u32,
    /// Delay before the second attempt, doubled for each further attempt.
    pub base_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
        }
    }
}

/// Location of the dated fallback log files.
///
/// Fixed for the lifetime of a [`FileSink`](crate::audit::adapters::FileSink);
/// see [`FileSinkConfig::build_sink`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSinkConfig {
    /// Directory holding the log files; created when absent.
    pub directory: Utf8PathBuf,
    /// File name prefix, followed by `-YYYY-MM-DD.log`.
    pub file_prefix: String,
}

impl Default for FileSinkConfig {
    fn default() -> Self {
        Self {
            directory: Utf8PathBuf::from("storage/logs"),
            file_prefix: "audit-fallback".to_owned(),
        }
    }
}

impl FileSinkConfig {
    /// Builds the file sink these settings describe.
    #[must_use]
    pub fn build_sink<C>(&self, clock: Arc<C>) -> FileSink<C>
    where
        C: Clock + Send + Sync + 'static,
    {
        FileSink::new(self.directory.clone(), self.file_prefix.clone(), clock)
    }
}

/// Statistics window settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticsConfig {
    /// Length of the "recent activity" window in hours.
    pub recent_window_hours: u32,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            recent_window_hours: 24,
        }
    }
}

/// Retention hints attached to deletion events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Days a soft-deleted task stays recoverable.
    pub soft_delete_days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            soft_delete_days: 30,
        }
    }
}

/// Complete audit trail configuration.
///
/// # Examples
///
/// ```
/// use tasktrail::config::AuditConfig;
///
/// let config = AuditConfig::from_toml_str(
///     "connection_timeout_ms = 250\n[retry]\nbase_delay_ms = 10\n",
/// )
/// .expect("valid configuration");
///
/// assert_eq!(config.retry.max_attempts, 3);
/// assert_eq!(config.retry.base_delay_ms, 10);
/// assert_eq!(config.connection_timeout_ms, 250);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Primary store retry settings.
    pub retry: RetrySettings,
    /// Health probe timeout in milliseconds.
    pub connection_timeout_ms: u64,
    /// File sink settings.
    pub file_sink: FileSinkConfig,
    /// Read-side page limits.
    pub query: QueryLimits,
    /// Statistics settings.
    pub statistics: StatisticsConfig,
    /// Retention settings.
    pub retention: RetentionConfig,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            retry: RetrySettings::default(),
            connection_timeout_ms: 5_000,
            file_sink: FileSinkConfig::default(),
            query: QueryLimits::default(),
            statistics: StatisticsConfig::default(),
            retention: RetentionConfig::default(),
        }
    }
}

impl AuditConfig {
    /// Parses and validates a TOML document. Missing keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] when validation fails.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(source).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Creates a configuration suited to tests: no backoff delay and a
    /// short probe timeout.
    #[must_use]
    pub fn fast() -> Self {
        Self {
            retry: RetrySettings {
                max_attempts: 3,
                base_delay_ms: 0,
            },
            connection_timeout_ms: 200,
            ..Self::default()
        }
    }

    /// Checks the configuration for values the audit trail cannot honour.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::invalid("retry.max_attempts must be at least 1"));
        }
        if self.connection_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "connection_timeout_ms must be greater than zero",
            ));
        }
        if self.query.max_limit == 0 || self.query.max_limit > MAX_QUERY_LIMIT {
            return Err(ConfigError::invalid(format!(
                "query.max_limit must be between 1 and {MAX_QUERY_LIMIT}"
            )));
        }
        if self.query.default_limit > self.query.max_limit {
            return Err(ConfigError::invalid(
                "query.default_limit must not exceed query.max_limit",
            ));
        }
        if self.file_sink.file_prefix.trim().is_empty() {
            return Err(ConfigError::invalid("file_sink.file_prefix must not be empty"));
        }
        Ok(())
    }

    /// Returns the health probe timeout.
    #[must_use]
    pub const fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    /// Returns the retry policy for the primary store.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.base_delay_ms),
        )
    }
}

/// Shared, reloadable configuration.
#[derive(Debug, Clone)]
pub struct AuditConfigHandle {
    inner: Arc<RwLock<AuditConfig>>,
}

impl AuditConfigHandle {
    /// Wraps an initial configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the configuration fails
    /// validation.
    pub fn new(config: AuditConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(RwLock::new(config)),
        })
    }

    /// Returns a copy of the current configuration.
    ///
    /// A poisoned lock still yields the last written value.
    #[must_use]
    pub fn snapshot(&self) -> AuditConfig {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Validates and installs a new configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] and keeps the previous configuration
    /// when validation fails.
    pub fn reload(&self, config: AuditConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *guard = config;
        Ok(())
    }
}

impl Default for AuditConfigHandle {
    fn default() -> Self {
        Self {
            inner: Arc::new(RwLock::new(AuditConfig::default())),
        }
    }
}

/// Configuration loading and validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The TOML document could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// A value is outside the accepted range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}
