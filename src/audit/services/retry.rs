//! Bounded exponential backoff for the primary store.

use crate::audit::domain::ErrorClass;
use std::time::Duration;

/// Retry budget and backoff schedule.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tasktrail::audit::services::RetryPolicy;
///
/// let policy = RetryPolicy::new(3, Duration::from_millis(100));
/// assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
/// assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
/// assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy. A budget of zero attempts is raised to one.
    #[must_use]
    pub const fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: if max_attempts == 0 { 1 } else { max_attempts },
            base_delay,
        }
    }

    /// Returns the total number of attempts.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the delay after the first failed attempt.
    #[must_use]
    pub const fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Returns `base_delay * 2^(attempt - 1)`, saturating on overflow.
    #[must_use]
    pub const fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }

    /// Returns `true` when a failure of `class` on `attempt` should be
    /// followed by another attempt.
    #[must_use]
    pub const fn should_retry(&self, class: ErrorClass, attempt: u32) -> bool {
        class.is_retryable() && attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(100))
    }
}
