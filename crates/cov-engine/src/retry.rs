//! Per-course lock retry policy.
//!
//! Mutations of one course are serialized. A caller that cannot take the
//! course lock within `lock_timeout` backs off exponentially and tries again;
//! after `max_attempts` it gets [`EngineError::Conflict`](crate::EngineError).
//! The same budget bounds re-evaluation when a roadmap is replaced while a
//! merge is being evaluated.

use std::time::Duration;

use cov_config::LockingConfig;

/// Retry behavior for contended course locks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial one).
    pub max_attempts: u32,
    /// How long one attempt waits for the lock.
    pub lock_timeout: Duration,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Maximum delay between retries (backoff is capped here).
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from(&LockingConfig::default())
    }
}

impl From<&LockingConfig> for RetryConfig {
    fn from(config: &LockingConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            lock_timeout: Duration::from_millis(config.lock_timeout_ms),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

impl RetryConfig {
    /// Backoff after the given failed attempt (1-based): `base * 2^(attempt-1)`, capped.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1_u32 << exponent)
            .min(self.max_delay)
    }
}
