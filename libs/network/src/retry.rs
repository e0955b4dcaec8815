//! Retry Controller
//!
//! Decides whether a normalized failure is retried and how long to wait.
//! Backoff is `base_delay * 2^attempt` with no jitter and no upper cap; a cap
//! is left as a tuning parameter for deployments that raise `max_retries`.
//!
//! The same [`RetryPolicy`] value is used by the transport pipeline and by the
//! operation controllers. When both layers retry, the total number of attempts
//! for one logical fetch is the product reported by
//! [`RetryPolicy::total_attempts_with`]; pass [`RetryPolicy::disabled`] to one
//! layer to keep it at a single attempt.

use crate::normalizer::EnhancedError;
use dashboard_config::ClientConfig;
use std::time::Duration;

/// Whether `error` should be retried given `attempt` retries already made
pub fn should_retry(error: &EnhancedError, attempt: u32, max_attempts: u32) -> bool {
    attempt < max_attempts && error.is_retryable()
}

/// Backoff before retry number `attempt` (zero-based): `base * 2^attempt`
pub fn delay_for(attempt: u32, base_delay: Duration) -> Duration {
    let base_ms = u64::try_from(base_delay.as_millis()).unwrap_or(u64::MAX);
    let multiplier = 2_u64.checked_pow(attempt).unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(multiplier))
}

/// Bounded exponential retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// A policy that never retries
    pub fn disabled() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.max_retries, config.retry_base_delay())
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn is_enabled(&self) -> bool {
        self.max_retries > 0
    }

    pub fn should_retry(&self, error: &EnhancedError, attempt: u32) -> bool {
        should_retry(error, attempt, self.max_retries)
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        delay_for(attempt, self.base_delay)
    }

    /// Worst-case invocations of the underlying call when `self` is stacked
    /// on top of `inner`
    pub fn total_attempts_with(&self, inner: &RetryPolicy) -> u32 {
        self.max_retries
            .saturating_add(1)
            .saturating_mul(inner.max_retries.saturating_add(1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}
