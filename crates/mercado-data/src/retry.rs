//! How often, and how patiently, a failed fetch is repeated.

use std::time::Duration;

use crate::FetchError;

/// Pause inserted before each retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackoffStrategy {
    None,
    Fixed(Duration),
    /// Doubles from `base` on every retry, never above `max`.
    Exponential { base: Duration, max: Duration },
}

impl BackoffStrategy {
    /// Pause before retry number `retry` (0 is the first retry).
    pub fn delay_for_attempt(&self, retry: u32) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Fixed(delay) => *delay,
            Self::Exponential { base, max } => base
                .checked_mul(2u32.saturating_pow(retry))
                .map_or(*max, |delay| delay.min(*max)),
        }
    }
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(250),
            max: Duration::from_secs(2),
        }
    }
}

/// Retry budget for one request. Only transient failures are retried; see
/// [`FetchError::is_transient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_attempts: u32,
    pub backoff: BackoffStrategy,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: BackoffStrategy::default(),
        }
    }

    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 0,
            backoff: BackoffStrategy::None,
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Whether the failure of attempt `attempt` (0-based) earns another try.
    pub fn should_retry(&self, error: &FetchError, attempt: u32) -> bool {
        attempt < self.max_attempts && error.is_transient()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(1)
    }
}
