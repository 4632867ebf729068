//! Retry policy for page fetches
//!
//! Bounded attempts with constant, linear or exponential backoff. A
//! server-provided `Retry-After` wins over the computed delay, capped at
//! `max_backoff`.

use crate::error::Error;
use crate::types::BackoffType;
use std::time::Duration;

/// Retry settings applied by the driver around every fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 = fail on first error)
    pub max_retries: u32,
    /// Type of backoff strategy
    pub backoff_type: BackoffType,
    /// Initial delay for backoff
    pub initial_backoff: Duration,
    /// Maximum delay for backoff
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_type: BackoffType::Exponential,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries; every fetch error is fatal
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Set max retries
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set backoff configuration
    #[must_use]
    pub fn with_backoff(mut self, backoff_type: BackoffType, initial: Duration, max: Duration) -> Self {
        self.backoff_type = backoff_type;
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    /// Whether `error` on attempt `attempt` (0-based) should be retried
    pub fn should_retry(&self, error: &Error, attempt: u32) -> bool {
        attempt < self.max_retries && error.is_retryable()
    }

    /// Calculate backoff delay for a given attempt
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let delay = match self.backoff_type {
            BackoffType::Constant => self.initial_backoff,
            BackoffType::Linear => self.initial_backoff.saturating_mul(attempt + 1),
            BackoffType::Exponential => {
                let factor = 2u32.saturating_pow(attempt);
                self.initial_backoff.saturating_mul(factor)
            }
        };

        std::cmp::min(delay, self.max_backoff)
    }

    /// Delay before retrying after `error`
    pub fn delay_for(&self, error: &Error, attempt: u32) -> Duration {
        match error.retry_after() {
            Some(seconds) => std::cmp::min(Duration::from_secs(seconds), self.max_backoff),
            None => self.calculate_backoff(attempt),
        }
    }
}
