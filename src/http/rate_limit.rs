//! Request rate ceiling
//!
//! An optional governor token bucket in front of every request. The
//! pagination driver's inter-page delay still applies on top of it.

use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Governor};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Requests allowed per second, and how many may go out back to back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimiterConfig {
    /// Sustained requests per second
    pub requests_per_second: u32,
    /// Requests that may be sent without waiting
    pub burst_size: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self::per_second(1)
    }
}

impl RateLimiterConfig {
    /// Explicit rate and burst
    pub fn new(requests_per_second: u32, burst_size: u32) -> Self {
        Self {
            requests_per_second,
            burst_size,
        }
    }

    /// `requests_per_second` with no bursting, so requests stay evenly spaced
    pub fn per_second(requests_per_second: u32) -> Self {
        Self::new(requests_per_second, 1)
    }
}

/// Shared token bucket; clones draw from the same bucket
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<Governor<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>>,
}

impl RateLimiter {
    /// Build a bucket; zero rates are raised to one
    pub fn new(config: &RateLimiterConfig) -> Self {
        let quota = Quota::per_second(at_least_one(config.requests_per_second))
            .allow_burst(at_least_one(config.burst_size));

        Self {
            limiter: Arc::new(Governor::direct(quota)),
        }
    }

    /// Wait for a token
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }

    /// Take a token if one is available right now
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").finish_non_exhaustive()
    }
}

fn at_least_one(value: u32) -> NonZeroU32 {
    NonZeroU32::new(value).unwrap_or(NonZeroU32::MIN)
}
