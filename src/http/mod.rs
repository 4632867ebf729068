//! HTTP module
//!
//! Provides the page fetch capability and the HTTP client behind it.
//!
//! # Features
//!
//! - **Page Fetching**: GET by URL, or GET/POST against an offset listing endpoint
//! - **Retry Policy**: Bounded attempts with constant, linear or exponential backoff
//! - **User Agents**: Fixed or randomly rotated per request
//! - **Rate Limiting**: Optional token bucket rate limiter using governor

mod client;
mod fetcher;
mod rate_limit;
mod retry;

pub use client::{HttpClient, HttpClientConfig, RequestConfig, DEFAULT_USER_AGENTS};
pub use fetcher::{HttpFetcher, ListingEndpoint, Page, PageFetcher};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
pub use retry::RetryPolicy;
