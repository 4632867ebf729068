//! HTTP client with header rotation and rate limiting
//!
//! Provides an HTTP client that handles:
//! - Fixed or randomly rotated user agents
//! - Optional token bucket rate limiting
//! - Error classification for the driver's retry decisions
//!
//! Every call is a single attempt. Retrying is owned by the pagination
//! driver so the same policy applies to any fetcher.

use super::rate_limit::{RateLimiter, RateLimiterConfig};
use crate::error::{Error, Result};
use rand::seq::SliceRandom;
use reqwest::header::USER_AGENT;
use reqwest::{Client, Method, Response, StatusCode};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// User agents rotated by default, mirroring common desktop browsers
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/116.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_5_2) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.6 Safari/605.1.15",
];

/// Characters of an error page kept in [`Error::HttpStatus`]
pub(crate) const ERROR_BODY_LIMIT: usize = 200;

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout
    pub timeout: Duration,
    /// Rate limiter configuration
    pub rate_limit: Option<RateLimiterConfig>,
    /// Default headers for all requests
    pub default_headers: HashMap<String, String>,
    /// User agents; one is picked at random per request when several are set
    pub user_agents: Vec<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            rate_limit: None,
            default_headers: HashMap::new(),
            user_agents: vec![format!("solidafy-scrape/{}", env!("CARGO_PKG_VERSION"))],
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set rate limiter
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Disable rate limiting
    pub fn no_rate_limit(mut self) -> Self {
        self.config.rate_limit = None;
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Use a single fixed user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agents = vec![agent.into()];
        self
    }

    /// Rotate randomly among several user agents
    pub fn user_agents<I, S>(mut self, agents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let agents: Vec<String> = agents.into_iter().map(Into::into).collect();
        if !agents.is_empty() {
            self.config.user_agents = agents;
        }
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// Configuration for a single request
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    /// Query parameters
    pub query: Vec<(String, String)>,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// URL-encoded form body
    pub form: Vec<(String, String)>,
    /// Override timeout for this request
    pub timeout: Option<Duration>,
}

impl RequestConfig {
    /// Create a new request config
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Add a form field
    #[must_use]
    pub fn form_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push((key.into(), value.into()));
        self
    }

    /// Set timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// HTTP client with user-agent rotation and rate limiting
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    rate_limiter: Option<RateLimiter>,
}

impl HttpClient {
    /// Create a new HTTP client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);

        Ok(Self {
            client,
            config,
            rate_limiter,
        })
    }

    /// Make a request and return the body as text
    pub async fn request_text(
        &self,
        method: Method,
        url: &str,
        config: RequestConfig,
    ) -> Result<String> {
        let response = self.request(method, url, config).await?;
        Ok(response.text().await?)
    }

    /// Make a single request, classifying failures
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        config: RequestConfig,
    ) -> Result<Response> {
        let timeout = config.timeout.unwrap_or(self.config.timeout);

        // Wait for rate limiter
        if let Some(ref limiter) = self.rate_limiter {
            limiter.wait().await;
        }

        let mut req = self.client.request(method.clone(), url);

        if let Some(agent) = self.pick_user_agent() {
            req = req.header(USER_AGENT, agent);
        }

        for (key, value) in &self.config.default_headers {
            req = req.header(key.as_str(), value.as_str());
        }

        for (key, value) in &config.headers {
            req = req.header(key.as_str(), value.as_str());
        }

        if !config.query.is_empty() {
            req = req.query(&config.query);
        }

        if !config.form.is_empty() {
            req = req.form(&config.form);
        }

        req = req.timeout(timeout);

        let response = match req.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return Err(Error::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            Err(e) => return Err(Error::Http(e)),
        };

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited {
                retry_after_seconds: extract_retry_after(&response),
            });
        }

        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                body: shorten(&body),
            });
        }

        debug!("Request succeeded: {} {}", method, url);
        Ok(response)
    }

    /// Pick the user agent for the next request
    fn pick_user_agent(&self) -> Option<&str> {
        match self.config.user_agents.as_slice() {
            [] => None,
            [only] => Some(only),
            agents => agents.choose(&mut rand::thread_rng()).map(String::as_str),
        }
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

/// Cut an error page down to [`ERROR_BODY_LIMIT`] characters
fn shorten(body: &str) -> String {
    match body.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((end, _)) => format!("{}...", &body[..end]),
        None => body.to_string(),
    }
}

/// Extract retry-after header value
fn extract_retry_after(response: &Response) -> u64 {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
        .unwrap_or(60)
}
