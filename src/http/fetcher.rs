//! Page fetch capability
//!
//! [`PageFetcher`] is the narrow interface the pagination driver uses to turn
//! a [`PageReference`] into raw page content. [`HttpFetcher`] is the network
//! implementation: URL references become GET requests, offset references
//! are sent to a fixed listing endpoint.

use super::client::{HttpClient, RequestConfig};
use crate::error::{Error, Result};
use crate::pagination::PageReference;
use crate::types::Method;
use async_trait::async_trait;

/// Raw content of one fetched page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// URL that served the content, after any redirects
    pub url: String,
    /// Response body
    pub body: String,
}

impl Page {
    /// Create a page
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: body.into(),
        }
    }
}

/// Fetches the content behind a page reference
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Perform one fetch attempt
    async fn fetch(&self, reference: &PageReference) -> Result<Page>;
}

/// Fixed endpoint that serves offset-paginated listings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEndpoint {
    /// Endpoint URL
    pub url: String,
    /// GET sends the offset as a query parameter, POST as a form field
    pub method: Method,
    /// Name of the offset parameter
    pub offset_param: String,
    /// Additional fixed parameters sent with every request
    pub params: Vec<(String, String)>,
}

impl ListingEndpoint {
    /// Create a POST endpoint with an `offset` form field
    pub fn post(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::POST,
            offset_param: "offset".to_string(),
            params: Vec::new(),
        }
    }

    /// Create a GET endpoint with an `offset` query parameter
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            ..Self::post(url)
        }
    }

    /// Rename the offset parameter
    #[must_use]
    pub fn with_offset_param(mut self, name: impl Into<String>) -> Self {
        self.offset_param = name.into();
        self
    }

    /// Add a fixed parameter
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    fn request_config(&self, offset: u64) -> RequestConfig {
        let mut pairs = Vec::with_capacity(self.params.len() + 1);
        pairs.push((self.offset_param.clone(), offset.to_string()));
        pairs.extend(self.params.iter().cloned());

        match self.method {
            Method::GET => RequestConfig {
                query: pairs,
                ..RequestConfig::default()
            },
            Method::POST => RequestConfig {
                form: pairs,
                ..RequestConfig::default()
            },
        }
    }
}

/// Fetches pages over HTTP
#[derive(Debug)]
pub struct HttpFetcher {
    client: HttpClient,
    listing: Option<ListingEndpoint>,
}

impl HttpFetcher {
    /// Create a fetcher for URL references only
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            listing: None,
        }
    }

    /// Create a fetcher that also resolves offset references against `listing`
    pub fn with_listing(client: HttpClient, listing: ListingEndpoint) -> Self {
        Self {
            client,
            listing: Some(listing),
        }
    }

    /// Underlying HTTP client
    pub fn client(&self) -> &HttpClient {
        &self.client
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, reference: &PageReference) -> Result<Page> {
        match reference {
            PageReference::AbsoluteUrl(url) => {
                let response = self
                    .client
                    .request(reqwest::Method::GET, url, RequestConfig::default())
                    .await?;
                // after redirects this differs from the requested URL
                let served = response.url().to_string();
                Ok(Page::new(served, response.text().await?))
            }
            PageReference::Offset(offset) => {
                let listing = self.listing.as_ref().ok_or_else(|| {
                    Error::config("Offset pagination requires a listing endpoint")
                })?;
                let body = self
                    .client
                    .request_text(
                        listing.method.into(),
                        &listing.url,
                        listing.request_config(*offset),
                    )
                    .await?;
                Ok(Page::new(listing.url.clone(), body))
            }
        }
    }
}
