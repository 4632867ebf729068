//! Pagination types and traits
//!
//! Defines the page cursor, the run-scoped pagination policy and the
//! strategy trait used to derive the next page from a parsed document.

use rand::Rng;
use scraper::Html;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Identifies the next page to fetch
///
/// The "no more pages" sentinel is `Option::<PageReference>::None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PageReference {
    /// A fully qualified page URL
    AbsoluteUrl(String),
    /// A record offset against a fixed listing endpoint
    Offset(u64),
}

impl PageReference {
    /// Create a URL reference
    pub fn url(url: impl Into<String>) -> Self {
        Self::AbsoluteUrl(url.into())
    }

    /// Create an offset reference
    pub fn offset(offset: u64) -> Self {
        Self::Offset(offset)
    }

    /// URL, if this is a URL reference
    pub fn as_url(&self) -> Option<&str> {
        match self {
            Self::AbsoluteUrl(url) => Some(url),
            Self::Offset(_) => None,
        }
    }

    /// Offset, if this is an offset reference
    pub fn as_offset(&self) -> Option<u64> {
        match self {
            Self::Offset(offset) => Some(*offset),
            Self::AbsoluteUrl(_) => None,
        }
    }
}

impl fmt::Display for PageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AbsoluteUrl(url) => f.write_str(url),
            Self::Offset(offset) => write!(f, "offset {offset}"),
        }
    }
}

/// Entry point of one pagination chain in a category tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seed {
    /// Human-readable label, e.g. the category name
    pub label: String,
    /// First page of the chain
    pub reference: PageReference,
}

impl Seed {
    /// Create a seed
    pub fn new(label: impl Into<String>, reference: PageReference) -> Self {
        Self {
            label: label.into(),
            reference,
        }
    }
}

/// Default pause between page requests
pub const DEFAULT_INTER_PAGE_DELAY: Duration = Duration::from_millis(300);

/// Default safety cap on pages per run
pub const DEFAULT_MAX_PAGES: u32 = 1000;

/// Run-scoped pagination settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationPolicy {
    /// Pause before every fetch after the first
    pub inter_page_delay: Duration,
    /// Upper bound of a uniformly random extra pause added to the delay
    pub delay_jitter: Duration,
    /// Maximum pages fetched per run (`None` = unbounded)
    pub max_pages: Option<u32>,
    /// Stop as soon as a page yields zero records
    pub stop_on_empty_batch: bool,
}

impl Default for PaginationPolicy {
    fn default() -> Self {
        Self {
            inter_page_delay: DEFAULT_INTER_PAGE_DELAY,
            delay_jitter: Duration::ZERO,
            max_pages: Some(DEFAULT_MAX_PAGES),
            stop_on_empty_batch: true,
        }
    }
}

impl PaginationPolicy {
    /// Create a policy with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the inter-page delay
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.inter_page_delay = delay;
        self
    }

    /// Set the delay jitter
    #[must_use]
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.delay_jitter = jitter;
        self
    }

    /// Set the page cap
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    /// Remove the page cap
    #[must_use]
    pub fn unbounded(mut self) -> Self {
        self.max_pages = None;
        self
    }

    /// Enable or disable empty-batch termination
    #[must_use]
    pub fn with_stop_on_empty_batch(mut self, stop: bool) -> Self {
        self.stop_on_empty_batch = stop;
        self
    }

    /// Whether another page may be fetched after `pages_fetched` pages
    pub fn allows_page(&self, pages_fetched: u32) -> bool {
        self.max_pages.map_or(true, |max| pages_fetched < max)
    }

    /// Delay to apply before the next fetch, jitter included
    pub fn next_delay(&self) -> Duration {
        if self.delay_jitter.is_zero() {
            return self.inter_page_delay;
        }
        let extra_ms = rand::thread_rng().gen_range(0..=self.delay_jitter.as_millis() as u64);
        self.inter_page_delay + Duration::from_millis(extra_ms)
    }
}

/// Strategy that derives the next page reference from a parsed page
pub trait Paginator: Send + Sync {
    /// Next page after `current`, or `None` when the source is exhausted
    fn next_reference(&self, current: &PageReference, document: &Html) -> Option<PageReference>;
}
