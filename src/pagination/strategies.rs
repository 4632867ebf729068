//! Pagination strategy implementations
//!
//! Each strategy handles one way a listing signals its next page.

use super::types::{PageReference, Paginator};
use crate::error::{Error, Result};
use scraper::{Html, Selector};
use url::Url;

/// Parse a CSS selector, mapping failures into the crate error
pub(crate) fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::selector(css, e.to_string()))
}

// ============================================================================
// Next Link Pagination
// ============================================================================

/// Follows a "next page" link found in the document
///
/// Common patterns:
/// - `<li class="next"><a href="/page/2/">Next</a></li>`
/// - `<a rel="next" href="page-2.html">`
///
/// Relative hrefs are resolved against the current page URL.
#[derive(Debug, Clone)]
pub struct NextLinkPaginator {
    selector: Selector,
    css: String,
    attribute: String,
}

impl NextLinkPaginator {
    /// Create a paginator that reads `href` from the first element matching `css`
    pub fn new(css: impl Into<String>) -> Result<Self> {
        let css = css.into();
        Ok(Self {
            selector: parse_selector(&css)?,
            css,
            attribute: "href".to_string(),
        })
    }

    /// Read the link from a different attribute
    #[must_use]
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = attribute.into();
        self
    }

    /// The selector this paginator follows
    pub fn css(&self) -> &str {
        &self.css
    }
}

impl Paginator for NextLinkPaginator {
    fn next_reference(&self, current: &PageReference, document: &Html) -> Option<PageReference> {
        let href = document
            .select(&self.selector)
            .next()?
            .value()
            .attr(&self.attribute)?
            .trim();

        if href.is_empty() {
            return None;
        }

        let resolved = match current.as_url().map(Url::parse) {
            Some(Ok(base)) => base.join(href).ok()?,
            _ => Url::parse(href).ok()?,
        };
        Some(PageReference::AbsoluteUrl(resolved.into()))
    }
}

// ============================================================================
// Offset Pagination
// ============================================================================

/// Always advances the offset by a fixed step
///
/// This strategy never signals exhaustion on its own; runs using it rely on
/// empty-batch termination or the page cap.
#[derive(Debug, Clone, Copy)]
pub struct OffsetPaginator {
    /// Records per page
    pub step: u64,
}

impl OffsetPaginator {
    /// Create a new offset paginator
    pub fn new(step: u64) -> Self {
        Self { step }
    }
}

impl Paginator for OffsetPaginator {
    fn next_reference(&self, current: &PageReference, _document: &Html) -> Option<PageReference> {
        let offset = current.as_offset()?;
        Some(PageReference::Offset(offset.checked_add(self.step)?))
    }
}

// ============================================================================
// No Pagination
// ============================================================================

/// No pagination - single page
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPaginator;

impl Paginator for NoPaginator {
    fn next_reference(&self, _current: &PageReference, _document: &Html) -> Option<PageReference> {
        None
    }
}
