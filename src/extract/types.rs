//! Extractor types and traits
//!
//! Defines the extraction capability consumed by the pagination driver.

use crate::error::Result;
use crate::pagination::PageReference;
use crate::record::{FieldSet, Record};

/// Records and next-page cursor extracted from one page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Records in document order
    pub records: Vec<Record>,
    /// Next page, `None` when the page signals no more pages
    pub next: Option<PageReference>,
    /// Rows dropped because a required field was missing
    pub skipped: usize,
}

impl Extraction {
    /// Create an extraction
    pub fn new(records: Vec<Record>, next: Option<PageReference>) -> Self {
        Self {
            records,
            next,
            skipped: 0,
        }
    }

    /// Set the skipped row count
    #[must_use]
    pub fn with_skipped(mut self, skipped: usize) -> Self {
        self.skipped = skipped;
        self
    }
}

/// Where the current page came from
#[derive(Debug, Clone, Copy)]
pub struct PageContext<'a> {
    /// Reference that was fetched
    pub reference: &'a PageReference,
    /// URL the content was served from
    pub page_url: &'a str,
    /// Label of the seed (category) being paginated, if any
    pub seed: Option<&'a str>,
}

/// Turns raw page content into records and the next page reference
///
/// Implementations skip individual malformed rows (counting them in
/// [`Extraction::skipped`]) and reserve `Err` for failures that make the
/// whole page unusable.
pub trait RecordExtractor: Send + Sync {
    /// Field set every produced record carries
    fn fields(&self) -> &FieldSet;

    /// Extract one page
    fn extract(&self, content: &str, context: &PageContext<'_>) -> Result<Extraction>;
}

/// Where a field's value comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSource {
    /// Text or attribute of the first element matching a CSS selector
    /// inside the row
    Css {
        /// CSS selector relative to the row
        selector: String,
        /// Attribute to read instead of the element text
        attribute: Option<String>,
    },
    /// Text of the n-th `td` cell of the row
    Cell(usize),
    /// URL of the page the row was found on
    PageUrl,
    /// Label of the seed being paginated
    Seed,
    /// Fixed value
    Constant(String),
}

/// How to fill one field of a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRule {
    /// Field name
    pub name: String,
    /// Value source
    pub source: FieldSource,
    /// Drop the row when the value is missing
    pub required: bool,
    /// Resolve the value as a URL relative to the page URL
    pub resolve_url: bool,
}

impl FieldRule {
    /// Field read from a CSS selector's text
    pub fn css(name: impl Into<String>, selector: impl Into<String>) -> Self {
        Self::new(
            name,
            FieldSource::Css {
                selector: selector.into(),
                attribute: None,
            },
        )
    }

    /// Field read from a CSS selector's attribute
    pub fn attr(
        name: impl Into<String>,
        selector: impl Into<String>,
        attribute: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            FieldSource::Css {
                selector: selector.into(),
                attribute: Some(attribute.into()),
            },
        )
    }

    /// Field read from a table cell
    pub fn cell(name: impl Into<String>, index: usize) -> Self {
        Self::new(name, FieldSource::Cell(index))
    }

    /// Field filled with the page URL
    pub fn page_url(name: impl Into<String>) -> Self {
        Self::new(name, FieldSource::PageUrl)
    }

    /// Field filled with the seed label
    pub fn seed(name: impl Into<String>) -> Self {
        Self::new(name, FieldSource::Seed)
    }

    /// Field filled with a constant
    pub fn constant(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, FieldSource::Constant(value.into()))
    }

    /// Create a rule; row-derived sources are required by default
    pub fn new(name: impl Into<String>, source: FieldSource) -> Self {
        let required = matches!(source, FieldSource::Css { .. } | FieldSource::Cell(_));
        Self {
            name: name.into(),
            source,
            required,
            resolve_url: false,
        }
    }

    /// Keep the row with a null value when this field is missing
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Resolve the value against the page URL
    #[must_use]
    pub fn resolve_url(mut self) -> Self {
        self.resolve_url = true;
        self
    }
}

/// Extractor backed by a closure
///
/// Useful when a page needs bespoke parsing, and as a seam for tests.
pub struct FnExtractor<F> {
    fields: FieldSet,
    f: F,
}

impl<F> FnExtractor<F>
where
    F: Fn(&str, &PageContext<'_>) -> Result<Extraction> + Send + Sync,
{
    /// Wrap a closure producing records with `fields`
    pub fn new(fields: FieldSet, f: F) -> Self {
        Self { fields, f }
    }
}

impl<F> RecordExtractor for FnExtractor<F>
where
    F: Fn(&str, &PageContext<'_>) -> Result<Extraction> + Send + Sync,
{
    fn fields(&self) -> &FieldSet {
        &self.fields
    }

    fn extract(&self, content: &str, context: &PageContext<'_>) -> Result<Extraction> {
        (self.f)(content, context)
    }
}
