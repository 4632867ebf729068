//! Record extraction
//!
//! Turns fetched page content into [`Record`](crate::record::Record)s plus
//! the reference of the next page.
//!
//! - [`RecordExtractor`] is the capability the pagination driver consumes
//! - [`HtmlExtractor`] implements it with CSS selectors and [`FieldRule`]s
//! - [`FnExtractor`] wraps a closure for one-off page formats

mod html;
mod types;

pub use html::{parse_seed_links, HtmlExtractor};
pub use types::{
    Extraction, FieldRule, FieldSource, FnExtractor, PageContext, RecordExtractor,
};
