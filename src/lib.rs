// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # Solidafy Scrape
//!
//! Paginated HTML scraping with incremental persistence.
//!
//! A job fetches a listing page, extracts records from it, appends each
//! record durably to the output files, works out the next page, and repeats
//! until the listing runs out. Once pagination stops, the collected records
//! are exported to CSV and/or JSON in one atomic write.
//!
//! ## Features
//!
//! - **Declarative jobs**: Row and field selectors, pagination and outputs in YAML
//! - **Pagination**: Next-link following, offset stepping (GET or POST), category trees
//! - **Incremental sinks**: JSON Lines and CSV rows flushed per record
//! - **Resume**: Checkpoint after every page, duplicate suppression across runs
//! - **Politeness**: Inter-page delay with jitter, user-agent rotation, rate limiting
//! - **Cleaning**: Mojibake repair and whitespace normalisation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use solidafy_scrape::extract::{FieldRule, HtmlExtractor};
//! use solidafy_scrape::http::{HttpClient, HttpFetcher};
//! use solidafy_scrape::output::JsonlSink;
//! use solidafy_scrape::pagination::{NextLinkPaginator, PageReference};
//! use solidafy_scrape::engine::ScrapeEngine;
//!
//! #[tokio::main]
//! async fn main() -> solidafy_scrape::Result<()> {
//!     let extractor = HtmlExtractor::new(
//!         "div.quote",
//!         vec![FieldRule::css("text", "span.text"), FieldRule::css("author", "small.author")],
//!         Box::new(NextLinkPaginator::new("li.next a")?),
//!     )?;
//!     let fetcher = HttpFetcher::new(HttpClient::new()?);
//!     let mut engine = ScrapeEngine::new(Box::new(fetcher), Box::new(extractor));
//!
//!     let mut sink = JsonlSink::create("quotes.jsonl")?;
//!     let run = engine
//!         .run(PageReference::url("https://quotes.toscrape.com/"), &mut sink)
//!         .await?;
//!     println!("{} records from {} pages", run.total_records(), run.total_pages());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       ScrapeEngine                              │
//! │  fetch(ref) → extract(page) → sink.append(record) → next ref    │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌──────────┬───────────┬───────┴───────┬───────────┬─────────────┐
//! │   HTTP   │  Extract  │   Paginate    │   State   │   Output    │
//! ├──────────┼───────────┼───────────────┼───────────┼─────────────┤
//! │ GET/POST │ Rows      │ Next link     │ Checkpoint│ JSONL       │
//! │ Retry    │ CSS/cells │ Offset        │ Dedup keys│ CSV append  │
//! │ Rate     │ Seeds     │ Category tree │           │ CSV / JSON  │
//! │ UA rotate│ Repair    │               │           │ export      │
//! └──────────┴───────────┴───────────────┴───────────┴─────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(missing_docs)] // TODO: Add docs before 1.0 release

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Records and field sets
pub mod record;

/// Page references and pagination strategies
pub mod pagination;

/// HTTP client with retry and rate limiting
pub mod http;

/// Record extraction from fetched pages
pub mod extract;

/// Incremental sinks and batch exporters
pub mod output;

/// Pagination driver
pub mod engine;

/// Checkpoints and duplicate suppression
pub mod state;

/// Encoding repair and CSV cleaning
pub mod clean;

/// YAML loader for job definitions
pub mod loader;

/// Built-in job definitions
pub mod jobs;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use engine::{ScrapeEngine, ScrapeRun, StopReason};
pub use loader::{load_job, load_job_from_str, JobDefinition};
pub use record::{FieldSet, Record};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
