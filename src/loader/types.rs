//! Loader types
//!
//! Declarative scrape job definition types for YAML parsing.

use crate::types::{BackoffType, Method};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Job Definition
// ============================================================================

/// Top-level scrape job definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct JobDefinition {
    /// Job name, also used for default output file names
    pub name: String,
    /// Human-readable description
    #[serde(default)]
    pub description: Option<String>,
    /// First page of the run (or root page for seed discovery)
    pub start: StartDefinition,
    /// Listing endpoint for offset pagination
    #[serde(default)]
    pub request: Option<RequestDefinition>,
    /// HTTP client configuration
    #[serde(default)]
    pub http: HttpDefinition,
    /// Retry configuration
    #[serde(default)]
    pub retry: RetryDefinition,
    /// Pagination configuration
    #[serde(default)]
    pub pagination: PaginationDefinition,
    /// Category-tree seed discovery
    #[serde(default)]
    pub seeds: Option<SeedsDefinition>,
    /// Record extraction
    pub extract: ExtractDefinition,
    /// Output configuration
    #[serde(default)]
    pub output: OutputDefinition,
}

/// Where the run starts: a URL or an offset
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StartDefinition {
    /// Absolute URL of the first page
    #[serde(default)]
    pub url: Option<String>,
    /// Initial offset against the listing endpoint
    #[serde(default)]
    pub offset: Option<u64>,
}

// ============================================================================
// Request Definition
// ============================================================================

/// Fixed listing endpoint for offset pagination
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RequestDefinition {
    /// Endpoint URL
    pub url: String,
    /// HTTP method
    #[serde(default)]
    pub method: Method,
    /// Name of the offset parameter
    #[serde(default = "default_offset_param")]
    pub offset_param: String,
    /// Fixed parameters sent with every request
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

fn default_offset_param() -> String {
    "offset".to_string()
}

// ============================================================================
// HTTP Definition
// ============================================================================

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HttpDefinition {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// User agents; one is fixed, several rotate randomly per request
    #[serde(default)]
    pub user_agents: Vec<String>,
    /// Extra headers sent with every request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Rate limit (requests per second)
    #[serde(default)]
    pub requests_per_second: Option<u32>,
}

impl Default for HttpDefinition {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            user_agents: Vec::new(),
            headers: BTreeMap::new(),
            requests_per_second: None,
        }
    }
}

fn default_timeout() -> u64 {
    30
}

// ============================================================================
// Retry Definition
// ============================================================================

/// Fetch retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryDefinition {
    /// Maximum retries per page
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    /// Backoff growth
    #[serde(default)]
    pub backoff: BackoffType,
    /// First backoff in milliseconds
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    /// Backoff ceiling in milliseconds
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryDefinition {
    fn default() -> Self {
        Self {
            max_retries: default_retries(),
            backoff: BackoffType::default(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_retries() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    500
}

fn default_max_backoff() -> u64 {
    30_000
}

// ============================================================================
// Pagination Definition
// ============================================================================

/// Pagination configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PaginationDefinition {
    /// How the next page is found
    #[serde(default)]
    pub strategy: StrategyDefinition,
    /// Pause between pages in milliseconds
    #[serde(default = "default_delay")]
    pub delay_ms: u64,
    /// Upper bound of a random extra pause in milliseconds
    #[serde(default)]
    pub jitter_ms: u64,
    /// Page cap per chain
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// Lift the page cap
    #[serde(default)]
    pub unbounded: bool,
    /// Stop at the first page without records
    #[serde(default = "default_true")]
    pub stop_on_empty_batch: bool,
}

impl Default for PaginationDefinition {
    fn default() -> Self {
        Self {
            strategy: StrategyDefinition::default(),
            delay_ms: default_delay(),
            jitter_ms: 0,
            max_pages: default_max_pages(),
            unbounded: false,
            stop_on_empty_batch: true,
        }
    }
}

/// Next-page strategy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyDefinition {
    /// Single page
    #[default]
    None,
    /// Follow a link in the page
    NextLink {
        /// CSS selector of the link element
        selector: String,
        /// Attribute holding the target
        #[serde(default = "default_href")]
        attribute: String,
    },
    /// Advance an offset by a fixed step
    Offset {
        /// Records per page
        step: u64,
    },
}

fn default_delay() -> u64 {
    crate::pagination::DEFAULT_INTER_PAGE_DELAY.as_millis() as u64
}

fn default_max_pages() -> u32 {
    crate::pagination::DEFAULT_MAX_PAGES
}

fn default_href() -> String {
    "href".to_string()
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Seeds Definition
// ============================================================================

/// Category-tree seed discovery on the start page
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SeedsDefinition {
    /// CSS selector of the category links
    pub selector: String,
}

// ============================================================================
// Extract Definition
// ============================================================================

/// Record extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExtractDefinition {
    /// CSS selector matching one element per record
    pub rows: String,
    /// Repair mojibake in extracted values
    #[serde(default)]
    pub repair_encoding: bool,
    /// Fields, in output order
    pub fields: Vec<FieldDefinition>,
}

/// One output field
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FieldDefinition {
    /// Field name
    pub name: String,
    /// CSS selector relative to the row
    #[serde(default)]
    pub selector: Option<String>,
    /// Attribute to read instead of the text
    #[serde(default)]
    pub attribute: Option<String>,
    /// Table cell index
    #[serde(default)]
    pub cell: Option<usize>,
    /// Value not read from the row
    #[serde(default)]
    pub source: Option<FieldSourceKind>,
    /// Value for `source: constant`
    #[serde(default)]
    pub value: Option<String>,
    /// Keep rows where the value is missing
    #[serde(default)]
    pub optional: bool,
    /// Resolve the value as a URL against the page URL
    #[serde(default)]
    pub resolve_url: bool,
}

/// Non-row field sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSourceKind {
    /// URL of the page the row was found on
    PageUrl,
    /// Label of the seed being paginated
    Seed,
    /// Fixed `value`
    Constant,
}

// ============================================================================
// Output Definition
// ============================================================================

/// Output configuration; paths are relative to the output directory
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OutputDefinition {
    /// Incremental JSON Lines file
    #[serde(default)]
    pub jsonl: Option<String>,
    /// Incremental CSV file, one row appended per record
    #[serde(default)]
    pub csv_append: Option<String>,
    /// Final CSV export
    #[serde(default)]
    pub csv: Option<String>,
    /// Final JSON array export
    #[serde(default)]
    pub json: Option<String>,
    /// Field used to suppress duplicate records
    #[serde(default)]
    pub dedup_key: Option<String>,
    /// Write a UTF-8 BOM ahead of the CSV export
    #[serde(default = "default_true")]
    pub bom: bool,
}

impl Default for OutputDefinition {
    fn default() -> Self {
        Self {
            jsonl: None,
            csv_append: None,
            csv: None,
            json: None,
            dedup_key: None,
            bom: true,
        }
    }
}
