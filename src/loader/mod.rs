//! YAML Loader module
//!
//! Parse scrape job definitions from YAML files.
//!
//! # Overview
//!
//! The loader module provides:
//! - `JobDefinition` - Declarative scrape job specification
//! - `ExtractDefinition` / `FieldDefinition` - Row selector and output fields
//! - YAML parsing with validation

mod parser;
mod types;

pub use parser::{load_job, load_job_from_str};
pub use types::{
    ExtractDefinition, FieldDefinition, FieldSourceKind, HttpDefinition, JobDefinition,
    OutputDefinition, PaginationDefinition, RequestDefinition, RetryDefinition, SeedsDefinition,
    StartDefinition, StrategyDefinition,
};
