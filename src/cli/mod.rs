//! CLI module
//!
//! Command-line interface for running scrape jobs.
//!
//! # Commands
//!
//! - `run` - Scrape a job into JSONL/CSV/JSON files
//! - `validate` - Check a job definition
//! - `list` - List built-in jobs
//! - `show` - Print the resolved job definition
//! - `repair` - Clean an existing CSV file

mod commands;
mod runner;

pub use commands::{Cli, Commands};
pub use runner::{build_engine, RunOptions, RunSummary, Runner};
