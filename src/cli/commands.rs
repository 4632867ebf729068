//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Solidafy Scrape CLI
#[derive(Parser, Debug)]
#[command(name = "solidafy-scrape")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Job name (built-in) or path to a job definition (YAML)
    #[arg(short, long, global = true)]
    pub job: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a scrape job
    Run {
        /// Directory output paths are resolved against
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        /// Incremental JSON Lines file (overrides the job)
        #[arg(long)]
        jsonl: Option<PathBuf>,

        /// Final CSV export (overrides the job)
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Pause between pages in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Page cap per chain
        #[arg(long)]
        max_pages: Option<u32>,

        /// Continue from the job's checkpoint
        #[arg(long)]
        resume: bool,

        /// Write the CSV export without a UTF-8 BOM
        #[arg(long)]
        no_bom: bool,
    },

    /// Validate a job definition
    Validate,

    /// List built-in jobs
    List,

    /// Print the resolved job definition
    Show,

    /// Clean an existing CSV file (encoding repair, trimming, duplicate rows)
    Repair {
        /// CSV file to read
        input: PathBuf,

        /// Cleaned CSV file to write
        output: PathBuf,

        /// Keep duplicate rows
        #[arg(long)]
        no_dedup: bool,

        /// Write the output without a UTF-8 BOM
        #[arg(long)]
        no_bom: bool,
    },
}
