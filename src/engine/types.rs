//! Engine types
//!
//! Run results, statistics and the cancellation flag for the scrape engine.

use crate::pagination::PageReference;
use crate::record::Record;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Why a pagination chain stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The last page carried no next reference
    Exhausted,
    /// A page yielded zero records
    EmptyBatch,
    /// The page cap was reached
    PageLimit,
    /// Cancellation was requested
    Cancelled,
}

impl StopReason {
    /// Whether the source itself signalled the end of the chain
    pub fn is_exhausted(self) -> bool {
        matches!(self, Self::Exhausted | Self::EmptyBatch)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::Exhausted => "no next page",
            Self::EmptyBatch => "empty page",
            Self::PageLimit => "page limit reached",
            Self::Cancelled => "cancelled",
        };
        f.write_str(reason)
    }
}

/// Statistics from a scrape run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Pages fetched, including an empty terminating page
    pub pages_fetched: u32,
    /// Records durably appended to the sink
    pub records_written: usize,
    /// Rows the extractor dropped
    pub skipped: usize,
    /// Records suppressed as duplicates
    pub duplicates: usize,
    /// Fetch attempts that were retried
    pub retries: u32,
    /// Seeds whose chain finished
    pub seeds_completed: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl RunStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a page
    pub fn add_page(&mut self) {
        self.pages_fetched += 1;
    }

    /// Add a written record
    pub fn add_record(&mut self) {
        self.records_written += 1;
    }

    /// Add skipped rows
    pub fn add_skipped(&mut self, count: usize) {
        self.skipped += count;
    }

    /// Add a duplicate
    pub fn add_duplicate(&mut self) {
        self.duplicates += 1;
    }

    /// Add a retry
    pub fn add_retry(&mut self) {
        self.retries += 1;
    }

    /// Add a completed seed
    pub fn add_seed(&mut self) {
        self.seeds_completed += 1;
    }

    /// Set duration
    pub fn set_duration(&mut self, ms: u64) {
        self.duration_ms = ms;
    }

    /// Fold another run's counters into this one
    pub fn merge(&mut self, other: &RunStats) {
        self.pages_fetched += other.pages_fetched;
        self.records_written += other.records_written;
        self.skipped += other.skipped;
        self.duplicates += other.duplicates;
        self.retries += other.retries;
        self.seeds_completed += other.seeds_completed;
    }
}

/// Outcome of a scrape run
///
/// `records` holds exactly the records that reached the sink, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeRun {
    /// Next page that would have been fetched (`None` once exhausted)
    pub cursor: Option<PageReference>,
    /// Records durably sunk during the run
    pub records: Vec<Record>,
    /// Counters
    pub stats: RunStats,
    /// Why the last chain stopped
    pub stop_reason: StopReason,
}

impl ScrapeRun {
    pub(crate) fn new(cursor: Option<PageReference>) -> Self {
        Self {
            cursor,
            records: Vec::new(),
            stats: RunStats::new(),
            stop_reason: StopReason::Exhausted,
        }
    }

    /// Whether the run stopped on a cancellation request
    pub fn cancelled(&self) -> bool {
        self.stop_reason == StopReason::Cancelled
    }

    /// Total records sunk
    pub fn total_records(&self) -> usize {
        self.stats.records_written
    }

    /// Total pages fetched
    pub fn total_pages(&self) -> u32 {
        self.stats.pages_fetched
    }

    /// Append another chain's results, taking its cursor and stop reason
    pub(crate) fn absorb(&mut self, other: ScrapeRun) {
        self.records.extend(other.records);
        self.stats.merge(&other.stats);
        self.cursor = other.cursor;
        self.stop_reason = other.stop_reason;
    }
}

/// Cooperative cancellation signal checked before every fetch
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create an unset flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Set the flag on Ctrl-C
    ///
    /// Must be called from within a tokio runtime.
    pub fn install_ctrl_c_handler(&self) {
        let flag = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, stopping after the current page");
                flag.cancel();
            }
        });
    }
}
