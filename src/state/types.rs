//! Checkpoint types for tracking scrape progress
//!
//! Serialized to JSON and persisted after every page so an interrupted run
//! can resume where it stopped.

use crate::pagination::PageReference;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Progress of one job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Job name the checkpoint belongs to
    pub job: String,

    /// Next page to fetch (`None` once the chain is exhausted)
    #[serde(default)]
    pub cursor: Option<PageReference>,

    /// Seed the cursor belongs to, for category-tree runs
    #[serde(default)]
    pub current_seed: Option<String>,

    /// Pages fetched so far
    #[serde(default)]
    pub pages_fetched: u32,

    /// Records sunk so far
    #[serde(default)]
    pub records_written: u64,

    /// Seeds whose pagination chain finished
    #[serde(default)]
    pub completed_seeds: BTreeSet<String>,

    /// Whether the whole run finished
    #[serde(default)]
    pub completed: bool,

    /// Last update time
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Create an empty checkpoint for `job`
    pub fn new(job: impl Into<String>) -> Self {
        Self {
            job: job.into(),
            cursor: None,
            current_seed: None,
            pages_fetched: 0,
            records_written: 0,
            completed_seeds: BTreeSet::new(),
            completed: false,
            updated_at: Utc::now(),
        }
    }

    /// Check if a seed is completed
    pub fn is_seed_completed(&self, label: &str) -> bool {
        self.completed_seeds.contains(label)
    }

    /// Cursor to resume from for `seed` (`None` for single-chain runs)
    ///
    /// Only returns the saved cursor when it belongs to that seed and the
    /// run did not finish.
    pub fn resume_cursor(&self, seed: Option<&str>) -> Option<&PageReference> {
        if self.completed || self.current_seed.as_deref() != seed {
            return None;
        }
        self.cursor.as_ref()
    }

    /// Record a fetched page
    pub fn record_page(
        &mut self,
        seed: Option<&str>,
        next: Option<&PageReference>,
        records: u64,
    ) {
        self.current_seed = seed.map(str::to_string);
        self.cursor = next.cloned();
        self.pages_fetched += 1;
        self.records_written += records;
        self.touch();
    }

    /// Mark a seed as completed
    pub fn complete_seed(&mut self, label: &str) {
        self.completed_seeds.insert(label.to_string());
        self.cursor = None;
        self.current_seed = None;
        self.touch();
    }

    /// Mark the whole run as completed
    pub fn complete(&mut self) {
        self.completed = true;
        self.cursor = None;
        self.current_seed = None;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
