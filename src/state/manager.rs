//! Checkpoint store implementation
//!
//! Provides file-based checkpoint persistence with atomic writes.

use super::types::Checkpoint;
use crate::error::{Error, Result};
use crate::pagination::PageReference;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Loads and saves the checkpoint of one job
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    /// Path to the checkpoint file (empty in memory mode)
    path: PathBuf,
    /// Current checkpoint
    checkpoint: Checkpoint,
    /// Whether to save on every update
    auto_save: bool,
}

impl CheckpointStore {
    /// Create a store starting from an empty checkpoint
    pub fn new(path: impl AsRef<Path>, job: impl Into<String>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            checkpoint: Checkpoint::new(job),
            auto_save: true,
        }
    }

    /// Create an in-memory store (no file persistence)
    pub fn in_memory(job: impl Into<String>) -> Self {
        Self {
            path: PathBuf::new(),
            checkpoint: Checkpoint::new(job),
            auto_save: false,
        }
    }

    /// Create a store, loading the existing checkpoint if present
    ///
    /// Fails when the file belongs to a different job.
    pub async fn open(path: impl AsRef<Path>, job: &str) -> Result<Self> {
        let mut store = Self::new(path, job);
        if store.load().await? && store.checkpoint.job != job {
            return Err(Error::state(format!(
                "Checkpoint '{}' belongs to job '{}', not '{job}'",
                store.path.display(),
                store.checkpoint.job
            )));
        }
        Ok(store)
    }

    /// Disable saving on every update
    #[must_use]
    pub fn without_auto_save(mut self) -> Self {
        self.auto_save = false;
        self
    }

    /// Load the checkpoint from file, returning whether one existed
    pub async fn load(&mut self) -> Result<bool> {
        if self.is_in_memory() || !self.path.exists() {
            return Ok(false);
        }

        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::state(format!("Failed to read checkpoint file: {e}")))?;

        self.checkpoint = serde_json::from_str(&contents)
            .map_err(|e| Error::state(format!("Failed to parse checkpoint file: {e}")))?;

        debug!(
            path = %self.path.display(),
            pages = self.checkpoint.pages_fetched,
            "Loaded checkpoint"
        );
        Ok(true)
    }

    /// Save the current checkpoint to file
    pub async fn save(&self) -> Result<()> {
        if self.is_in_memory() {
            return Ok(());
        }

        let contents = serde_json::to_string_pretty(&self.checkpoint)
            .map_err(|e| Error::state(format!("Failed to serialize checkpoint: {e}")))?;

        // Write to temp file first, then rename for atomicity
        let temp_path = self.path.with_extension("tmp");
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::state(format!("Failed to create checkpoint dir: {e}")))?;
        }
        tokio::fs::write(&temp_path, &contents)
            .await
            .map_err(|e| Error::state(format!("Failed to write checkpoint file: {e}")))?;

        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| Error::state(format!("Failed to rename checkpoint file: {e}")))?;

        Ok(())
    }

    async fn auto_save(&self) -> Result<()> {
        if self.auto_save {
            self.save().await?;
        }
        Ok(())
    }

    /// Current checkpoint
    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    /// Record a fetched page
    pub async fn record_page(
        &mut self,
        seed: Option<&str>,
        next: Option<&PageReference>,
        records: u64,
    ) -> Result<()> {
        self.checkpoint.record_page(seed, next, records);
        self.auto_save().await
    }

    /// Mark a seed as completed
    pub async fn complete_seed(&mut self, label: &str) -> Result<()> {
        self.checkpoint.complete_seed(label);
        self.auto_save().await
    }

    /// Mark the run as completed
    pub async fn complete(&mut self) -> Result<()> {
        self.checkpoint.complete();
        self.auto_save().await
    }

    /// Reset to an empty checkpoint for the same job
    pub async fn clear(&mut self) -> Result<()> {
        self.checkpoint = Checkpoint::new(self.checkpoint.job.clone());
        self.auto_save().await
    }

    /// Get the checkpoint file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if using in-memory mode
    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str().is_empty()
    }
}
