//! Duplicate suppression keyed on one record field

use crate::error::{Error, Result};
use crate::record::Record;
use std::collections::HashSet;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, warn};

/// Set of key values already emitted in this or an earlier run
#[derive(Debug, Clone)]
pub struct SeenKeys {
    field: String,
    keys: HashSet<String>,
}

impl SeenKeys {
    /// Track keys of `field`
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            keys: HashSet::new(),
        }
    }

    /// Key field name
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Number of distinct keys seen
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether no keys have been seen
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Register the record's key; `false` means it is a duplicate
    ///
    /// Records without a value for the key field are always accepted.
    pub fn insert(&mut self, record: &Record) -> bool {
        match record.get(&self.field) {
            Some(key) => self.keys.insert(key.to_string()),
            None => true,
        }
    }

    /// Preload keys from an existing JSON Lines file
    ///
    /// A missing file loads nothing. Malformed lines are skipped. Returns
    /// the number of keys added.
    pub fn load_from_jsonl(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(0);
        }

        let file = std::fs::File::open(path)
            .map_err(|e| Error::state(format!("Failed to open '{}': {e}", path.display())))?;
        let before = self.keys.len();

        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<serde_json::Value>(&line) {
                Ok(value) => {
                    if let Some(key) = value.get(&self.field).and_then(|v| v.as_str()) {
                        self.keys.insert(key.to_string());
                    }
                }
                Err(e) => warn!(line = idx + 1, path = %path.display(), "Skipping malformed line: {e}"),
            }
        }

        let added = self.keys.len() - before;
        debug!(added, field = %self.field, "Preloaded dedup keys");
        Ok(added)
    }
}
