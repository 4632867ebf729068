//! Batch finalizers
//!
//! Run once after pagination terminates, over every record the run sank.

use super::{write_atomically, UTF8_BOM};
use crate::error::Result;
use crate::record::Record;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Result of a finalize call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// The artifact was written
    Written {
        /// Artifact path
        path: PathBuf,
        /// Data rows written
        rows: usize,
    },
    /// There were no records; nothing was written
    Empty,
}

impl ExportOutcome {
    /// Rows exported (zero for [`ExportOutcome::Empty`])
    pub fn rows(&self) -> usize {
        match self {
            Self::Written { rows, .. } => *rows,
            Self::Empty => 0,
        }
    }

    /// Written path, if any
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Written { path, .. } => Some(path),
            Self::Empty => None,
        }
    }
}

/// Writes one complete artifact from a run's records
pub trait Finalizer {
    /// Export `records`; an empty slice is reported, never an error
    fn finalize(&self, records: &[Record]) -> Result<ExportOutcome>;
}

fn nothing_to_export(path: &Path) -> ExportOutcome {
    warn!(path = %path.display(), "Nothing to export, no records collected");
    ExportOutcome::Empty
}

// ============================================================================
// CSV
// ============================================================================

/// Tabular export with a header taken from the first record
#[derive(Debug, Clone)]
pub struct CsvExporter {
    path: PathBuf,
    bom: bool,
}

impl CsvExporter {
    /// Export to `path` with a UTF-8 BOM
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            bom: true,
        }
    }

    /// Enable or disable the BOM
    #[must_use]
    pub fn with_bom(mut self, bom: bool) -> Self {
        self.bom = bom;
        self
    }

    /// Target path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Finalizer for CsvExporter {
    fn finalize(&self, records: &[Record]) -> Result<ExportOutcome> {
        let Some(first) = records.first() else {
            return Ok(nothing_to_export(&self.path));
        };
        let fields = first.fields();
        for record in records {
            record.check_fields(fields)?;
        }

        write_atomically(&self.path, |file| {
            if self.bom {
                file.write_all(UTF8_BOM)?;
            }
            let mut writer = csv::Writer::from_writer(file);
            writer.write_record(fields.names())?;
            for record in records {
                writer.write_record(record.values().iter().map(|v| v.as_deref().unwrap_or("")))?;
            }
            writer.flush()?;
            Ok(())
        })?;

        info!(path = %self.path.display(), rows = records.len(), "Exported CSV");
        Ok(ExportOutcome::Written {
            path: self.path.clone(),
            rows: records.len(),
        })
    }
}

// ============================================================================
// JSON
// ============================================================================

/// JSON array of record objects
#[derive(Debug, Clone)]
pub struct JsonExporter {
    path: PathBuf,
    pretty: bool,
}

impl JsonExporter {
    /// Export a pretty-printed array to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pretty: true,
        }
    }

    /// Toggle pretty printing
    #[must_use]
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Target path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Finalizer for JsonExporter {
    fn finalize(&self, records: &[Record]) -> Result<ExportOutcome> {
        if records.is_empty() {
            return Ok(nothing_to_export(&self.path));
        }

        write_atomically(&self.path, |file| {
            if self.pretty {
                serde_json::to_writer_pretty(&mut *file, records)?;
            } else {
                serde_json::to_writer(&mut *file, records)?;
            }
            file.write_all(b"\n")?;
            Ok(())
        })?;

        info!(path = %self.path.display(), rows = records.len(), "Exported JSON");
        Ok(ExportOutcome::Written {
            path: self.path.clone(),
            rows: records.len(),
        })
    }
}
