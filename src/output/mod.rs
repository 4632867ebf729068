//! Output module
//!
//! Persists records in two stages.
//!
//! # Overview
//!
//! - Incremental sinks ([`RecordSink`]) append each record durably while the
//!   run is in progress: JSON Lines, CSV append, tee and in-memory.
//! - Batch finalizers ([`CsvExporter`], [`JsonExporter`]) write one complete
//!   artifact from the full record set once pagination has terminated.
//!
//! Finalizer output is written to a temporary file in the target directory
//! and renamed into place, so an export is either complete or absent.

mod export;
mod sink;

pub use export::{CsvExporter, ExportOutcome, Finalizer, JsonExporter};
pub use sink::{read_jsonl, CsvAppendSink, JsonlSink, MemorySink, RecordSink, TeeSink};

use crate::error::{Error, Result};
use std::fs::File;
use std::path::Path;
use tempfile::NamedTempFile;

/// UTF-8 byte-order mark, written ahead of CSV exports for spreadsheet apps
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Write a file through a sibling temp file and an atomic rename
///
/// The closure receives the temp file; nothing appears at `path` unless it
/// returns `Ok` and the rename succeeds.
pub(crate) fn write_atomically<F>(path: &Path, f: F) -> Result<()>
where
    F: FnOnce(&mut File) -> Result<()>,
{
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    f(tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|e| Error::sink(path.display().to_string(), e.error.to_string()))?;
    Ok(())
}
