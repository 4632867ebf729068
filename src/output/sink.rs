//! Incremental sinks
//!
//! Every [`RecordSink::append`] is its own durable write: the record is
//! serialized, written and flushed before the call returns.

use crate::error::{Error, Result};
use crate::record::{FieldSet, Record};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Append-only destination for records produced during a run
///
/// An error from `append` is fatal to the run.
pub trait RecordSink: Send {
    /// Durably append one record
    fn append(&mut self, record: &Record) -> Result<()>;
}

fn open_for_append(path: &Path, truncate: bool) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| sink_error(path, e))?;
    }
    let mut options = OpenOptions::new();
    options.create(true);
    if truncate {
        options.write(true).truncate(true);
    } else {
        options.read(true).append(true);
    }
    let mut file = options.open(path).map_err(|e| sink_error(path, e))?;
    if !truncate {
        end_torn_line(&mut file).map_err(|e| sink_error(path, e))?;
    }
    Ok(file)
}

/// Terminate a last line left unfinished by an interrupted write
///
/// The torn line stays behind as one malformed line instead of swallowing
/// the next record appended after it.
fn end_torn_line(file: &mut File) -> std::io::Result<()> {
    if file.metadata()?.len() == 0 {
        return Ok(());
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    if last[0] != b'\n' {
        warn!("Previous output ends mid-line; closing it before appending");
        file.write_all(b"\n")?;
        file.flush()?;
    }
    Ok(())
}

fn sink_error(path: &Path, e: impl std::fmt::Display) -> Error {
    Error::sink(path.display().to_string(), e.to_string())
}

/// Check that every record in the run shares the first record's field set
fn check_field_set(expected: &mut Option<FieldSet>, record: &Record) -> Result<()> {
    match expected {
        Some(fields) => record.check_fields(fields),
        None => {
            *expected = Some(record.fields().clone());
            Ok(())
        }
    }
}

// ============================================================================
// JSON Lines
// ============================================================================

/// One JSON object per line
#[derive(Debug)]
pub struct JsonlSink {
    path: PathBuf,
    file: File,
    fields: Option<FieldSet>,
    written: u64,
}

impl JsonlSink {
    /// Create (or truncate) the file at `path`
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open(path.into(), true)
    }

    /// Open `path` keeping existing lines, used when resuming a run
    pub fn append_to(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open(path.into(), false)
    }

    fn open(path: PathBuf, truncate: bool) -> Result<Self> {
        let file = open_for_append(&path, truncate)?;
        debug!(path = %path.display(), truncate, "Opened JSONL sink");
        Ok(Self {
            path,
            file,
            fields: None,
            written: 0,
        })
    }

    /// Path of the file being written
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records appended through this sink
    pub fn written(&self) -> u64 {
        self.written
    }
}

impl RecordSink for JsonlSink {
    fn append(&mut self, record: &Record) -> Result<()> {
        check_field_set(&mut self.fields, record)?;

        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        self.file
            .write_all(&line)
            .and_then(|()| self.file.flush())
            .map_err(|e| sink_error(&self.path, e))?;

        self.written += 1;
        Ok(())
    }
}

/// Read records back from a JSON Lines file written by [`JsonlSink`]
///
/// Values are taken in `fields` order; keys outside `fields` are ignored and
/// missing or non-string values become null. A missing file reads as empty.
pub fn read_jsonl(path: impl AsRef<Path>, fields: &FieldSet) -> Result<Vec<Record>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path).map_err(|e| sink_error(path, e))?;

    let mut records = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value: serde_json::Value = match serde_json::from_str(&line) {
            Ok(value) => value,
            Err(e) => {
                warn!(line = idx + 1, path = %path.display(), "Skipping malformed line: {e}");
                continue;
            }
        };
        let mut record = Record::new(fields);
        for name in fields.names() {
            let field = value.get(name).and_then(|v| v.as_str()).map(String::from);
            record.set(name, field)?;
        }
        records.push(record);
    }
    Ok(records)
}

// ============================================================================
// CSV append
// ============================================================================

/// CSV rows written as they are produced
///
/// The header is written on the first append only when the file is empty,
/// so appending to an earlier run's output does not repeat it.
#[derive(Debug)]
pub struct CsvAppendSink {
    path: PathBuf,
    writer: csv::Writer<BufWriter<File>>,
    fields: Option<FieldSet>,
    needs_header: bool,
}

impl CsvAppendSink {
    /// Create (or truncate) the file at `path`
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open(path.into(), true)
    }

    /// Open `path` keeping existing rows
    pub fn append_to(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open(path.into(), false)
    }

    fn open(path: PathBuf, truncate: bool) -> Result<Self> {
        let file = open_for_append(&path, truncate)?;
        let needs_header = file.metadata().map_err(|e| sink_error(&path, e))?.len() == 0;
        Ok(Self {
            writer: csv::Writer::from_writer(BufWriter::new(file)),
            path,
            fields: None,
            needs_header,
        })
    }

    /// Path of the file being written
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for CsvAppendSink {
    fn append(&mut self, record: &Record) -> Result<()> {
        check_field_set(&mut self.fields, record)?;

        if self.needs_header {
            self.writer
                .write_record(record.fields().names())
                .map_err(|e| sink_error(&self.path, e))?;
            self.needs_header = false;
        }
        self.writer
            .write_record(record.values().iter().map(|v| v.as_deref().unwrap_or("")))
            .and_then(|()| self.writer.flush().map_err(csv::Error::from))
            .map_err(|e| sink_error(&self.path, e))
    }
}

// ============================================================================
// Tee / memory
// ============================================================================

/// Fans each record out to several sinks, in order
///
/// Stops at the first failing sink.
#[derive(Default)]
pub struct TeeSink {
    sinks: Vec<Box<dyn RecordSink>>,
}

impl TeeSink {
    /// Create an empty tee
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink
    #[must_use]
    pub fn with(mut self, sink: impl RecordSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Add a boxed sink
    pub fn push(&mut self, sink: Box<dyn RecordSink>) {
        self.sinks.push(sink);
    }

    /// Number of sinks
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether the tee has no sinks
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl RecordSink for TeeSink {
    fn append(&mut self, record: &Record) -> Result<()> {
        for sink in &mut self.sinks {
            sink.append(record)?;
        }
        Ok(())
    }
}

/// Keeps appended records in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    /// Records in append order
    pub records: Vec<Record>,
}

impl MemorySink {
    /// Create an empty memory sink
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordSink for MemorySink {
    fn append(&mut self, record: &Record) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }
}
