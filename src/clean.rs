//! Text cleaning utilities
//!
//! - [`fix_mojibake`] undoes text that was UTF-8 encoded and then decoded as
//!   a single-byte codec (Latin-1 / Windows-1252), e.g. `â€œ` → `“`.
//! - [`collapse_whitespace`] trims and folds whitespace runs to one space.
//! - [`repair_csv`] applies both to every cell of an existing CSV export.
//!
//! None of these ever fail on text: an unrepairable value comes back as is.

use crate::error::{Error, Result};
use crate::output::{write_atomically, UTF8_BOM};
use encoding_rs::WINDOWS_1252;
use std::borrow::Cow;
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Repair text that was decoded with the wrong single-byte codec
///
/// Re-encodes `s` as Windows-1252 bytes and decodes them as UTF-8.
/// Returns `s` unchanged when a character has no single-byte form or the
/// bytes are not valid UTF-8, which also makes the transform idempotent on
/// correctly decoded text.
pub fn fix_mojibake(s: &str) -> Cow<'_, str> {
    if s.is_ascii() {
        return Cow::Borrowed(s);
    }

    let (bytes, _, unmappable) = WINDOWS_1252.encode(s);
    if unmappable {
        return Cow::Borrowed(s);
    }

    match String::from_utf8(bytes.into_owned()) {
        Ok(fixed) => Cow::Owned(fixed),
        Err(_) => Cow::Borrowed(s),
    }
}

/// Trim and collapse internal whitespace runs to a single space
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Options for [`repair_csv`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepairOptions {
    /// Apply [`fix_mojibake`] to every cell
    pub fix_encoding: bool,
    /// Trim leading and trailing whitespace of every cell
    pub trim: bool,
    /// Drop rows identical to an earlier row
    pub dedup: bool,
    /// Prefix the output with a UTF-8 byte-order mark
    pub bom: bool,
}

impl Default for RepairOptions {
    fn default() -> Self {
        Self {
            fix_encoding: true,
            trim: true,
            dedup: true,
            bom: true,
        }
    }
}

/// Summary of a CSV repair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// Data rows read
    pub rows_read: usize,
    /// Data rows written
    pub rows_written: usize,
    /// Cells whose value changed
    pub cells_changed: usize,
    /// Duplicate rows dropped
    pub duplicates_dropped: usize,
}

fn repair_cell(cell: &str, options: RepairOptions) -> String {
    let mut value = if options.fix_encoding {
        fix_mojibake(cell).into_owned()
    } else {
        cell.to_string()
    };
    if options.trim {
        value = value.trim().to_string();
    }
    value
}

/// Clean an existing CSV file into a new one
///
/// The header row gets the same cell treatment as data rows. A leading BOM
/// in the input is ignored. The output is written atomically.
pub fn repair_csv(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    options: RepairOptions,
) -> Result<RepairReport> {
    let input = input.as_ref();
    let raw = std::fs::read(input).map_err(|e| {
        Error::export(format!("Failed to read '{}': {e}", input.display()))
    })?;
    let content = raw.strip_prefix(UTF8_BOM).unwrap_or(&raw);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| repair_cell(h, options))
        .collect();

    let mut report = RepairReport::default();
    let mut seen: HashSet<Vec<String>> = HashSet::new();
    let mut rows: Vec<Vec<String>> = Vec::new();

    for row in reader.records() {
        let row = row?;
        report.rows_read += 1;

        let cleaned: Vec<String> = row.iter().map(|cell| repair_cell(cell, options)).collect();
        report.cells_changed += row
            .iter()
            .zip(&cleaned)
            .filter(|(before, after)| *before != after.as_str())
            .count();

        if options.dedup && !seen.insert(cleaned.clone()) {
            report.duplicates_dropped += 1;
            continue;
        }
        rows.push(cleaned);
    }

    write_atomically(output.as_ref(), |file| {
        if options.bom {
            file.write_all(UTF8_BOM)?;
        }
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(&headers)?;
        for row in &rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    })?;

    report.rows_written = rows.len();
    info!(
        rows_read = report.rows_read,
        rows_written = report.rows_written,
        cells_changed = report.cells_changed,
        duplicates = report.duplicates_dropped,
        "Repaired {}",
        input.display()
    );
    Ok(report)
}
