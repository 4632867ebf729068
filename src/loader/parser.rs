//! YAML parser for scrape job definitions
//!
//! Parses and validates job YAML files.
//! Supports both built-in jobs (by name) and custom YAML files (by path).

use crate::error::{Error, Result};
use crate::jobs;
use crate::loader::types::{FieldDefinition, FieldSourceKind, JobDefinition, StrategyDefinition};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Load a job definition from a name or file path
///
/// This function first checks if the input is a built-in job name (e.g., "quotes"),
/// then falls back to loading from a file path.
///
/// # Examples
///
/// ```ignore
/// // Load built-in job by name
/// let job = load_job("quotes")?;
///
/// // Load custom job from file
/// let job = load_job("./my-job.yaml")?;
/// ```
pub fn load_job(path: impl AsRef<Path>) -> Result<JobDefinition> {
    let path = path.as_ref();
    let path_str = path.to_string_lossy();

    // Built-in names have no path separators and no YAML extension
    if !path_str.contains('/')
        && !path_str.contains('\\')
        && !path_str.ends_with(".yaml")
        && !path_str.ends_with(".yml")
    {
        if let Some(yaml) = jobs::get_builtin(&path_str) {
            return load_job_from_str(yaml);
        }
    }

    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            let builtin_list = jobs::list_builtin().join(", ");
            Error::config(format!(
                "Job '{}' not found. Built-in jobs: {}. Or provide a path to a YAML file.",
                path.display(),
                builtin_list
            ))
        } else {
            Error::config(format!(
                "Failed to read job file '{}': {}",
                path.display(),
                e
            ))
        }
    })?;
    load_job_from_str(&content)
}

/// Load a job definition from a YAML string
pub fn load_job_from_str(yaml: &str) -> Result<JobDefinition> {
    let def: JobDefinition = serde_yaml::from_str(yaml)?;
    validate_job(&def)?;
    Ok(def)
}

/// Validate a job definition
fn validate_job(def: &JobDefinition) -> Result<()> {
    if def.name.trim().is_empty() {
        return Err(Error::config("Job name cannot be empty"));
    }

    match (&def.start.url, def.start.offset) {
        (Some(_), Some(_)) => {
            return Err(Error::invalid_value(
                "start",
                "set either url or offset, not both",
            ))
        }
        (None, None) => return Err(Error::invalid_value("start", "url or offset is required")),
        (Some(url), None) => {
            url::Url::parse(url)?;
        }
        (None, Some(_)) => {
            if def.request.is_none() {
                return Err(Error::invalid_value(
                    "request",
                    "offset start requires a listing endpoint",
                ));
            }
        }
    }

    if let Some(request) = &def.request {
        url::Url::parse(&request.url)?;
        if request.offset_param.is_empty() {
            return Err(Error::invalid_value("request.offset_param", "cannot be empty"));
        }
    }

    match &def.pagination.strategy {
        StrategyDefinition::NextLink { selector, .. } if selector.trim().is_empty() => {
            return Err(Error::invalid_value(
                "pagination.strategy.selector",
                "cannot be empty",
            ));
        }
        StrategyDefinition::Offset { step } => {
            if *step == 0 {
                return Err(Error::invalid_value(
                    "pagination.strategy.step",
                    "must be greater than 0",
                ));
            }
            if def.request.is_none() {
                return Err(Error::invalid_value(
                    "request",
                    "offset pagination requires a listing endpoint",
                ));
            }
        }
        _ => {}
    }

    if def.pagination.max_pages == 0 {
        return Err(Error::invalid_value(
            "pagination.max_pages",
            "must be greater than 0 (use unbounded: true to lift the cap)",
        ));
    }

    if let Some(seeds) = &def.seeds {
        if seeds.selector.trim().is_empty() {
            return Err(Error::invalid_value("seeds.selector", "cannot be empty"));
        }
        if def.start.url.is_none() {
            return Err(Error::invalid_value("seeds", "seed discovery requires a start url"));
        }
    }

    validate_extract(def)
}

/// Validate the extract section
fn validate_extract(def: &JobDefinition) -> Result<()> {
    let extract = &def.extract;
    if extract.rows.trim().is_empty() {
        return Err(Error::invalid_value("extract.rows", "cannot be empty"));
    }
    if extract.fields.is_empty() {
        return Err(Error::invalid_value(
            "extract.fields",
            "at least one field is required",
        ));
    }

    let names: HashSet<_> = extract.fields.iter().map(|f| f.name.as_str()).collect();
    if names.len() != extract.fields.len() {
        return Err(Error::invalid_value("extract.fields", "duplicate field names found"));
    }

    for field in &extract.fields {
        validate_field(field)?;
        if field.source == Some(FieldSourceKind::Seed) && def.seeds.is_none() {
            return Err(Error::invalid_value(
                format!("extract.fields.{}", field.name),
                "source: seed requires a seeds section",
            ));
        }
    }

    if let Some(key) = &def.output.dedup_key {
        if !names.contains(key.as_str()) {
            return Err(Error::invalid_value(
                "output.dedup_key",
                format!("'{key}' is not an extracted field"),
            ));
        }
    }

    Ok(())
}

/// Validate a field definition
fn validate_field(field: &FieldDefinition) -> Result<()> {
    let location = format!("extract.fields.{}", field.name);
    if field.name.trim().is_empty() {
        return Err(Error::invalid_value("extract.fields", "field name cannot be empty"));
    }

    let sources = [
        field.selector.is_some(),
        field.cell.is_some(),
        field.source.is_some(),
    ]
    .into_iter()
    .filter(|set| *set)
    .count();
    if sources != 1 {
        return Err(Error::invalid_value(
            location,
            "exactly one of selector, cell or source is required",
        ));
    }

    if field.attribute.is_some() && field.selector.is_none() {
        return Err(Error::invalid_value(location, "attribute requires a selector"));
    }
    if field.source == Some(FieldSourceKind::Constant) && field.value.is_none() {
        return Err(Error::invalid_value(location, "source: constant requires a value"));
    }

    Ok(())
}
