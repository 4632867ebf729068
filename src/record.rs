//! Scraped records
//!
//! A [`Record`] is an ordered mapping from field name to an optional string
//! value. Every record produced in one run shares the same [`FieldSet`], so
//! the tabular exporters can derive a single header row from the first one.

use crate::error::{Error, Result};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use std::sync::Arc;

/// Ordered, immutable list of field names shared by all records of a run
#[derive(Clone, PartialEq, Eq)]
pub struct FieldSet(Arc<[String]>);

impl FieldSet {
    /// Create a field set from names, preserving order
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    /// Field names in declaration order
    pub fn names(&self) -> &[String] {
        &self.0
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set has no fields
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Position of a field
    pub fn position(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|f| f == name)
    }

    /// Check whether a field exists
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Same names in the same order (pointer-equal sets short-circuit)
    pub fn matches(&self, other: &FieldSet) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl fmt::Debug for FieldSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

impl fmt::Display for FieldSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(","))
    }
}

/// One scraped record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    fields: FieldSet,
    values: Vec<Option<String>>,
}

impl Record {
    /// Create a record with every field null
    pub fn new(fields: &FieldSet) -> Self {
        Self {
            fields: fields.clone(),
            values: vec![None; fields.len()],
        }
    }

    /// Build a record from `(name, value)` pairs, in order
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Option<String>>,
    {
        let (names, values): (Vec<String>, Vec<Option<String>>) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        Self {
            fields: FieldSet::new(names),
            values,
        }
    }

    /// Set a field value
    pub fn set(&mut self, name: &str, value: Option<String>) -> Result<()> {
        let idx = self
            .fields
            .position(name)
            .ok_or_else(|| Error::UnknownField {
                field: name.to_string(),
            })?;
        self.values[idx] = value;
        Ok(())
    }

    /// Get a field value (`None` for null or unknown fields)
    pub fn get(&self, name: &str) -> Option<&str> {
        let idx = self.fields.position(name)?;
        self.values[idx].as_deref()
    }

    /// The record's field set
    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    /// Values in field order
    pub fn values(&self) -> &[Option<String>] {
        &self.values
    }

    /// Iterate `(name, value)` pairs in field order
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.fields
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(Option::as_deref))
    }

    /// Apply a transform to every non-null value
    #[must_use]
    pub fn map_values<F>(mut self, mut f: F) -> Self
    where
        F: FnMut(String) -> String,
    {
        for value in &mut self.values {
            if let Some(v) = value.take() {
                *value = Some(f(v));
            }
        }
        self
    }

    /// Ensure this record carries the expected field set
    pub fn check_fields(&self, expected: &FieldSet) -> Result<()> {
        if self.fields.matches(expected) {
            Ok(())
        } else {
            Err(Error::FieldMismatch {
                expected: expected.to_string(),
                found: self.fields.to_string(),
            })
        }
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}
