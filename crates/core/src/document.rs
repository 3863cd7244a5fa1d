//! Document types
//!
//! A [`Document`] is an ordered mapping of field names to [`Value`]s: the
//! snapshot a trigger delivers, and the unit the store reads and writes.
//! [`VersionedDocument`] pairs a document with the commit version that wrote it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ValidationError;
use crate::value::Value;

/// Field name of the counter inside a bucket document
pub const COUNT_FIELD: &str = "count";

/// Ordered field map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    fields: BTreeMap<String, Value>,
}

impl Document {
    /// Create an empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a document from `(field, value)` pairs
    pub fn from_fields<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Convert a JSON object into a document
    ///
    /// # Errors
    /// Returns `ValidationError::MalformedEvent` if `json` is not an object.
    pub fn from_json(json: serde_json::Value) -> Result<Self, ValidationError> {
        match json {
            serde_json::Value::Object(map) => Ok(Self {
                fields: map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            }),
            other => Err(ValidationError::MalformedEvent(format!(
                "document data must be an object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Render as a JSON object
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.clone().into()))
                .collect(),
        )
    }

    /// Look up a field
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Set a field, returning the previous value
    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(field.into(), value)
    }

    /// Check whether a field is present
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the document has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate fields in name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }
}

fn json_type_name(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// A document together with the commit version that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedDocument {
    /// Document contents
    pub document: Document,
    /// Commit version (always > 0 for stored documents)
    pub version: u64,
}

impl VersionedDocument {
    /// Create a versioned document
    pub fn new(document: Document, version: u64) -> Self {
        Self { document, version }
    }
}
