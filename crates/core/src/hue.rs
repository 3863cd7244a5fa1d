//! Hue values and bucket keys
//!
//! A [`Hue`] is the validated numeric aggregation key of a result document.
//! Its [`BucketKey`] is the id of the counter document in the buckets collection.
//!
//! ## Canonical form
//!
//! Numerically equal hues share a bucket regardless of how they were typed:
//!
//! | Hue                                   | Key                            |
//! |---------------------------------------|--------------------------------|
//! | `Int(i)`                              | decimal `i`                    |
//! | `Float(0.0)` / `Float(-0.0)`          | `"0"`                          |
//! | integral `Float(f)` within `i64`      | decimal `f as i64` (`"5"`)     |
//! | any other finite `Float(f)`           | shortest round-trip `f` (`"12.5"`) |
//!
//! Floats are exact binary values and `Display` prints the shortest string
//! that round-trips, so distinct numbers never produce the same key.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::document::Document;
use crate::error::ValidationError;
use crate::value::Value;

/// Default name of the hue field in result documents
pub const HUE_FIELD: &str = "threshold_hue";

// 2^63 as f64; integral floats strictly below this fit in i64
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// Validated numeric hue
///
/// Floats are always finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Hue {
    /// Integer hue
    Int(i64),
    /// Finite floating-point hue
    Float(f64),
}

impl Hue {
    /// Build a hue from a document field value
    ///
    /// `field` names the source field in the returned error.
    ///
    /// # Errors
    /// - `NotNumeric` for any value other than `Int` or `Float`
    /// - `NonFinite` for NaN or infinite floats
    pub fn from_value(field: &str, value: &Value) -> Result<Self, ValidationError> {
        match value {
            Value::Int(i) => Ok(Hue::Int(*i)),
            Value::Float(f) if f.is_finite() => Ok(Hue::Float(*f)),
            Value::Float(_) => Err(ValidationError::NonFinite {
                field: field.to_string(),
            }),
            other => Err(ValidationError::NotNumeric {
                field: field.to_string(),
                type_name: other.type_name(),
                rendered: format!("{:?}", other),
            }),
        }
    }

    /// Numeric value as f64
    pub fn as_f64(&self) -> f64 {
        match self {
            Hue::Int(i) => *i as f64,
            Hue::Float(f) => *f,
        }
    }

    /// Derive the bucket key for this hue
    pub fn bucket_key(&self) -> BucketKey {
        let key = match *self {
            Hue::Int(i) => i.to_string(),
            Hue::Float(f) if f == 0.0 => "0".to_string(),
            Hue::Float(f) if f.fract() == 0.0 && f.abs() < I64_BOUND => (f as i64).to_string(),
            Hue::Float(f) => f.to_string(),
        };
        BucketKey(key)
    }
}

impl fmt::Display for Hue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hue::Int(i) => write!(f, "{}", i),
            Hue::Float(x) => write!(f, "{}", x),
        }
    }
}

/// Extract and validate the hue field of a created document
///
/// # Errors
/// `MissingField` when absent, otherwise as [`Hue::from_value`].
pub fn extract_hue(document: &Document, field: &str) -> Result<Hue, ValidationError> {
    let value = document
        .get(field)
        .ok_or_else(|| ValidationError::MissingField {
            field: field.to_string(),
        })?;
    Hue::from_value(field, value)
}

/// Canonical id of a bucket counter document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BucketKey(String);

impl BucketKey {
    /// Wrap an id read back from the store
    pub fn from_stored(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the key string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value of the key, if it parses
    ///
    /// Keys written by this system always parse.
    pub fn hue_value(&self) -> Option<f64> {
        self.0.parse::<f64>().ok().filter(|v| v.is_finite())
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BucketKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
