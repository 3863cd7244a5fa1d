//! Event validation
//!
//! Turns the field mapping of a created document into a [`Hue`], or says why
//! it cannot be aggregated. Pure: no store access, no logging.

use huebucket_core::{extract_hue, Document, Hue, ValidationError, HUE_FIELD};

/// Extracts the hue field from created documents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventValidator {
    hue_field: String,
}

impl Default for EventValidator {
    fn default() -> Self {
        Self::new(HUE_FIELD)
    }
}

impl EventValidator {
    /// Validator reading `hue_field`
    pub fn new(hue_field: impl Into<String>) -> Self {
        Self {
            hue_field: hue_field.into(),
        }
    }

    /// Field this validator reads
    pub fn hue_field(&self) -> &str {
        &self.hue_field
    }

    /// Extract a finite numeric hue
    ///
    /// # Errors
    /// `MissingField`, `NotNumeric` or `NonFinite`.
    pub fn validate(&self, data: &Document) -> Result<Hue, ValidationError> {
        extract_hue(data, &self.hue_field)
    }
}
