//! Document-created trigger events
//!
//! The trigger delivers one event per document created under
//! `/results/{userId}/userResults/{docId}`. As JSON:
//!
//! ```json
//! {
//!   "document": "/results/alice/userResults/r1",
//!   "data": { "threshold_hue": 12.5 },
//!   "id": "evt-0001"
//! }
//! ```
//!
//! `data` and `id` are optional; a missing `data` is an empty document.

use huebucket_core::{Document, ResultPath, ValidationError};
use serde::Deserialize;

/// A created result document as delivered by the trigger
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentCreatedEvent {
    /// Where the document was created
    pub path: ResultPath,
    /// Field mapping of the created document
    pub data: Document,
    /// Delivery id assigned by the trigger, if any
    pub event_id: Option<String>,
}

#[derive(Deserialize)]
struct RawEvent {
    document: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    id: Option<String>,
}

impl DocumentCreatedEvent {
    /// Create an event from already-parsed parts
    pub fn new(path: ResultPath, data: Document) -> Self {
        Self {
            path,
            data,
            event_id: None,
        }
    }

    /// Attach the trigger's delivery id
    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    /// Decode an event from a JSON value
    ///
    /// # Errors
    /// - `MalformedEvent` if the envelope or `data` has the wrong shape
    /// - `UnexpectedPath` if `document` is not a user result path
    pub fn from_json(json: serde_json::Value) -> Result<Self, ValidationError> {
        let raw: RawEvent = serde_json::from_value(json)
            .map_err(|e| ValidationError::MalformedEvent(e.to_string()))?;
        Self::from_raw(raw)
    }

    /// Decode an event from raw payload bytes
    ///
    /// # Errors
    /// As [`from_json`](Self::from_json), plus `MalformedEvent` for invalid JSON.
    pub fn from_slice(payload: &[u8]) -> Result<Self, ValidationError> {
        let raw: RawEvent = serde_json::from_slice(payload)
            .map_err(|e| ValidationError::MalformedEvent(e.to_string()))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawEvent) -> Result<Self, ValidationError> {
        let path = ResultPath::parse(&raw.document)?;
        let data = match raw.data {
            Some(json) => Document::from_json(json)?,
            None => Document::new(),
        };
        Ok(Self {
            path,
            data,
            event_id: raw.id,
        })
    }
}
