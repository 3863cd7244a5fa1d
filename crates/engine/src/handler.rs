//! Document-created trigger handler
//!
//! Entry point for the trigger plumbing. Every outcome, including failures,
//! is returned as a [`HandlerOutcome`] value and logged; nothing is raised
//! back to the trigger, so a failed invocation is never redelivered.

use std::sync::Arc;

use huebucket_core::{Hue, HueError, HueResult, ValidationError};
use tracing::{error, info, info_span, warn};
use uuid::Uuid;

use crate::aggregator::{AggregationOutcome, BucketAggregator, BucketUpdate};
use crate::database::{Database, HueBucketConfig};
use crate::event::DocumentCreatedEvent;
use crate::validator::EventValidator;

/// What happened to one created-document event
#[derive(Debug)]
pub enum HandlerOutcome {
    /// The hue's bucket was incremented
    Counted(BucketUpdate),
    /// The document had already been counted
    Duplicate,
    /// The event was dropped without touching the store
    Rejected(ValidationError),
    /// The store transaction failed for good
    Failed {
        /// Hue that could not be counted
        hue: Hue,
        /// Final error, typically `RetryExhausted` or `Corruption`
        error: HueError,
    },
}

impl HandlerOutcome {
    /// True for `Counted`
    pub fn is_counted(&self) -> bool {
        matches!(self, HandlerOutcome::Counted(_))
    }

    /// The bucket update, if the event was counted
    pub fn update(&self) -> Option<&BucketUpdate> {
        match self {
            HandlerOutcome::Counted(update) => Some(update),
            _ => None,
        }
    }
}

/// Reacts to result-document creation by counting its hue
#[derive(Debug, Clone)]
pub struct HueBucketHandler {
    validator: EventValidator,
    aggregator: BucketAggregator,
}

impl HueBucketHandler {
    /// Build a handler over a shared database
    ///
    /// # Errors
    /// `InvalidInput` if the configuration does not validate.
    pub fn new(db: Arc<Database>, config: &HueBucketConfig) -> HueResult<Self> {
        Ok(Self {
            validator: EventValidator::new(config.hue_field.as_str()),
            aggregator: BucketAggregator::new(db, config)?,
        })
    }

    /// The validator in use
    pub fn validator(&self) -> &EventValidator {
        &self.validator
    }

    /// The aggregator in use
    pub fn aggregator(&self) -> &BucketAggregator {
        &self.aggregator
    }

    /// Handle one decoded event
    pub fn handle(&self, event: &DocumentCreatedEvent) -> HandlerOutcome {
        let invocation_id = Uuid::new_v4();
        let span = info_span!(
            target: "huebucket::handler",
            "document_created",
            user_id = %event.path.user_id,
            doc_id = %event.path.doc_id,
            invocation_id = %invocation_id,
            event_id = event.event_id.as_deref().unwrap_or("-"),
        );
        let _enter = span.enter();

        let hue = match self.validator.validate(&event.data) {
            Ok(hue) => hue,
            Err(e) => {
                error!(target: "huebucket::handler", error = %e, "Rejected created document");
                return HandlerOutcome::Rejected(e);
            }
        };

        match self.aggregator.aggregate(hue, Some(&event.path)) {
            Ok(AggregationOutcome::Applied(update)) => {
                info!(
                    target: "huebucket::handler",
                    bucket = %update.key,
                    count = update.count,
                    created = update.created,
                    "Bucket incremented"
                );
                HandlerOutcome::Counted(update)
            }
            Ok(AggregationOutcome::AlreadyCounted) => {
                warn!(target: "huebucket::handler", %hue, "Document already counted, skipping");
                HandlerOutcome::Duplicate
            }
            Err(e) => {
                error!(target: "huebucket::handler", %hue, error = %e, "Bucket aggregation failed");
                HandlerOutcome::Failed { hue, error: e }
            }
        }
    }

    /// Decode and handle a raw JSON payload
    ///
    /// Undecodable payloads become `Rejected`.
    pub fn handle_payload(&self, payload: &[u8]) -> HandlerOutcome {
        match DocumentCreatedEvent::from_slice(payload) {
            Ok(event) => self.handle(&event),
            Err(e) => {
                error!(
                    target: "huebucket::handler",
                    error = %e,
                    payload_len = payload.len(),
                    "Dropped undecodable event"
                );
                HandlerOutcome::Rejected(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::RetryConfig;
    use huebucket_core::{Document, ResultPath, Value, HUE_FIELD};

    fn handler() -> (Arc<Database>, HueBucketHandler) {
        let db = Database::ephemeral();
        let config = HueBucketConfig {
            retry: RetryConfig::new().with_base_delay_ms(0).with_max_delay_ms(1),
            ..Default::default()
        };
        let handler = HueBucketHandler::new(Arc::clone(&db), &config).unwrap();
        (db, handler)
    }

    fn event(doc_id: &str, hue: Value) -> DocumentCreatedEvent {
        DocumentCreatedEvent::new(
            ResultPath::new("alice", doc_id),
            Document::from_fields([(HUE_FIELD, hue)]),
        )
    }

    #[test]
    fn test_counts_valid_event() {
        let (_db, handler) = handler();
        let outcome = handler.handle(&event("r1", Value::Int(5)));
        assert!(outcome.is_counted());
        assert_eq!(outcome.update().map(|u| u.count), Some(1));
    }

    #[test]
    fn test_rejects_without_store_access() {
        let (db, handler) = handler();
        let outcome = handler.handle(&event("r1", Value::from("red")));
        assert!(matches!(
            outcome,
            HandlerOutcome::Rejected(ValidationError::NotNumeric { .. })
        ));
        assert_eq!(db.current_version(), 0);
        assert_eq!(db.metrics().total_started, 0);
    }

    #[test]
    fn test_duplicate_delivery() {
        let (_db, handler) = handler();
        let first = event("r1", Value::Int(5)).with_event_id("evt-1");
        assert!(handler.handle(&first).is_counted());
        assert!(matches!(handler.handle(&first), HandlerOutcome::Duplicate));
    }

    #[test]
    fn test_payload_decoding() {
        let (_db, handler) = handler();
        let outcome = handler.handle_payload(
            br#"{"document": "/results/bob/userResults/x", "data": {"threshold_hue": 7}}"#,
        );
        assert_eq!(outcome.update().map(|u| u.key.as_str()), Some("7"));

        assert!(matches!(
            handler.handle_payload(b"{"),
            HandlerOutcome::Rejected(ValidationError::MalformedEvent(_))
        ));
    }
}
