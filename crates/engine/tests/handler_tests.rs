//! Trigger handler integration tests
//!
//! Payload in, outcome out: the handler never returns an error and never
//! touches the store for events it rejects.

use huebucket_concurrency::FaultInjector;
use huebucket_core::{CollectionName, DocKey, Document, Hue, HueError, ValidationError, Value};
use huebucket_engine::{
    BucketDistribution, Database, HandlerOutcome, HueBucketConfig, HueBucketHandler, RetryConfig,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing::span;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

fn config() -> HueBucketConfig {
    HueBucketConfig {
        retry: RetryConfig::new()
            .with_max_retries(3)
            .with_base_delay_ms(0)
            .with_max_delay_ms(1),
        ..Default::default()
    }
}

fn payload(user: &str, doc: &str, data: serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "document": format!("/results/{}/userResults/{}", user, doc),
        "data": data,
    }))
    .unwrap()
}

#[test]
fn test_counts_payloads_end_to_end() {
    let db = Database::ephemeral();
    let handler = HueBucketHandler::new(Arc::clone(&db), &config()).unwrap();

    let outcomes: Vec<_> = [
        payload("alice", "r1", serde_json::json!({"threshold_hue": 5})),
        payload("bob", "r1", serde_json::json!({"threshold_hue": 5.0})),
        payload("carol", "r9", serde_json::json!({"threshold_hue": 212.75, "name": "x"})),
    ]
    .iter()
    .map(|p| handler.handle_payload(p))
    .collect();

    assert!(outcomes.iter().all(HandlerOutcome::is_counted));
    assert_eq!(outcomes[1].update().map(|u| u.count), Some(2));
    assert_eq!(outcomes[2].update().map(|u| u.key.as_str()), Some("212.75"));

    let dist = BucketDistribution::load(&db, handler.aggregator().buckets_collection()).unwrap();
    assert_eq!(dist.total(), 3);
    assert_eq!(dist.len(), 2);
}

#[test]
fn test_rejections_cause_no_writes() {
    let db = Database::ephemeral();
    let handler = HueBucketHandler::new(Arc::clone(&db), &config()).unwrap();

    let cases: Vec<(Vec<u8>, fn(&ValidationError) -> bool)> = vec![
        (
            payload("u", "d", serde_json::json!({"other": 1})),
            |e| matches!(e, ValidationError::MissingField { .. }),
        ),
        (
            payload("u", "d", serde_json::json!({"threshold_hue": "red"})),
            |e| matches!(e, ValidationError::NotNumeric { .. }),
        ),
        (
            payload("u", "d", serde_json::json!({"threshold_hue": null})),
            |e| matches!(e, ValidationError::NotNumeric { .. }),
        ),
        (
            br#"{"document": "/results/u/drafts/d", "data": {"threshold_hue": 1}}"#.to_vec(),
            |e| matches!(e, ValidationError::UnexpectedPath(_)),
        ),
        (
            b"\xff\xfe".to_vec(),
            |e| matches!(e, ValidationError::MalformedEvent(_)),
        ),
    ];

    for (bytes, expected) in cases {
        match handler.handle_payload(&bytes) {
            HandlerOutcome::Rejected(e) => assert!(expected(&e), "unexpected rejection {:?}", e),
            other => panic!("expected Rejected, got {:?}", other),
        }
    }

    assert_eq!(db.current_version(), 0);
    assert_eq!(db.storage().total_entries(), 0);
    assert_eq!(db.metrics().total_started, 0);
    assert_eq!(db.metrics().total_committed, 0);
}

#[test]
fn test_duplicate_delivery_reported() {
    let db = Database::ephemeral();
    let handler = HueBucketHandler::new(Arc::clone(&db), &config()).unwrap();
    let bytes = payload("alice", "r1", serde_json::json!({"threshold_hue": 40}));

    assert!(handler.handle_payload(&bytes).is_counted());
    assert!(matches!(
        handler.handle_payload(&bytes),
        HandlerOutcome::Duplicate
    ));
    assert_eq!(handler.aggregator().count_for(Hue::Int(40)).unwrap(), 1);
}

#[test]
fn test_exhausted_retries_reported_as_failed() {
    let db = Database::builder()
        .fault_injector(Arc::new(FaultInjector::new().fail_next_with_conflict(50)))
        .build()
        .unwrap();
    let handler = HueBucketHandler::new(Arc::clone(&db), &config()).unwrap();

    let outcome = handler.handle_payload(&payload("u", "d", serde_json::json!({"threshold_hue": 3})));

    match outcome {
        HandlerOutcome::Failed { hue, error } => {
            assert_eq!(hue, Hue::Int(3));
            assert!(matches!(error, HueError::RetryExhausted { attempts: 4, .. }));
        }
        other => panic!("expected Failed, got {:?}", other),
    }
    assert_eq!(db.storage().total_entries(), 0);
}

#[test]
fn test_corrupt_bucket_reported_as_failed() {
    let db = Database::ephemeral();
    let key = DocKey::new(CollectionName::new("bucket-counts").unwrap(), "3");
    db.put(key, Document::from_fields([("count", Value::Float(1.5))]))
        .unwrap();
    let handler = HueBucketHandler::new(Arc::clone(&db), &config()).unwrap();

    let outcome = handler.handle_payload(&payload("u", "d", serde_json::json!({"threshold_hue": 3})));
    assert!(matches!(
        outcome,
        HandlerOutcome::Failed {
            error: HueError::Corruption { .. },
            ..
        }
    ));
}

#[test]
fn test_custom_hue_field() {
    let db = Database::ephemeral();
    let config = HueBucketConfig {
        hue_field: "hue".to_string(),
        ..config()
    };
    let handler = HueBucketHandler::new(Arc::clone(&db), &config).unwrap();

    assert!(handler
        .handle_payload(&payload("u", "a", serde_json::json!({"hue": 8})))
        .is_counted());
    assert!(matches!(
        handler.handle_payload(&payload("u", "b", serde_json::json!({"threshold_hue": 8}))),
        HandlerOutcome::Rejected(ValidationError::MissingField { .. })
    ));
}

#[test]
fn test_invalid_config_rejected_at_construction() {
    let config = HueBucketConfig {
        processed_collection: "bucket-counts".to_string(),
        ..config()
    };
    assert!(HueBucketHandler::new(Database::ephemeral(), &config).is_err());
}

// ============================================================================
// Invocation span
// ============================================================================

type SpanFields = HashMap<String, String>;

/// Records the fields of every `document_created` span opened
#[derive(Clone, Default)]
struct SpanCapture {
    spans: Arc<Mutex<Vec<SpanFields>>>,
}

struct FieldRecorder<'a>(&'a mut SpanFields);

impl Visit for FieldRecorder<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name().to_string(), format!("{:?}", value));
    }
}

impl<S: tracing::Subscriber> Layer<S> for SpanCapture {
    fn on_new_span(&self, attrs: &span::Attributes<'_>, _id: &span::Id, _ctx: Context<'_, S>) {
        if attrs.metadata().name() != "document_created" {
            return;
        }
        let mut fields = SpanFields::new();
        attrs.record(&mut FieldRecorder(&mut fields));
        self.spans.lock().unwrap().push(fields);
    }
}

#[test]
fn test_invocation_span_carries_ids() {
    let db = Database::ephemeral();
    let handler = HueBucketHandler::new(Arc::clone(&db), &config()).unwrap();
    let capture = SpanCapture::default();
    let subscriber = tracing_subscriber::registry().with(capture.clone());

    let mut with_id: serde_json::Value =
        serde_json::from_slice(&payload("alice", "r1", serde_json::json!({"threshold_hue": 5})))
            .unwrap();
    with_id["id"] = serde_json::json!("evt-7");
    let with_id = serde_json::to_vec(&with_id).unwrap();

    tracing::subscriber::with_default(subscriber, || {
        assert!(handler.handle_payload(&with_id).is_counted());
        let outcome = handler.handle_payload(&payload("bob", "r2", serde_json::json!({})));
        assert!(matches!(outcome, HandlerOutcome::Rejected(_)));
    });

    let spans = capture.spans.lock().unwrap();
    assert_eq!(spans.len(), 2);

    assert_eq!(spans[0]["user_id"], "alice");
    assert_eq!(spans[0]["doc_id"], "r1");
    assert_eq!(spans[0]["event_id"], "evt-7");
    assert_eq!(spans[1]["user_id"], "bob");
    assert_eq!(spans[1]["doc_id"], "r2");
    assert_eq!(spans[1]["event_id"], "-");

    let ids: Vec<uuid::Uuid> = spans
        .iter()
        .map(|fields| uuid::Uuid::parse_str(&fields["invocation_id"]).unwrap())
        .collect();
    assert_ne!(ids[0], ids[1]);
}
