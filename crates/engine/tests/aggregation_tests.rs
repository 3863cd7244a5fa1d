//! Bucket aggregation integration tests
//!
//! Single-threaded behavior of the counting transaction: creation, update,
//! key canonicalization, retries, and failure atomicity.

use huebucket_concurrency::FaultInjector;
use huebucket_core::{CollectionName, DocKey, Document, Hue, HueError, ResultPath, Value};
use huebucket_engine::{
    AggregationOutcome, BucketAggregator, BucketDistribution, Database, HueBucketConfig,
    RetryConfig,
};
use proptest::prelude::*;
use std::sync::Arc;

fn quick_retry(max_retries: usize) -> RetryConfig {
    RetryConfig::new()
        .with_max_retries(max_retries)
        .with_base_delay_ms(0)
        .with_max_delay_ms(1)
}

fn aggregator_on(db: &Arc<Database>, max_retries: usize) -> BucketAggregator {
    let config = HueBucketConfig {
        retry: quick_retry(max_retries),
        ..Default::default()
    };
    BucketAggregator::new(Arc::clone(db), &config).unwrap()
}

fn buckets() -> CollectionName {
    CollectionName::new("bucket-counts").unwrap()
}

/// Committed state of the bucket collection as (id, count) pairs
fn bucket_state(db: &Database) -> Vec<(String, Value)> {
    db.scan_collection(&buckets())
        .unwrap()
        .into_iter()
        .map(|(key, v)| (key.id, v.document.get("count").cloned().unwrap_or(Value::Null)))
        .collect()
}

// ============================================================================
// Basic counting
// ============================================================================

#[test]
fn test_single_increment_creates_bucket() {
    let db = Database::ephemeral();
    let aggregator = aggregator_on(&db, 4);

    let outcome = aggregator.aggregate(Hue::Int(5), None).unwrap();

    match outcome {
        AggregationOutcome::Applied(update) => {
            assert_eq!(update.key.as_str(), "5");
            assert_eq!(update.count, 1);
            assert!(update.created);
        }
        other => panic!("expected Applied, got {:?}", other),
    }
    assert_eq!(bucket_state(&db), vec![("5".to_string(), Value::Int(1))]);
}

#[test]
fn test_sequential_increments_accumulate() {
    let db = Database::ephemeral();
    let aggregator = aggregator_on(&db, 4);

    for n in 1..=3 {
        let source = ResultPath::new("alice", format!("r{}", n));
        aggregator.aggregate(Hue::Int(5), Some(&source)).unwrap();
    }

    assert_eq!(aggregator.count_for(Hue::Int(5)).unwrap(), 3);
}

#[test]
fn test_distinct_hues_are_isolated() {
    let db = Database::ephemeral();
    let aggregator = aggregator_on(&db, 4);

    aggregator.aggregate(Hue::Int(5), None).unwrap();
    aggregator.aggregate(Hue::Int(7), None).unwrap();

    assert_eq!(
        bucket_state(&db),
        vec![
            ("5".to_string(), Value::Int(1)),
            ("7".to_string(), Value::Int(1)),
        ]
    );
}

#[test]
fn test_int_and_integral_float_share_bucket() {
    let db = Database::ephemeral();
    let aggregator = aggregator_on(&db, 4);

    aggregator.aggregate(Hue::Int(5), None).unwrap();
    aggregator.aggregate(Hue::Float(5.0), None).unwrap();
    aggregator.aggregate(Hue::Float(5.5), None).unwrap();

    assert_eq!(aggregator.count_for(Hue::Int(5)).unwrap(), 2);
    assert_eq!(aggregator.count_for(Hue::Float(5.5)).unwrap(), 1);
}

#[test]
fn test_custom_buckets_collection() {
    let db = Database::ephemeral();
    let config = HueBucketConfig {
        buckets_collection: "hue-totals".to_string(),
        retry: quick_retry(0),
        ..Default::default()
    };
    let aggregator = BucketAggregator::new(Arc::clone(&db), &config).unwrap();
    aggregator.aggregate(Hue::Int(1), None).unwrap();

    let custom = CollectionName::new("hue-totals").unwrap();
    assert_eq!(db.scan_collection(&custom).unwrap().len(), 1);
    assert!(db.scan_collection(&buckets()).unwrap().is_empty());
}

// ============================================================================
// Retry behavior
// ============================================================================

#[test]
fn test_retry_then_succeed_matches_single_attempt() {
    let clean = Database::ephemeral();
    aggregator_on(&clean, 4).aggregate(Hue::Int(5), None).unwrap();

    let faulty = Database::builder()
        .fault_injector(Arc::new(FaultInjector::new().fail_next_with_conflict(3)))
        .build()
        .unwrap();
    aggregator_on(&faulty, 4).aggregate(Hue::Int(5), None).unwrap();

    assert_eq!(bucket_state(&clean), bucket_state(&faulty));
    assert_eq!(faulty.metrics().total_retried, 3);
    assert_eq!(faulty.metrics().total_committed, 1);
}

#[test]
fn test_retry_exhaustion_leaves_store_unchanged() {
    let db = Database::builder()
        .fault_injector(Arc::new(FaultInjector::new().fail_next_with_conflict(100)))
        .build()
        .unwrap();
    let aggregator = aggregator_on(&db, 4);

    let err = aggregator
        .aggregate(Hue::Int(5), Some(&ResultPath::new("u", "d")))
        .unwrap_err();

    match err {
        HueError::RetryExhausted { attempts, last } => {
            assert_eq!(attempts, 5);
            assert!(last.is_conflict());
        }
        other => panic!("expected RetryExhausted, got {:?}", other),
    }
    assert_eq!(db.current_version(), 0);
    assert!(bucket_state(&db).is_empty());
    assert!(!aggregator.is_processed(&ResultPath::new("u", "d")).unwrap());
}

#[test]
fn test_unavailable_store_is_retried() {
    let db = Database::builder()
        .fault_injector(Arc::new(FaultInjector::new().fail_next_with_unavailable(2)))
        .build()
        .unwrap();
    let aggregator = aggregator_on(&db, 4);

    aggregator.aggregate(Hue::Int(5), None).unwrap();
    assert_eq!(aggregator.count_for(Hue::Int(5)).unwrap(), 1);
    assert_eq!(db.metrics().total_retried, 2);
}

#[test]
fn test_unavailable_without_retries_is_exhausted() {
    let db = Database::builder()
        .fault_injector(Arc::new(FaultInjector::new().fail_next_with_unavailable(1)))
        .build()
        .unwrap();
    let aggregator = aggregator_on(&db, 0);

    let err = aggregator.aggregate(Hue::Int(5), None).unwrap_err();
    assert!(matches!(
        err,
        HueError::RetryExhausted { attempts: 1, ref last } if matches!(**last, HueError::Unavailable { .. })
    ));
}

#[test]
fn test_corrupt_bucket_fails_without_retry() {
    let db = Database::ephemeral();
    db.put(
        DocKey::new(buckets(), "5"),
        Document::from_fields([("count", Value::from("lots"))]),
    )
    .unwrap();
    let aggregator = aggregator_on(&db, 4);

    let err = aggregator.aggregate(Hue::Int(5), None).unwrap_err();
    assert!(matches!(err, HueError::Corruption { .. }));
    assert_eq!(db.metrics().total_retried, 0);
}

// ============================================================================
// Deduplication and distribution
// ============================================================================

#[test]
fn test_redelivery_is_counted_once() {
    let db = Database::ephemeral();
    let aggregator = aggregator_on(&db, 4);
    let source = ResultPath::new("alice", "r1");

    assert!(matches!(
        aggregator.aggregate(Hue::Int(5), Some(&source)).unwrap(),
        AggregationOutcome::Applied(_)
    ));
    let version_after_first = db.current_version();

    assert_eq!(
        aggregator.aggregate(Hue::Int(5), Some(&source)).unwrap(),
        AggregationOutcome::AlreadyCounted
    );
    assert_eq!(db.current_version(), version_after_first);
    assert_eq!(aggregator.count_for(Hue::Int(5)).unwrap(), 1);
}

#[test]
fn test_distribution_over_aggregated_buckets() {
    let db = Database::ephemeral();
    let aggregator = aggregator_on(&db, 4);
    for hue in [10, 20, 20, 30] {
        aggregator.aggregate(Hue::Int(hue), None).unwrap();
    }

    let dist = BucketDistribution::load(&db, aggregator.buckets_collection()).unwrap();
    assert_eq!(dist.total(), 4);
    assert_eq!(dist.fraction_above(20.0), Some(0.25));
    assert_eq!(dist.fraction_at_or_below(20.0), Some(0.75));
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Counting a sequence of hues yields per-bucket totals equal to the
    /// number of occurrences of each canonical key.
    #[test]
    fn prop_counts_match_occurrences(hues in prop::collection::vec(-5i64..5, 0..40)) {
        let db = Database::ephemeral();
        let aggregator = aggregator_on(&db, 0);
        for hue in &hues {
            aggregator.aggregate(Hue::Int(*hue), None).unwrap();
        }
        for hue in -5i64..5 {
            let expected = hues.iter().filter(|h| **h == hue).count() as i64;
            prop_assert_eq!(aggregator.count_for(Hue::Int(hue)).unwrap(), expected);
        }
    }
}
