//! Bucket aggregation
//!
//! One bucket document per distinct hue, holding how many result documents
//! carry that hue:
//!
//! ```text
//! bucket-counts/{bucket key} -> { count: Int }
//! ```
//!
//! Each aggregation is a single read-modify-write transaction. Concurrent
//! aggregations of the same hue serialize through read-set validation at
//! commit; the loser re-reads and retries, so no increment is lost.
//!
//! With deduplication on, the same transaction also reads and writes a
//! processed marker for the source document. A redelivered creation event
//! finds the marker and writes nothing.

use chrono::Utc;
use huebucket_concurrency::TransactionContext;
use huebucket_core::{
    BucketKey, CollectionName, DocKey, Document, Hue, HueError, HueResult, ResultPath, Value,
    COUNT_FIELD,
};
use std::sync::Arc;
use tracing::debug;

use crate::database::{Database, HueBucketConfig, RetryConfig};

/// Marker field naming the bucket a source document was counted in
pub const MARKER_BUCKET_FIELD: &str = "bucket";

/// Marker field holding the count time in Unix microseconds
pub const MARKER_PROCESSED_AT_FIELD: &str = "processed_at";

/// State of a bucket right after a successful increment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketUpdate {
    /// Bucket that was incremented
    pub key: BucketKey,
    /// Count after the increment
    pub count: i64,
    /// True if this increment created the bucket
    pub created: bool,
}

/// Result of one aggregation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregationOutcome {
    /// The bucket was incremented
    Applied(BucketUpdate),
    /// The source document had already been counted; nothing was written
    AlreadyCounted,
}

/// Increment the bucket at `key` inside `txn`
///
/// Reads the bucket and writes it back with `count + 1`, keeping any other
/// fields. An absent bucket is created with `count = 1`; a bucket without a
/// `count` field counts from 0.
///
/// # Errors
/// - `Corruption` if `count` is not a non-negative integer, or would overflow
/// - `TransactionNotActive` if `txn` already finished
pub fn increment_bucket(txn: &mut TransactionContext, key: &DocKey) -> HueResult<BucketUpdate> {
    let (mut document, created) = match txn.get(key)? {
        Some(document) => (document, false),
        None => (Document::new(), true),
    };

    let current = match document.get(COUNT_FIELD) {
        None => 0,
        Some(Value::Int(n)) if *n >= 0 => *n,
        Some(other) => {
            return Err(HueError::corruption(format!(
                "bucket {} has invalid {} {:?}",
                key, COUNT_FIELD, other
            )))
        }
    };
    let count = current
        .checked_add(1)
        .ok_or_else(|| HueError::corruption(format!("bucket {} count overflow", key)))?;

    document.insert(COUNT_FIELD, Value::Int(count));
    txn.put(key.clone(), document)?;

    Ok(BucketUpdate {
        key: BucketKey::from_stored(key.id.clone()),
        count,
        created,
    })
}

fn processed_marker(bucket: &BucketKey) -> Document {
    Document::from_fields([
        (MARKER_BUCKET_FIELD, Value::from(bucket.as_str())),
        (
            MARKER_PROCESSED_AT_FIELD,
            Value::Int(Utc::now().timestamp_micros()),
        ),
    ])
}

/// Runs bucket increments against a shared database
#[derive(Debug, Clone)]
pub struct BucketAggregator {
    db: Arc<Database>,
    buckets: CollectionName,
    processed: Option<CollectionName>,
    retry: RetryConfig,
}

impl BucketAggregator {
    /// Build an aggregator from a validated configuration
    ///
    /// # Errors
    /// `InvalidInput` if the configuration does not validate.
    pub fn new(db: Arc<Database>, config: &HueBucketConfig) -> HueResult<Self> {
        config.validate()?;
        let processed = if config.deduplicate {
            Some(config.processed_collection()?)
        } else {
            None
        };
        Ok(Self {
            db,
            buckets: config.buckets_collection()?,
            processed,
            retry: config.retry.clone(),
        })
    }

    /// Collection holding the bucket documents
    pub fn buckets_collection(&self) -> &CollectionName {
        &self.buckets
    }

    /// Whether source documents are deduplicated
    pub fn deduplicates(&self) -> bool {
        self.processed.is_some()
    }

    /// Document key of the bucket for `hue`
    pub fn bucket_doc_key(&self, hue: Hue) -> DocKey {
        DocKey::new(self.buckets.clone(), hue.bucket_key().as_str())
    }

    fn marker_key(&self, source: Option<&ResultPath>) -> Option<DocKey> {
        match (&self.processed, source) {
            (Some(collection), Some(path)) => {
                Some(DocKey::new(collection.clone(), path.document_path()))
            }
            _ => None,
        }
    }

    /// Count one result document with `hue`
    ///
    /// `source` identifies the result document for deduplication; without it
    /// (or with deduplication off) every call increments.
    ///
    /// # Errors
    /// - `RetryExhausted` when every attempt hit a conflict or outage
    /// - `Corruption` for a malformed bucket document (not retried)
    pub fn aggregate(&self, hue: Hue, source: Option<&ResultPath>) -> HueResult<AggregationOutcome> {
        let key = self.bucket_doc_key(hue);
        let marker = self.marker_key(source);

        let outcome = self.db.transaction_with_retry(&self.retry, |txn| {
            if let Some(marker) = &marker {
                if txn.exists(marker)? {
                    return Ok(AggregationOutcome::AlreadyCounted);
                }
            }
            let update = increment_bucket(txn, &key)?;
            if let Some(marker) = &marker {
                txn.put(marker.clone(), processed_marker(&update.key))?;
            }
            Ok(AggregationOutcome::Applied(update))
        })?;

        debug!(target: "huebucket::aggregate", bucket = %key, ?outcome, "Aggregation finished");
        Ok(outcome)
    }

    /// Whether the result document at `path` has a processed marker
    ///
    /// Always false with deduplication off.
    pub fn is_processed(&self, path: &ResultPath) -> HueResult<bool> {
        match self.marker_key(Some(path)) {
            Some(marker) => Ok(self.db.get(&marker)?.is_some()),
            None => Ok(false),
        }
    }

    /// Committed count of the bucket for `hue` (0 if absent)
    pub fn count_for(&self, hue: Hue) -> HueResult<i64> {
        let stored = self.db.get(&self.bucket_doc_key(hue))?;
        Ok(stored
            .and_then(|v| v.document.get(COUNT_FIELD).and_then(Value::as_int))
            .unwrap_or(0))
    }
}
