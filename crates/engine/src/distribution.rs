//! Hue distribution over all bucket counts
//!
//! Read-only view used to place one result among everyone else's: "what
//! share of results have a hue above mine?"

use huebucket_core::{BucketKey, CollectionName, HueResult, Value, COUNT_FIELD};
use tracing::warn;

use crate::database::Database;

/// One bucket as seen by the distribution
#[derive(Debug, Clone, PartialEq)]
pub struct BucketCount {
    /// Stored bucket key
    pub key: BucketKey,
    /// Numeric hue parsed from the key
    pub hue: f64,
    /// Number of results in the bucket
    pub count: u64,
}

/// All buckets of a collection, sorted by numeric hue
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BucketDistribution {
    buckets: Vec<BucketCount>,
    total: u64,
}

impl BucketDistribution {
    /// Read every bucket of `collection` from one snapshot
    ///
    /// Documents whose key is not a number or whose `count` is not a
    /// non-negative integer are skipped with a warning.
    pub fn load(db: &Database, collection: &CollectionName) -> HueResult<Self> {
        let mut buckets = Vec::new();
        for (key, versioned) in db.scan_collection(collection)? {
            let bucket = BucketKey::from_stored(key.id.clone());
            let Some(hue) = bucket.hue_value() else {
                warn!(target: "huebucket::distribution", key = %key, "Skipping bucket with non-numeric key");
                continue;
            };
            let count = match versioned.document.get(COUNT_FIELD) {
                Some(Value::Int(n)) if *n >= 0 => *n as u64,
                other => {
                    warn!(target: "huebucket::distribution", key = %key, count = ?other, "Skipping bucket with invalid count");
                    continue;
                }
            };
            buckets.push(BucketCount {
                key: bucket,
                hue,
                count,
            });
        }
        Ok(Self::from_buckets(buckets))
    }

    fn from_buckets(mut buckets: Vec<BucketCount>) -> Self {
        buckets.sort_by(|a, b| a.hue.total_cmp(&b.hue));
        let total = buckets.iter().map(|b| b.count).sum();
        Self { buckets, total }
    }

    /// Total results across all buckets
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Number of buckets
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// True if there are no buckets
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Buckets in ascending hue order
    pub fn buckets(&self) -> &[BucketCount] {
        &self.buckets
    }

    /// Count of one bucket (0 if absent)
    pub fn count_for(&self, key: &BucketKey) -> u64 {
        self.buckets
            .iter()
            .find(|b| &b.key == key)
            .map(|b| b.count)
            .unwrap_or(0)
    }

    /// Cumulative step function: `(hue, share of results with hue <= it)`
    ///
    /// Empty when there are no results.
    pub fn cumulative(&self) -> Vec<(f64, f64)> {
        if self.total == 0 {
            return Vec::new();
        }
        let mut running = 0u64;
        self.buckets
            .iter()
            .map(|b| {
                running += b.count;
                (b.hue, running as f64 / self.total as f64)
            })
            .collect()
    }

    /// Share of results with hue `<= hue`, or `None` with no results
    pub fn fraction_at_or_below(&self, hue: f64) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        let at_or_below: u64 = self
            .buckets
            .iter()
            .take_while(|b| b.hue <= hue)
            .map(|b| b.count)
            .sum();
        Some(at_or_below as f64 / self.total as f64)
    }

    /// Share of results with hue strictly above `hue`, or `None` with no results
    pub fn fraction_above(&self, hue: f64) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        let above: u64 = self
            .buckets
            .iter()
            .filter(|b| b.hue > hue)
            .map(|b| b.count)
            .sum();
        Some(above as f64 / self.total as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huebucket_core::{DocKey, Document};

    fn collection() -> CollectionName {
        CollectionName::new("bucket-counts").unwrap()
    }

    fn seed(db: &Database, id: &str, count: Value) {
        db.put(
            DocKey::new(collection(), id),
            Document::from_fields([(COUNT_FIELD, count)]),
        )
        .unwrap();
    }

    #[test]
    fn test_empty_distribution() {
        let db = Database::ephemeral();
        let dist = BucketDistribution::load(&db, &collection()).unwrap();
        assert!(dist.is_empty());
        assert_eq!(dist.total(), 0);
        assert_eq!(dist.fraction_at_or_below(10.0), None);
        assert_eq!(dist.fraction_above(10.0), None);
        assert!(dist.cumulative().is_empty());
    }

    #[test]
    fn test_sorted_numerically_not_lexically() {
        let db = Database::ephemeral();
        seed(&db, "10", Value::Int(1));
        seed(&db, "9", Value::Int(2));
        seed(&db, "-2.5", Value::Int(1));

        let dist = BucketDistribution::load(&db, &collection()).unwrap();
        let hues: Vec<f64> = dist.buckets().iter().map(|b| b.hue).collect();
        assert_eq!(hues, vec![-2.5, 9.0, 10.0]);
        assert_eq!(dist.total(), 4);
        assert_eq!(dist.count_for(&BucketKey::from_stored("9")), 2);
        assert_eq!(dist.count_for(&BucketKey::from_stored("11")), 0);
    }

    #[test]
    fn test_fractions() {
        let db = Database::ephemeral();
        seed(&db, "1", Value::Int(1));
        seed(&db, "2", Value::Int(2));
        seed(&db, "3", Value::Int(1));

        let dist = BucketDistribution::load(&db, &collection()).unwrap();
        assert_eq!(dist.fraction_at_or_below(2.0), Some(0.75));
        assert_eq!(dist.fraction_above(2.0), Some(0.25));
        assert_eq!(dist.fraction_above(0.0), Some(1.0));
        assert_eq!(dist.fraction_at_or_below(0.5), Some(0.0));
        assert_eq!(
            dist.cumulative(),
            vec![(1.0, 0.25), (2.0, 0.75), (3.0, 1.0)]
        );
    }

    #[test]
    fn test_skips_unparsable_buckets() {
        let db = Database::ephemeral();
        seed(&db, "red", Value::Int(3));
        seed(&db, "4", Value::from("four"));
        seed(&db, "5", Value::Int(2));

        let dist = BucketDistribution::load(&db, &collection()).unwrap();
        assert_eq!(dist.len(), 1);
        assert_eq!(dist.total(), 2);
    }
}
