//! Sharded document storage
//!
//! DashMap of per-collection shards, FxHashMap of version chains within.
//!
//! # Design
//!
//! - DashMap: sharded by collection, lock-free reads
//! - FxHashMap: O(1) lookups by document id
//! - Per-collection: bucket counters and processed markers never share a shard
//!
//! # Version Handling
//!
//! Every write carries the commit version allocated by the transaction layer.
//! Batches are applied one at a time under `apply_lock`, and the store-level
//! `version` is published only after the whole batch is in place. A batch must
//! carry a version above the published one, so a snapshot taken at version V
//! never gains writes later: everything at or below V is already applied.
//!
//! Point reads through [`Storage::get`] are bounded by the published version
//! as well, so a half-applied batch is never observable.
//!
//! Version chains are pruned to [`MAX_VERSIONS_PER_KEY`]. A snapshot that
//! needs a pruned version sees the document as absent; read-set validation at
//! commit then rejects the transaction as a conflict.

use dashmap::DashMap;
use huebucket_core::{
    CollectionName, DocKey, Document, HueError, HueResult, SnapshotView, Storage,
    VersionedDocument,
};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Versions retained per document
pub const MAX_VERSIONS_PER_KEY: usize = 16;

/// Version chain for MVCC - stores multiple versions of a document
///
/// Versions are stored newest first for efficient snapshot reads.
#[derive(Debug, Clone)]
pub struct VersionChain {
    versions: VecDeque<VersionedDocument>,
}

impl VersionChain {
    /// Create a new version chain with a single version
    pub fn new(value: VersionedDocument) -> Self {
        let mut versions = VecDeque::with_capacity(4);
        versions.push_front(value);
        Self { versions }
    }

    /// Add a new version (must be newer than existing versions)
    ///
    /// Drops the oldest versions beyond [`MAX_VERSIONS_PER_KEY`].
    #[inline]
    pub fn push(&mut self, value: VersionedDocument) {
        debug_assert!(
            self.latest().map_or(true, |v| v.version < value.version),
            "versions must be pushed in increasing order"
        );
        self.versions.push_front(value);
        self.versions.truncate(MAX_VERSIONS_PER_KEY);
    }

    /// Get the version at or before the given max_version
    pub fn get_at_version(&self, max_version: u64) -> Option<&VersionedDocument> {
        self.versions.iter().find(|v| v.version <= max_version)
    }

    /// Get the latest version
    #[inline]
    pub fn latest(&self) -> Option<&VersionedDocument> {
        self.versions.front()
    }

    /// Number of versions stored
    pub fn version_count(&self) -> usize {
        self.versions.len()
    }
}

/// Documents of one collection
#[derive(Debug, Default)]
pub struct Shard {
    pub(crate) data: FxHashMap<String, VersionChain>,
}

impl Shard {
    /// Create a new empty shard
    pub fn new() -> Self {
        Self::default()
    }

    /// Get number of documents in this shard
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if shard is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Sharded in-memory document store
///
/// # Thread Safety
///
/// All operations are thread-safe:
/// - reads: lock-free via DashMap read guards
/// - writes: one batch at a time; each write only locks its collection's shard
///
/// # Example
///
/// ```ignore
/// use huebucket_storage::ShardedStore;
/// use std::sync::Arc;
///
/// let store = Arc::new(ShardedStore::new());
/// let snapshot = store.create_snapshot();
/// ```
#[derive(Debug, Default)]
pub struct ShardedStore {
    shards: DashMap<CollectionName, Shard>,
    version: AtomicU64,
    apply_lock: Mutex<()>,
}

impl ShardedStore {
    /// Create new sharded store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current visible version
    #[inline]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Get number of collections holding at least one document
    pub fn collection_count(&self) -> usize {
        self.shards.len()
    }

    /// Get number of documents in a collection
    pub fn collection_len(&self, collection: &CollectionName) -> usize {
        self.shards
            .get(collection)
            .map(|shard| shard.len())
            .unwrap_or(0)
    }

    /// Get total number of documents across all collections
    pub fn total_entries(&self) -> usize {
        self.shards.iter().map(|entry| entry.value().len()).sum()
    }

    /// Number of retained versions of one document
    pub fn version_count(&self, key: &DocKey) -> usize {
        self.shards
            .get(&key.collection)
            .and_then(|shard| shard.data.get(&key.id).map(VersionChain::version_count))
            .unwrap_or(0)
    }

    /// Create a snapshot at the current visible version
    pub fn create_snapshot(self: &Arc<Self>) -> ShardedSnapshot {
        ShardedSnapshot {
            version: self.version(),
            store: Arc::clone(self),
        }
    }

    fn write(&self, key: DocKey, document: Document, version: u64) {
        let value = VersionedDocument::new(document, version);
        let mut shard = self.shards.entry(key.collection).or_default();
        match shard.data.get_mut(&key.id) {
            Some(chain) => chain.push(value),
            None => {
                shard.data.insert(key.id, VersionChain::new(value));
            }
        }
    }

    fn read_at(&self, key: &DocKey, max_version: u64) -> Option<VersionedDocument> {
        self.shards.get(&key.collection).and_then(|shard| {
            shard
                .data
                .get(&key.id)
                .and_then(|chain| chain.get_at_version(max_version).cloned())
        })
    }

    fn list_at(
        &self,
        collection: &CollectionName,
        max_version: u64,
    ) -> Vec<(DocKey, VersionedDocument)> {
        self.shards
            .get(collection)
            .map(|shard| {
                let mut results: Vec<_> = shard
                    .data
                    .iter()
                    .filter_map(|(id, chain)| {
                        chain.get_at_version(max_version).map(|v| {
                            (DocKey::new(collection.clone(), id.clone()), v.clone())
                        })
                    })
                    .collect();
                results.sort_by(|(a, _), (b, _)| a.cmp(b));
                results
            })
            .unwrap_or_default()
    }
}

impl Storage for ShardedStore {
    fn get(&self, key: &DocKey) -> HueResult<Option<VersionedDocument>> {
        Ok(self.read_at(key, self.version()))
    }

    fn get_versioned(
        &self,
        key: &DocKey,
        max_version: u64,
    ) -> HueResult<Option<VersionedDocument>> {
        Ok(self.read_at(key, max_version))
    }

    fn scan_collection(
        &self,
        collection: &CollectionName,
        max_version: u64,
    ) -> HueResult<Vec<(DocKey, VersionedDocument)>> {
        Ok(self.list_at(collection, max_version))
    }

    fn current_version(&self) -> u64 {
        self.version()
    }

    fn put_with_version(&self, key: DocKey, document: Document, version: u64) -> HueResult<()> {
        self.apply_batch(vec![(key, document)], version)
    }

    fn apply_batch(&self, writes: Vec<(DocKey, Document)>, version: u64) -> HueResult<()> {
        let _apply = self.apply_lock.lock();
        let published = self.version();
        if version <= published {
            return Err(HueError::internal(format!(
                "batch version {} is not above published version {}",
                version, published
            )));
        }

        let count = writes.len();
        for (key, document) in writes {
            self.write(key, document, version);
        }
        // Publish only after the whole batch is in place
        self.version.store(version, Ordering::Release);
        tracing::trace!(target: "huebucket::storage", version, writes = count, "Batch applied");
        Ok(())
    }
}

/// Version-bounded view over a [`ShardedStore`]
///
/// Reads go to the live store filtered by the snapshot version, so taking a
/// snapshot is O(1).
#[derive(Debug, Clone)]
pub struct ShardedSnapshot {
    version: u64,
    store: Arc<ShardedStore>,
}

impl ShardedSnapshot {
    /// Check if a document exists at the snapshot version
    pub fn contains(&self, key: &DocKey) -> bool {
        self.store.read_at(key, self.version).is_some()
    }
}

impl SnapshotView for ShardedSnapshot {
    fn get(&self, key: &DocKey) -> HueResult<Option<VersionedDocument>> {
        Ok(self.store.read_at(key, self.version))
    }

    fn scan_collection(
        &self,
        collection: &CollectionName,
    ) -> HueResult<Vec<(DocKey, VersionedDocument)>> {
        Ok(self.store.list_at(collection, self.version))
    }

    fn version(&self) -> u64 {
        self.version
    }
}
