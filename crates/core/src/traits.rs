//! Core traits for storage and snapshot abstraction
//!
//! This module defines the Storage and SnapshotView traits that let the
//! concurrency and engine layers run against any document store offering
//! point reads, versioned writes and version-bounded views.

use crate::document::{Document, VersionedDocument};
use crate::error::HueResult;
use crate::types::{CollectionName, DocKey};

/// Document store abstraction
///
/// Thread safety: All methods must be safe to call concurrently from
/// multiple threads (requires Send + Sync).
pub trait Storage: Send + Sync {
    /// Get the latest version of a document
    ///
    /// Returns None if the document doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn get(&self, key: &DocKey) -> HueResult<Option<VersionedDocument>>;

    /// Get the document as of `max_version` (for snapshot isolation)
    ///
    /// Returns the latest version <= max_version.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn get_versioned(&self, key: &DocKey, max_version: u64)
        -> HueResult<Option<VersionedDocument>>;

    /// List every document of a collection visible at `max_version`
    ///
    /// Results are sorted by document id.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn scan_collection(
        &self,
        collection: &CollectionName,
        max_version: u64,
    ) -> HueResult<Vec<(DocKey, VersionedDocument)>>;

    /// Highest version whose writes are visible
    fn current_version(&self) -> u64;

    /// Write a document with a version allocated by the transaction layer
    ///
    /// All keys in one transaction are written with the same version.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn put_with_version(&self, key: DocKey, document: Document, version: u64) -> HueResult<()>;

    /// Write several documents with one version
    ///
    /// The version becomes visible to new snapshots only after every write
    /// in the batch has been applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn apply_batch(&self, writes: Vec<(DocKey, Document)>, version: u64) -> HueResult<()>;
}

/// Version-bounded read view of storage
///
/// Thread safety: Must be safe to pass between threads (Send + Sync).
pub trait SnapshotView: Send + Sync {
    /// Get a document as it existed at the snapshot version
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn get(&self, key: &DocKey) -> HueResult<Option<VersionedDocument>>;

    /// List a collection as it existed at the snapshot version
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn scan_collection(
        &self,
        collection: &CollectionName,
    ) -> HueResult<Vec<(DocKey, VersionedDocument)>>;

    /// Version this snapshot was taken at
    fn version(&self) -> u64;
}
