//! Transaction context for OCC
//!
//! This module implements the core transaction data structure for optimistic
//! concurrency control. TransactionContext tracks every document read and
//! buffers every write, enabling validation at commit time.

use crate::validation::ValidationResult;
use huebucket_core::{
    CollectionName, DocKey, Document, HueError, HueResult, SnapshotView, VersionedDocument,
};
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

/// Error type for commit failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum CommitError {
    /// Transaction aborted due to validation conflicts
    #[error("commit failed: {} conflict(s)", .0.conflict_count())]
    ValidationFailed(ValidationResult),

    /// Transaction was not in correct state for commit
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The store could not be reached during commit
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<CommitError> for HueError {
    fn from(e: CommitError) -> Self {
        match e {
            CommitError::ValidationFailed(result) => {
                let key = result
                    .first_key()
                    .map(|k| k.to_string())
                    .unwrap_or_else(|| "<none>".to_string());
                HueError::conflict(key, result.describe())
            }
            CommitError::InvalidState(state) => HueError::TransactionNotActive { state },
            CommitError::Unavailable(message) => HueError::Unavailable { message },
        }
    }
}

/// Status of a transaction in its lifecycle
///
/// State transitions:
/// - `Active` → `Validating` (begin commit)
/// - `Validating` → `Committed` (validation passed)
/// - `Validating` → `Aborted` (conflict detected)
/// - `Active` → `Aborted` (closure error or injected fault)
///
/// Terminal states (no transitions allowed):
/// - `Committed`
/// - `Aborted`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Transaction is executing, can read/write
    Active,
    /// Transaction is being validated for conflicts
    Validating,
    /// Transaction committed successfully
    Committed,
    /// Transaction was aborted
    Aborted {
        /// Human-readable reason for abort
        reason: String,
    },
}

/// Transaction context for OCC with snapshot isolation
///
/// # Read-Your-Writes Semantics
///
/// When reading a key, the transaction checks in order:
/// 1. **write_set**: Returns the uncommitted write from this transaction
/// 2. **snapshot**: Returns the document from the snapshot, tracks in read_set
///
/// # Read-Set Tracking
///
/// All snapshot reads are tracked in `read_set` with the version read
/// (0 = the document did not exist). At commit time these versions are
/// validated against current storage; any change is a read-write conflict.
/// This is what turns read-check-write into an atomic compare-and-swap.
///
/// # Lifecycle
///
/// 1. **BEGIN**: Create with `with_snapshot()`, status is `Active`
/// 2. **READ/WRITE**: Use `get()` and `put()`
/// 3. **VALIDATE**: `mark_validating()`, check for conflicts
/// 4. **COMMIT/ABORT**: `mark_committed()` or `mark_aborted()`
pub struct TransactionContext {
    /// Unique transaction ID
    pub txn_id: u64,

    /// Version at transaction start (snapshot version)
    pub start_version: u64,

    snapshot: Box<dyn SnapshotView>,

    /// Keys read and the versions observed
    pub read_set: HashMap<DocKey, u64>,

    /// Buffered writes, ordered by key
    pub write_set: BTreeMap<DocKey, Document>,

    /// Current transaction status
    pub status: TransactionStatus,

    start_time: Instant,
}

impl TransactionContext {
    /// Create a new transaction context with a snapshot
    ///
    /// # Arguments
    /// * `txn_id` - Unique transaction identifier
    /// * `snapshot` - Snapshot view for this transaction
    pub fn with_snapshot(txn_id: u64, snapshot: Box<dyn SnapshotView>) -> Self {
        let start_version = snapshot.version();
        TransactionContext {
            txn_id,
            start_version,
            snapshot,
            read_set: HashMap::new(),
            write_set: BTreeMap::new(),
            status: TransactionStatus::Active,
            start_time: Instant::now(),
        }
    }

    // === Read Operations ===

    /// Get a document from the transaction
    ///
    /// # Errors
    /// Returns `TransactionNotActive` if the transaction is not active.
    pub fn get(&mut self, key: &DocKey) -> HueResult<Option<Document>> {
        self.ensure_active()?;

        // Read-your-writes: no read_set entry for our own uncommitted write
        if let Some(document) = self.write_set.get(key) {
            return Ok(Some(document.clone()));
        }

        let versioned = self.snapshot.get(key)?;
        match versioned {
            Some(VersionedDocument { document, version }) => {
                self.read_set.insert(key.clone(), version);
                Ok(Some(document))
            }
            None => {
                // Absent documents are tracked too: if someone creates this key
                // before we commit, our assumption was wrong.
                self.read_set.insert(key.clone(), 0);
                Ok(None)
            }
        }
    }

    /// Check if a document exists in the transaction's view
    ///
    /// Tracks the read like `get()`.
    ///
    /// # Errors
    /// Returns `TransactionNotActive` if the transaction is not active.
    pub fn exists(&mut self, key: &DocKey) -> HueResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// List a collection as seen by this transaction
    ///
    /// Snapshot results are tracked in the read set; this transaction's own
    /// buffered writes to the collection are merged in.
    ///
    /// # Errors
    /// Returns `TransactionNotActive` if the transaction is not active.
    pub fn scan_collection(
        &mut self,
        collection: &CollectionName,
    ) -> HueResult<Vec<(DocKey, Document)>> {
        self.ensure_active()?;

        let mut results: BTreeMap<DocKey, Document> = BTreeMap::new();
        for (key, versioned) in self.snapshot.scan_collection(collection)? {
            self.read_set.insert(key.clone(), versioned.version);
            results.insert(key, versioned.document);
        }
        for (key, document) in &self.write_set {
            if &key.collection == collection {
                results.insert(key.clone(), document.clone());
            }
        }
        Ok(results.into_iter().collect())
    }

    /// Get the version that was read for a key
    ///
    /// Returns None if the key hasn't been read from the snapshot.
    /// Returns Some(0) if the key was read but didn't exist.
    pub fn get_read_version(&self, key: &DocKey) -> Option<u64> {
        self.read_set.get(key).copied()
    }

    // === Write Operations ===

    /// Buffer a write (create or full replace)
    ///
    /// The write is NOT applied to storage until commit. Writes are blind:
    /// read the key first if the write depends on its previous state.
    ///
    /// # Errors
    /// Returns `TransactionNotActive` if the transaction is not active.
    pub fn put(&mut self, key: DocKey, document: Document) -> HueResult<()> {
        self.ensure_active()?;
        self.write_set.insert(key, document);
        Ok(())
    }

    // === State ===

    /// Check if transaction is still active
    pub fn is_active(&self) -> bool {
        self.status == TransactionStatus::Active
    }

    /// Check if transaction has committed
    pub fn is_committed(&self) -> bool {
        self.status == TransactionStatus::Committed
    }

    /// Check if transaction has been aborted
    pub fn is_aborted(&self) -> bool {
        matches!(self.status, TransactionStatus::Aborted { .. })
    }

    /// True if no writes are buffered
    pub fn is_read_only(&self) -> bool {
        self.write_set.is_empty()
    }

    /// Number of buffered writes
    pub fn pending_writes(&self) -> usize {
        self.write_set.len()
    }

    /// Time since the transaction began
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Ensure transaction is active
    ///
    /// # Errors
    /// Returns `TransactionNotActive` describing the current state.
    pub fn ensure_active(&self) -> HueResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(HueError::TransactionNotActive {
                state: format!("{:?}", self.status),
            })
        }
    }

    /// Transition Active → Validating
    ///
    /// # Errors
    /// Returns `CommitError::InvalidState` from any other state.
    pub fn mark_validating(&mut self) -> Result<(), CommitError> {
        if !self.is_active() {
            return Err(CommitError::InvalidState(format!("{:?}", self.status)));
        }
        self.status = TransactionStatus::Validating;
        Ok(())
    }

    /// Transition Validating → Committed
    ///
    /// # Errors
    /// Returns `CommitError::InvalidState` from any other state.
    pub fn mark_committed(&mut self) -> Result<(), CommitError> {
        if self.status != TransactionStatus::Validating {
            return Err(CommitError::InvalidState(format!("{:?}", self.status)));
        }
        self.status = TransactionStatus::Committed;
        Ok(())
    }

    /// Transition to Aborted, discarding buffered writes
    ///
    /// # Errors
    /// Returns `CommitError::InvalidState` if already committed or aborted.
    pub fn mark_aborted(&mut self, reason: impl Into<String>) -> Result<(), CommitError> {
        match self.status {
            TransactionStatus::Committed | TransactionStatus::Aborted { .. } => {
                Err(CommitError::InvalidState(format!("{:?}", self.status)))
            }
            _ => {
                self.write_set.clear();
                self.status = TransactionStatus::Aborted {
                    reason: reason.into(),
                };
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for TransactionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionContext")
            .field("txn_id", &self.txn_id)
            .field("start_version", &self.start_version)
            .field("read_set", &self.read_set.len())
            .field("write_set", &self.write_set.len())
            .field("status", &self.status)
            .finish()
    }
}
