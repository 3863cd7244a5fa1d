//! Database struct and transaction API
//!
//! This module provides the main Database struct that orchestrates:
//! - Storage (the reference document store)
//! - Transaction coordination and metrics
//! - Retry with exponential backoff on transient failures
//!
//! ## Transaction API
//!
//! The Database provides three ways to execute transactions:
//!
//! 1. **Closure API**: `db.transaction(|txn| { ... })`
//!    - Automatic commit on success, abort on error
//!    - Returns the closure's return value
//!
//! 2. **Retrying closure API**: `db.transaction_with_retry(&config, |txn| { ... })`
//!    - Re-runs the closure against a fresh snapshot after a conflict or outage
//!
//! 3. **Manual API**: `begin_transaction()` + `commit_transaction()`
//!    - For cases requiring external control over commit timing

mod builder;
pub mod config;
mod transactions;

pub use builder::DatabaseBuilder;
pub use config::{
    HueBucketConfig, LoggingConfig, CONFIG_FILE_NAME, DEFAULT_BUCKETS_COLLECTION,
    DEFAULT_PROCESSED_COLLECTION,
};
pub use transactions::RetryConfig;

use crate::coordinator::{TransactionCoordinator, TransactionMetrics};
use huebucket_concurrency::{FaultInjector, TransactionContext};
use huebucket_core::{
    CollectionName, DocKey, Document, HueError, HueResult, SnapshotView, Storage,
    VersionedDocument,
};
use huebucket_storage::{ShardedSnapshot, ShardedStore};
use std::sync::Arc;
use tracing::debug;

// ============================================================================
// Database Struct
// ============================================================================

/// Main database struct with transaction support
///
/// Shared between invocations as `Arc<Database>`; every method takes `&self`.
///
/// # Example
///
/// ```text
/// use huebucket_engine::Database;
///
/// let db = Database::ephemeral();
/// let count = db.transaction(|txn| {
///     let doc = txn.get(&key)?;
///     txn.put(key.clone(), updated)?;
///     Ok(doc)
/// })?;
/// ```
pub struct Database {
    storage: Arc<ShardedStore>,
    coordinator: TransactionCoordinator,
    retry: RetryConfig,
}

impl Database {
    /// Create an empty in-memory database with the default retry policy
    pub fn ephemeral() -> Arc<Self> {
        Arc::new(Database {
            storage: Arc::new(ShardedStore::new()),
            coordinator: TransactionCoordinator::new(0),
            retry: RetryConfig::default(),
        })
    }

    /// Start configuring a database
    pub fn builder() -> DatabaseBuilder {
        DatabaseBuilder::new()
    }

    /// Underlying store
    pub fn storage(&self) -> &Arc<ShardedStore> {
        &self.storage
    }

    /// Latest published store version
    pub fn current_version(&self) -> u64 {
        self.storage.version()
    }

    /// Default retry policy
    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Transaction statistics
    pub fn metrics(&self) -> TransactionMetrics {
        self.coordinator.metrics()
    }

    /// Commit fault injector, if one was configured
    pub fn fault_injector(&self) -> Option<&Arc<FaultInjector>> {
        self.coordinator.fault_injector()
    }

    // ========================================================================
    // Direct reads
    // ========================================================================

    /// Read the latest committed version of a document
    pub fn get(&self, key: &DocKey) -> HueResult<Option<VersionedDocument>> {
        self.storage.get(key)
    }

    /// Take a consistent read view at the current version
    pub fn snapshot(&self) -> ShardedSnapshot {
        self.storage.create_snapshot()
    }

    /// List a collection at the current version, sorted by key
    pub fn scan_collection(
        &self,
        collection: &CollectionName,
    ) -> HueResult<Vec<(DocKey, VersionedDocument)>> {
        self.snapshot().scan_collection(collection)
    }

    /// Write one document in its own transaction
    ///
    /// This is a blind write: it never conflicts and overwrites whatever is
    /// stored. Returns the commit version.
    pub fn put(&self, key: DocKey, document: Document) -> HueResult<u64> {
        self.transaction_with_version(|txn| txn.put(key, document))
            .map(|(_, version)| version)
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Execute one transaction attempt: commit on success, abort on error.
    ///
    /// Returns `(closure_result, commit_version)` on success.
    fn run_single_attempt<T>(
        &self,
        txn: &mut TransactionContext,
        result: HueResult<T>,
    ) -> HueResult<(T, u64)> {
        match result {
            Ok(value) => {
                let commit_version = self.coordinator.commit(txn, self.storage.as_ref())?;
                Ok((value, commit_version))
            }
            Err(e) => {
                let _ = txn.mark_aborted(format!("Closure error: {}", e));
                self.coordinator.record_abort();
                Err(e)
            }
        }
    }

    /// Execute a transaction with the given closure
    ///
    /// - Creates TransactionContext with snapshot
    /// - Executes closure with transaction
    /// - Validates and commits on success
    /// - Aborts on error
    ///
    /// # Returns
    /// * `Ok(T)` - Closure return value on successful commit
    /// * `Err` - On validation conflict or closure error
    pub fn transaction<F, T>(&self, f: F) -> HueResult<T>
    where
        F: FnOnce(&mut TransactionContext) -> HueResult<T>,
    {
        self.transaction_with_version(f).map(|(value, _)| value)
    }

    /// Execute a transaction and return both the result and commit version
    pub fn transaction_with_version<F, T>(&self, f: F) -> HueResult<(T, u64)>
    where
        F: FnOnce(&mut TransactionContext) -> HueResult<T>,
    {
        let mut txn = self.begin_transaction();
        let result = f(&mut txn);
        self.run_single_attempt(&mut txn, result)
    }

    /// Execute a transaction with automatic retry on transient failure
    ///
    /// The closure is called once per attempt, each time against a fresh
    /// snapshot, until either:
    /// - The transaction commits successfully
    /// - A non-transient error occurs (returned as-is, not retried)
    /// - `config.max_retries` retries have failed, which yields
    ///   `HueError::RetryExhausted` wrapping the last error
    ///
    /// Nothing is written by a failed attempt.
    ///
    /// # Example
    /// ```text
    /// let count = db.transaction_with_retry(&RetryConfig::default(), |txn| {
    ///     increment_bucket(txn, &key)
    /// })?;
    /// ```
    pub fn transaction_with_retry<F, T>(&self, config: &RetryConfig, mut f: F) -> HueResult<T>
    where
        F: FnMut(&mut TransactionContext) -> HueResult<T>,
    {
        let mut attempt = 0;
        loop {
            let mut txn = self.begin_transaction();
            let result = f(&mut txn);

            match self.run_single_attempt(&mut txn, result) {
                Ok((value, _)) => return Ok(value),
                Err(e) if e.is_transient() && attempt < config.max_retries => {
                    let delay = config.calculate_delay(attempt);
                    debug!(
                        target: "huebucket::txn",
                        attempt = attempt + 1,
                        delay_us = delay.as_micros() as u64,
                        error = %e,
                        "Retrying transaction"
                    );
                    self.coordinator.record_retry();
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) if e.is_transient() => {
                    return Err(HueError::RetryExhausted {
                        attempts: attempt + 1,
                        last: Box::new(e),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// [`transaction_with_retry`](Self::transaction_with_retry) using this
    /// database's configured retry policy
    pub fn transaction_with_default_retry<F, T>(&self, f: F) -> HueResult<T>
    where
        F: FnMut(&mut TransactionContext) -> HueResult<T>,
    {
        self.transaction_with_retry(&self.retry, f)
    }

    /// Begin a new transaction (for manual control)
    ///
    /// Returns a TransactionContext that must be committed with
    /// `commit_transaction()` or dropped. Prefer the closure APIs.
    ///
    /// # Example
    /// ```text
    /// let mut txn = db.begin_transaction();
    /// txn.put(key, document)?;
    /// db.commit_transaction(&mut txn)?;
    /// ```
    pub fn begin_transaction(&self) -> TransactionContext {
        self.coordinator.start_transaction(&self.storage)
    }

    /// Commit a transaction
    ///
    /// # Returns
    /// * `Ok(commit_version)` - Transaction committed successfully
    ///
    /// # Errors
    /// - `Conflict` - Read-write conflict detected, transaction aborted
    /// - `Unavailable` - Store could not be reached, transaction aborted
    /// - `TransactionNotActive` - Transaction not in Active state
    pub fn commit_transaction(&self, txn: &mut TransactionContext) -> HueResult<u64> {
        self.coordinator.commit(txn, self.storage.as_ref())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("version", &self.current_version())
            .field("collections", &self.storage.collection_count())
            .field("retry", &self.retry)
            .finish()
    }
}
