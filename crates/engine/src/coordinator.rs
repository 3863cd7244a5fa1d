//! Transaction coordinator for managing transaction lifecycle
//!
//! The TransactionCoordinator wraps TransactionManager and adds:
//! - Active transaction tracking
//! - Transaction metrics (started, committed, aborted, retried)
//! - Commit rate calculation

use huebucket_concurrency::{FaultInjector, TransactionContext, TransactionManager};
use huebucket_core::{HueError, HueResult, SnapshotView, Storage};
use huebucket_storage::ShardedStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Transaction coordinator for the database
///
/// Manages transaction lifecycle, ID allocation, version tracking, and metrics.
///
/// # Memory Ordering
///
/// The metric counters use Relaxed ordering: they are observational only
/// and do not synchronize any other memory operations.
pub struct TransactionCoordinator {
    /// Transaction manager for ID/version allocation and commit
    manager: TransactionManager,
    active_count: AtomicU64,
    total_started: AtomicU64,
    total_committed: AtomicU64,
    total_aborted: AtomicU64,
    total_retried: AtomicU64,
}

impl TransactionCoordinator {
    /// Create new coordinator with initial version
    pub fn new(initial_version: u64) -> Self {
        Self::with_manager(TransactionManager::new(initial_version))
    }

    /// Create a coordinator whose commits consult a fault injector
    pub fn with_fault_injector(initial_version: u64, faults: Arc<FaultInjector>) -> Self {
        Self::with_manager(TransactionManager::new(initial_version).with_fault_injector(faults))
    }

    fn with_manager(manager: TransactionManager) -> Self {
        Self {
            manager,
            active_count: AtomicU64::new(0),
            total_started: AtomicU64::new(0),
            total_committed: AtomicU64::new(0),
            total_aborted: AtomicU64::new(0),
            total_retried: AtomicU64::new(0),
        }
    }

    /// Start a new transaction over a fresh snapshot of `storage`
    pub fn start_transaction(&self, storage: &Arc<ShardedStore>) -> TransactionContext {
        let txn_id = self.manager.next_txn_id();
        let snapshot = storage.create_snapshot();
        self.record_start();

        debug!(target: "huebucket::txn", txn_id, snapshot_version = snapshot.version(), "Transaction started");

        TransactionContext::with_snapshot(txn_id, Box::new(snapshot))
    }

    /// Commit a transaction through the concurrency layer
    ///
    /// Records commit/abort metrics and converts `CommitError` into `HueError`.
    ///
    /// # Returns
    /// * `Ok(commit_version)` - Transaction committed successfully
    /// * `Err(HueError)` - Conflict, unavailability, or invalid state
    pub fn commit<S: Storage + ?Sized>(
        &self,
        txn: &mut TransactionContext,
        store: &S,
    ) -> HueResult<u64> {
        match self.manager.commit(txn, store) {
            Ok(version) => {
                self.record_commit();
                Ok(version)
            }
            Err(e) => {
                self.record_abort();
                debug!(target: "huebucket::txn", txn_id = txn.txn_id, error = %e, "Transaction aborted");
                Err(HueError::from(e))
            }
        }
    }

    /// Record transaction start
    pub fn record_start(&self) {
        self.active_count.fetch_add(1, Ordering::Relaxed);
        self.total_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Record transaction commit
    ///
    /// Decrements active count (saturating at 0) and increments committed count.
    pub fn record_commit(&self) {
        self.decrement_active();
        self.total_committed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record transaction abort
    pub fn record_abort(&self) {
        self.decrement_active();
        self.total_aborted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record that a failed attempt is being retried
    pub fn record_retry(&self) {
        self.total_retried.fetch_add(1, Ordering::Relaxed);
    }

    fn decrement_active(&self) {
        // Use fetch_update for saturating decrement to prevent underflow
        let _ = self
            .active_count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |x| {
                Some(x.saturating_sub(1))
            });
    }

    /// Get current global version
    pub fn current_version(&self) -> u64 {
        self.manager.current_version()
    }

    /// The fault injector attached to the manager, if any
    pub fn fault_injector(&self) -> Option<&Arc<FaultInjector>> {
        self.manager.fault_injector()
    }

    /// Get transaction metrics
    pub fn metrics(&self) -> TransactionMetrics {
        let started = self.total_started.load(Ordering::Relaxed);
        let committed = self.total_committed.load(Ordering::Relaxed);

        TransactionMetrics {
            active_count: self.active_count.load(Ordering::Relaxed),
            total_started: started,
            total_committed: committed,
            total_aborted: self.total_aborted.load(Ordering::Relaxed),
            total_retried: self.total_retried.load(Ordering::Relaxed),
            commit_rate: if started > 0 {
                committed as f64 / started as f64
            } else {
                0.0
            },
        }
    }

    /// Get current active transaction count
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }
}

/// Snapshot of transaction statistics
#[derive(Debug, Clone, Default)]
pub struct TransactionMetrics {
    /// Transactions begun but not yet committed or aborted
    pub active_count: u64,
    /// Total transactions started
    pub total_started: u64,
    /// Total transactions committed
    pub total_committed: u64,
    /// Total transactions aborted (conflicts, faults, closure errors)
    pub total_aborted: u64,
    /// Total attempts retried after a transient failure
    pub total_retried: u64,
    /// committed / started
    pub commit_rate: f64,
}
