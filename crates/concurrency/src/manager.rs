//! Transaction manager for coordinating commit operations
//!
//! Provides atomic commit by orchestrating:
//! 1. Fault injection (when a [`FaultInjector`] is attached)
//! 2. Per-key commit locks (sorted order, no deadlock)
//! 3. Validation (first-committer-wins)
//! 4. Storage application (visibility)
//!
//! ## Commit Sequence
//!
//! ```text
//! 1. mark_validating()      - Active -> Validating
//! 2. consult fault injector - may fail with Conflict or Unavailable
//! 3. lock read_set ∪ write_set keys in DocKey order
//! 4. validate_transaction() - IF conflicts: abort and return error
//! 5. take apply_order, allocate commit_version
//! 6. store.apply_batch()    - every write lands with commit_version
//! 7. release apply_order and key locks, drop idle lock entries
//! 8. mark_committed()       - Validating -> Committed
//! 9. Return Ok(commit_version)
//! ```
//!
//! Versions reach storage in the order they were allocated, so the store's
//! published version never runs ahead of a batch that is still landing. The
//! apply-order lock is only ever taken while key locks are held, never the
//! other way round.
//!
//! A key's lock entry lives only while some commit holds or waits on it.
//!
//! Transactions touching disjoint keys never wait on each other. Two
//! transactions that read and then write the same bucket serialize on that
//! bucket's lock; the second one fails validation and is retried by the
//! caller against a fresh snapshot.

use crate::fault::{FaultInjector, InjectedFault};
use crate::validation::{validate_transaction, ConflictType, ValidationResult};
use crate::{CommitError, TransactionContext};
use dashmap::DashMap;
use huebucket_core::{DocKey, Storage};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Manages transaction lifecycle and atomic commits
///
/// The global version counter is incremented once per writing transaction;
/// all keys in a transaction get the same commit version.
pub struct TransactionManager {
    /// Global version counter
    ///
    /// Monotonically increasing. Each committed write transaction increments by 1.
    version: AtomicU64,

    /// Next transaction ID
    next_txn_id: AtomicU64,

    /// One mutex per key with a commit in flight
    commit_locks: DashMap<DocKey, Arc<Mutex<()>>>,

    /// Serializes version allocation with storage application
    apply_order: Mutex<()>,

    faults: Option<Arc<FaultInjector>>,
}

impl TransactionManager {
    /// Create a new transaction manager
    ///
    /// # Arguments
    /// * `initial_version` - Starting version (the store's current version)
    pub fn new(initial_version: u64) -> Self {
        TransactionManager {
            version: AtomicU64::new(initial_version),
            next_txn_id: AtomicU64::new(1),
            commit_locks: DashMap::new(),
            apply_order: Mutex::new(()),
            faults: None,
        }
    }

    /// Attach a fault injector consulted at the start of every commit
    pub fn with_fault_injector(mut self, faults: Arc<FaultInjector>) -> Self {
        self.faults = Some(faults);
        self
    }

    /// The attached fault injector, if any
    pub fn fault_injector(&self) -> Option<&Arc<FaultInjector>> {
        self.faults.as_ref()
    }

    /// Get current global version
    pub fn current_version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Allocate next transaction ID
    pub fn next_txn_id(&self) -> u64 {
        self.next_txn_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Allocate next commit version (increment global version)
    pub fn allocate_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Number of keys with a commit in flight
    pub fn lock_count(&self) -> usize {
        self.commit_locks.len()
    }

    /// Commit a transaction atomically
    ///
    /// # Arguments
    /// * `txn` - Transaction to commit (must be in Active state)
    /// * `store` - Storage to validate against and apply writes to
    ///
    /// # Returns
    /// - Ok(commit_version) on success; read-only transactions return
    ///   their start version
    /// - Err(CommitError) on conflict, injected fault, storage failure,
    ///   or if the transaction is not active. On error the transaction
    ///   is left Aborted and nothing was written.
    pub fn commit<S: Storage + ?Sized>(
        &self,
        txn: &mut TransactionContext,
        store: &S,
    ) -> Result<u64, CommitError> {
        txn.mark_validating()?;

        if let Some(fault) = self.faults.as_ref().and_then(|f| f.next_fault()) {
            return Err(self.fail_injected(txn, fault));
        }

        if txn.is_read_only() {
            txn.mark_committed()?;
            return Ok(txn.start_version);
        }

        let keys: BTreeSet<DocKey> = txn
            .read_set
            .keys()
            .chain(txn.write_set.keys())
            .cloned()
            .collect();
        let result = self.commit_locked(txn, store, &keys);
        self.release_locks(&keys);
        let commit_version = result?;

        txn.mark_committed()?;
        debug!(
            target: "huebucket::txn",
            txn_id = txn.txn_id,
            commit_version,
            writes = txn.pending_writes(),
            "Transaction committed"
        );
        Ok(commit_version)
    }

    /// Validate and apply with every key in `keys` locked
    ///
    /// All guards are dropped before this returns.
    fn commit_locked<S: Storage + ?Sized>(
        &self,
        txn: &mut TransactionContext,
        store: &S,
        keys: &BTreeSet<DocKey>,
    ) -> Result<u64, CommitError> {
        let locks: Vec<Arc<Mutex<()>>> = keys
            .iter()
            .map(|key| self.commit_locks.entry(key.clone()).or_default().clone())
            .collect();
        let _guards: Vec<_> = locks.iter().map(|lock| lock.lock()).collect();

        let validation = match validate_transaction(txn, store) {
            Ok(validation) => validation,
            Err(e) => return Err(abort_unavailable(txn, e.to_string())),
        };
        if !validation.is_valid() {
            debug!(
                target: "huebucket::txn",
                txn_id = txn.txn_id,
                conflicts = validation.conflict_count(),
                "Commit rejected: {}",
                validation.describe()
            );
            let _ = txn.mark_aborted(validation.describe());
            return Err(CommitError::ValidationFailed(validation));
        }

        let writes: Vec<_> = txn
            .write_set
            .iter()
            .map(|(key, document)| (key.clone(), document.clone()))
            .collect();

        let _order = self.apply_order.lock();
        let commit_version = self.allocate_version();
        if let Err(e) = store.apply_batch(writes, commit_version) {
            warn!(
                target: "huebucket::txn",
                txn_id = txn.txn_id,
                commit_version,
                error = %e,
                "Storage rejected commit"
            );
            return Err(abort_unavailable(txn, e.to_string()));
        }
        Ok(commit_version)
    }

    /// Drop lock entries nobody else holds or waits on
    ///
    /// Clones are only taken inside `entry()`, which shares the shard lock
    /// with `remove_if`, so an entry cannot gain a holder while it is removed.
    fn release_locks(&self, keys: &BTreeSet<DocKey>) {
        for key in keys {
            self.commit_locks
                .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
        }
    }

    /// Explicitly abort a transaction
    ///
    /// All buffered writes are discarded.
    ///
    /// # Errors
    /// Returns `CommitError::InvalidState` if the transaction already finished.
    pub fn abort(
        &self,
        txn: &mut TransactionContext,
        reason: impl Into<String>,
    ) -> Result<(), CommitError> {
        txn.mark_aborted(reason)
    }

    fn fail_injected(&self, txn: &mut TransactionContext, fault: InjectedFault) -> CommitError {
        debug!(target: "huebucket::txn", txn_id = txn.txn_id, ?fault, "Injected commit fault");
        match fault {
            InjectedFault::Conflict => {
                let key = txn.write_set.keys().next().cloned();
                let _ = txn.mark_aborted("injected conflict");
                CommitError::ValidationFailed(ValidationResult::conflict(ConflictType::Injected {
                    key,
                }))
            }
            InjectedFault::Unavailable => {
                abort_unavailable(txn, "injected unavailability".to_string())
            }
        }
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new(0)
    }
}

fn abort_unavailable(txn: &mut TransactionContext, message: String) -> CommitError {
    let _ = txn.mark_aborted(message.clone());
    CommitError::Unavailable(message)
}
