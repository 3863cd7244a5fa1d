//! Concurrent tests for huebucket-concurrency
//!
//! These tests run real threads against one TransactionManager to exercise:
//!
//! 1. **Lost-update prevention** - read-modify-write on one key under contention
//! 2. **Version monotonicity** - every successful commit gets a distinct version
//! 3. **Disjoint keys** - transactions on different keys never conflict
//! 4. **Lock cleanup** - no lock entry outlives its commits

use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

use huebucket_concurrency::{CommitError, TransactionContext, TransactionManager};
use huebucket_core::{CollectionName, DocKey, Document, Storage, Value, COUNT_FIELD};
use huebucket_storage::ShardedStore;

// ============================================================================
// Test Helpers
// ============================================================================

fn key(id: &str) -> DocKey {
    DocKey::new(CollectionName::new("bucket-counts").unwrap(), id)
}

fn begin(manager: &TransactionManager, store: &Arc<ShardedStore>) -> TransactionContext {
    TransactionContext::with_snapshot(manager.next_txn_id(), Box::new(store.create_snapshot()))
}

/// Read-modify-write `count + 1`, retrying on conflict until it commits.
///
/// Returns the commit version and the number of conflicts seen.
fn increment_until_committed(
    manager: &TransactionManager,
    store: &Arc<ShardedStore>,
    id: &str,
) -> (u64, usize) {
    let mut conflicts = 0;
    loop {
        let mut txn = begin(manager, store);
        let current = txn
            .get(&key(id))
            .unwrap()
            .and_then(|doc| doc.get(COUNT_FIELD).and_then(Value::as_int))
            .unwrap_or(0);
        txn.put(
            key(id),
            Document::from_fields([(COUNT_FIELD, Value::Int(current + 1))]),
        )
        .unwrap();

        match manager.commit(&mut txn, store.as_ref()) {
            Ok(version) => return (version, conflicts),
            Err(CommitError::ValidationFailed(_)) => {
                conflicts += 1;
                thread::yield_now();
            }
            Err(other) => panic!("unexpected commit error: {:?}", other),
        }
    }
}

fn stored_count(store: &ShardedStore, id: &str) -> i64 {
    store
        .get(&key(id))
        .unwrap()
        .and_then(|v| v.document.get(COUNT_FIELD).and_then(Value::as_int))
        .unwrap_or(0)
}

// ============================================================================
// Contention
// ============================================================================

#[test]
fn test_no_lost_updates_on_one_key() {
    const THREADS: usize = 16;
    const PER_THREAD: usize = 25;

    let store = Arc::new(ShardedStore::new());
    let manager = Arc::new(TransactionManager::new(0));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let store = Arc::clone(&store);
            let manager = Arc::clone(&manager);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (0..PER_THREAD)
                    .map(|_| increment_until_committed(&manager, &store, "5").0)
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut versions = HashSet::new();
    for handle in handles {
        for version in handle.join().unwrap() {
            assert!(versions.insert(version), "version {} reused", version);
        }
    }

    assert_eq!(stored_count(&store, "5"), (THREADS * PER_THREAD) as i64);
    assert_eq!(versions.len(), THREADS * PER_THREAD);
    assert_eq!(manager.current_version(), (THREADS * PER_THREAD) as u64);
    assert_eq!(store.current_version(), manager.current_version());
    assert_eq!(manager.lock_count(), 0);
}

#[test]
fn test_disjoint_keys_never_conflict() {
    const THREADS: usize = 8;

    let store = Arc::new(ShardedStore::new());
    let manager = Arc::new(TransactionManager::new(0));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let store = Arc::clone(&store);
            let manager = Arc::clone(&manager);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let id = t.to_string();
                (0..20)
                    .map(|_| increment_until_committed(&manager, &store, &id).1)
                    .sum::<usize>()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 0);
    }
    for t in 0..THREADS {
        assert_eq!(stored_count(&store, &t.to_string()), 20);
    }
    assert_eq!(manager.lock_count(), 0);
}
