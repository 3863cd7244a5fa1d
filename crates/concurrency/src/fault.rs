//! Commit-time fault injection
//!
//! Simulates the failures a hosted document store produces under load:
//! write conflicts and transient unavailability. The [`TransactionManager`]
//! consults an attached injector at the start of every commit, before any
//! lock is taken or any write applied, so an injected fault never leaves a
//! partial effect behind.
//!
//! # Example
//!
//! ```ignore
//! use huebucket_concurrency::FaultInjector;
//!
//! // First two commits conflict, then every fourth commit conflicts.
//! let faults = FaultInjector::new()
//!     .fail_next_with_conflict(2)
//!     .conflict_every(4);
//! ```
//!
//! [`TransactionManager`]: crate::TransactionManager

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Fault chosen for one commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFault {
    /// Report a write conflict
    Conflict,
    /// Report the store as unreachable
    Unavailable,
}

/// Deterministic fault schedule shared by all commits of a manager
#[derive(Debug, Default)]
pub struct FaultInjector {
    conflicts_remaining: AtomicUsize,
    unavailable_remaining: AtomicUsize,
    conflict_every: AtomicU64,
    commits_seen: AtomicU64,
    injected: AtomicU64,
}

impl FaultInjector {
    /// Create an injector that injects nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` commits fail with a conflict
    pub fn fail_next_with_conflict(self, n: usize) -> Self {
        self.conflicts_remaining.store(n, Ordering::SeqCst);
        self
    }

    /// Make the next `n` commits fail as unavailable
    ///
    /// Unavailability is consumed before scheduled conflicts.
    pub fn fail_next_with_unavailable(self, n: usize) -> Self {
        self.unavailable_remaining.store(n, Ordering::SeqCst);
        self
    }

    /// Make every `n`th commit conflict (0 disables)
    pub fn conflict_every(self, n: u64) -> Self {
        self.conflict_every.store(n, Ordering::SeqCst);
        self
    }

    /// Decide the fault, if any, for the next commit
    pub fn next_fault(&self) -> Option<InjectedFault> {
        let seen = self.commits_seen.fetch_add(1, Ordering::SeqCst) + 1;

        let fault = if take_one(&self.unavailable_remaining) {
            Some(InjectedFault::Unavailable)
        } else if take_one(&self.conflicts_remaining) {
            Some(InjectedFault::Conflict)
        } else {
            match self.conflict_every.load(Ordering::SeqCst) {
                0 => None,
                n if seen % n == 0 => Some(InjectedFault::Conflict),
                _ => None,
            }
        };

        if fault.is_some() {
            self.injected.fetch_add(1, Ordering::SeqCst);
        }
        fault
    }

    /// Total faults injected so far
    pub fn injected_count(&self) -> u64 {
        self.injected.load(Ordering::SeqCst)
    }

    /// Total commits that consulted this injector
    pub fn commits_seen(&self) -> u64 {
        self.commits_seen.load(Ordering::SeqCst)
    }
}

// Decrement a counter if positive; true if a unit was taken
fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}
