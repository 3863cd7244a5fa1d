//! Transaction validation for OCC
//!
//! Key rules:
//! - First-committer-wins based on the READ-SET, not the write-set
//! - Blind writes (write without read) do NOT conflict
//! - A key read as absent (version 0) conflicts if it now exists
//!
//! Validation must run while the commit locks for every read and written key
//! are held; otherwise a concurrent commit could slip in between validation
//! and apply.

use crate::transaction::TransactionContext;
use huebucket_core::{DocKey, HueResult, Storage};
use std::collections::HashMap;

/// Types of conflicts that can occur during transaction validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictType {
    /// Key was read at one version but the current version differs
    ReadWriteConflict {
        /// The key that has a conflict
        key: DocKey,
        /// Version recorded in read_set when read
        read_version: u64,
        /// Current version in storage at validation time
        current_version: u64,
    },

    /// Conflict forced by a [`FaultInjector`](crate::FaultInjector)
    Injected {
        /// Key the transaction would have written, if any
        key: Option<DocKey>,
    },
}

impl ConflictType {
    /// Key involved in the conflict, if any
    pub fn key(&self) -> Option<&DocKey> {
        match self {
            ConflictType::ReadWriteConflict { key, .. } => Some(key),
            ConflictType::Injected { key } => key.as_ref(),
        }
    }
}

/// Result of transaction validation
///
/// A transaction commits only if is_valid() returns true.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    /// All conflicts detected during validation
    pub conflicts: Vec<ConflictType>,
}

impl ValidationResult {
    /// Create a successful validation result (no conflicts)
    pub fn ok() -> Self {
        ValidationResult {
            conflicts: Vec::new(),
        }
    }

    /// Create a validation result with a single conflict
    pub fn conflict(conflict: ConflictType) -> Self {
        ValidationResult {
            conflicts: vec![conflict],
        }
    }

    /// Check if validation passed (no conflicts)
    pub fn is_valid(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Merge another validation result into this one
    pub fn merge(&mut self, other: ValidationResult) {
        self.conflicts.extend(other.conflicts);
    }

    /// Get the number of conflicts
    pub fn conflict_count(&self) -> usize {
        self.conflicts.len()
    }

    /// Key of the first conflict
    pub fn first_key(&self) -> Option<&DocKey> {
        self.conflicts.iter().find_map(ConflictType::key)
    }

    /// One-line summary for errors and logs
    pub fn describe(&self) -> String {
        match self.conflicts.first() {
            None => "no conflicts".to_string(),
            Some(ConflictType::ReadWriteConflict {
                read_version,
                current_version,
                ..
            }) => format!(
                "read version {} is now {} ({} conflict(s))",
                read_version,
                current_version,
                self.conflict_count()
            ),
            Some(ConflictType::Injected { .. }) => "injected conflict".to_string(),
        }
    }
}

/// Validate the read-set against current storage state
///
/// For each key in read_set, check that the current version still matches
/// the version read (0 = absent).
///
/// # Errors
/// Propagates storage failures; a commit must not proceed on a failed check.
pub fn validate_read_set<S: Storage + ?Sized>(
    read_set: &HashMap<DocKey, u64>,
    store: &S,
) -> HueResult<ValidationResult> {
    let mut result = ValidationResult::ok();

    for (key, read_version) in read_set {
        let current_version = store.get(key)?.map(|v| v.version).unwrap_or(0);

        if current_version != *read_version {
            result.conflicts.push(ConflictType::ReadWriteConflict {
                key: key.clone(),
                read_version: *read_version,
                current_version,
            });
        }
    }

    Ok(result)
}

/// Validate a whole transaction
///
/// # Errors
/// Propagates storage failures.
pub fn validate_transaction<S: Storage + ?Sized>(
    txn: &TransactionContext,
    store: &S,
) -> HueResult<ValidationResult> {
    validate_read_set(&txn.read_set, store)
}
