//! Concurrency layer for huebucket
//!
//! This crate implements optimistic concurrency control (OCC) with:
//! - TransactionContext: Read/write set tracking over a snapshot
//! - Conflict detection at commit time (first-committer-wins)
//! - TransactionManager: per-key commit locks and version allocation
//! - FaultInjector: scripted conflicts and outages for testing retries

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod fault;
pub mod manager;
pub mod transaction;
pub mod validation;

pub use fault::{FaultInjector, InjectedFault};
pub use manager::TransactionManager;
pub use transaction::{CommitError, TransactionContext, TransactionStatus};
pub use validation::{validate_read_set, validate_transaction, ConflictType, ValidationResult};
