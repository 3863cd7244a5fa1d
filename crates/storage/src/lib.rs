//! Storage layer for huebucket
//!
//! This crate implements the reference document store:
//! - ShardedStore: DashMap of per-collection shards, FxHashMap within
//! - Version chains for MVCC reads
//! - ShardedSnapshot: O(1) version-bounded snapshot views
//!
//! The store knows nothing about transactions; conflict detection lives in
//! `huebucket-concurrency`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod sharded;

pub use sharded::{Shard, ShardedSnapshot, ShardedStore, VersionChain, MAX_VERSIONS_PER_KEY};
