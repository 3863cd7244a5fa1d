//! huebucket - transactional hue bucket aggregation
//!
//! Reacts to created result documents under `/results/{userId}/userResults/{docId}`,
//! extracts their `threshold_hue`, and keeps one counter document per distinct hue
//! in the `bucket-counts` collection.
//!
//! # Quick Start
//!
//! ```ignore
//! use huebucket::{Database, DocumentCreatedEvent, HueBucketConfig, HueBucketHandler};
//!
//! let db = Database::ephemeral();
//! let handler = HueBucketHandler::new(db, &HueBucketConfig::default())?;
//!
//! let event = DocumentCreatedEvent::from_slice(payload)?;
//! let outcome = handler.handle(&event);
//! ```
//!
//! # Architecture
//!
//! Everything goes through the engine crate. The lower layers (core types,
//! sharded storage, optimistic concurrency) are re-exported for callers that
//! need to build keys or inspect stored documents.

pub use huebucket_engine::*;

pub use huebucket_core::{
    BucketKey, CollectionName, DocKey, Document, Hue, HueError, HueResult, ResultPath,
    ValidationError, Value, VersionedDocument,
};
