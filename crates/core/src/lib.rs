//! Core types and traits for huebucket
//!
//! This crate defines the foundational types used throughout the system:
//! - Value: Field value enum for document contents
//! - Document / VersionedDocument: Field maps as stored and read
//! - CollectionName / DocKey: Document addressing
//! - ResultPath: Parsed trigger path of a created result document
//! - Hue / BucketKey: Validated aggregation key and its canonical bucket id
//! - Error: ValidationError and HueError taxonomy
//! - Traits: Storage and SnapshotView

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod document;
pub mod error;
pub mod hue;
pub mod traits;
pub mod types;
pub mod value;

pub use document::{Document, VersionedDocument, COUNT_FIELD};
pub use error::{HueError, HueResult, ValidationError};
pub use hue::{extract_hue, BucketKey, Hue, HUE_FIELD};
pub use traits::{SnapshotView, Storage};
pub use types::{
    CollectionName, DocKey, ResultPath, RESULTS_COLLECTION, USER_RESULTS_SUBCOLLECTION,
};
pub use value::Value;
