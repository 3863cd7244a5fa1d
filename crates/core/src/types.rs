//! Core types for huebucket
//!
//! This module defines the foundational addressing types:
//! - CollectionName: Validated top-level collection identifier
//! - DocKey: Composite key (collection + document id)
//! - ResultPath: Parsed `results/{userId}/userResults/{docId}` trigger path

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{HueError, HueResult, ValidationError};

/// Top-level collection of the results tree
pub const RESULTS_COLLECTION: &str = "results";

/// Per-user subcollection holding result documents
pub const USER_RESULTS_SUBCOLLECTION: &str = "userResults";

/// Name of a document collection
///
/// Collection names are non-empty and contain no `/`, so a
/// `collection/id` rendering of a [`DocKey`] is unambiguous.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CollectionName(String);

impl CollectionName {
    /// Validate and wrap a collection name
    ///
    /// # Errors
    /// Returns `InvalidInput` if the name is empty or contains `/`.
    pub fn new(name: impl Into<String>) -> HueResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(HueError::invalid_input("collection name must not be empty"));
        }
        if name.contains('/') {
            return Err(HueError::invalid_input(format!(
                "collection name '{}' must not contain '/'",
                name
            )));
        }
        Ok(Self(name))
    }

    /// Borrow the name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Address of one document: collection plus document id
///
/// Ordering is collection first, then id. Commit locks are taken in this order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocKey {
    /// Collection the document lives in
    pub collection: CollectionName,
    /// Document id within the collection
    pub id: String,
}

impl DocKey {
    /// Create a key
    pub fn new(collection: CollectionName, id: impl Into<String>) -> Self {
        Self {
            collection,
            id: id.into(),
        }
    }
}

impl fmt::Display for DocKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// Location of a created result document
///
/// Parsed from `results/{userId}/userResults/{docId}`, with or without a
/// leading `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResultPath {
    /// Owning user
    pub user_id: String,
    /// Result document id
    pub doc_id: String,
}

impl ResultPath {
    /// Create a path from its two identifiers
    pub fn new(user_id: impl Into<String>, doc_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            doc_id: doc_id.into(),
        }
    }

    /// Parse a trigger document path
    ///
    /// # Errors
    /// Returns `ValidationError::UnexpectedPath` for anything that does not match
    /// `results/{userId}/userResults/{docId}` with non-empty identifiers.
    pub fn parse(path: &str) -> Result<Self, ValidationError> {
        let trimmed = path.strip_prefix('/').unwrap_or(path);
        let segments: Vec<&str> = trimmed.split('/').collect();

        match segments.as_slice() {
            [RESULTS_COLLECTION, user_id, USER_RESULTS_SUBCOLLECTION, doc_id]
                if !user_id.is_empty() && !doc_id.is_empty() =>
            {
                Ok(Self::new(*user_id, *doc_id))
            }
            _ => Err(ValidationError::UnexpectedPath(path.to_string())),
        }
    }

    /// Canonical path without leading slash
    ///
    /// Unique per result document; used as the processed-marker id.
    pub fn document_path(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            RESULTS_COLLECTION, self.user_id, USER_RESULTS_SUBCOLLECTION, self.doc_id
        )
    }
}

impl fmt::Display for ResultPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.document_path())
    }
}
