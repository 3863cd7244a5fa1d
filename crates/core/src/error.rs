//! Error types for huebucket
//!
//! This module defines the error taxonomy used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! ## Taxonomy
//!
//! - [`ValidationError`]: the created document cannot be aggregated. Logged and
//!   dropped, never retried.
//! - Transient [`HueError`]s (`Conflict`, `Unavailable`): retried with backoff.
//! - Fatal [`HueError`]s (everything else, including `RetryExhausted`): logged
//!   with full context, never re-raised to the trigger.

use thiserror::Error;

/// Result type alias for huebucket operations
pub type HueResult<T> = std::result::Result<T, HueError>;

/// Reasons a created document is rejected before any store access
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The hue field is absent from the document
    #[error("field '{field}' is missing")]
    MissingField {
        /// Name of the missing field
        field: String,
    },

    /// The hue field holds a value that is neither an integer nor a float
    #[error("field '{field}' has non-numeric type {type_name}: {rendered}")]
    NotNumeric {
        /// Name of the offending field
        field: String,
        /// Type name of the value found
        type_name: &'static str,
        /// Debug rendering of the value, for the log line
        rendered: String,
    },

    /// The hue field is a float but not a finite one
    #[error("field '{field}' is not a finite number")]
    NonFinite {
        /// Name of the offending field
        field: String,
    },

    /// The event targets a document outside `results/{userId}/userResults/{docId}`
    #[error("unexpected document path '{0}'")]
    UnexpectedPath(String),

    /// The event payload could not be decoded
    #[error("malformed event: {0}")]
    MalformedEvent(String),
}

/// Error type for store, transaction and configuration failures
#[derive(Debug, Error)]
pub enum HueError {
    /// The input document failed validation
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Commit-time conflict: a key read by the transaction changed underneath it
    #[error("transaction conflict on {key}: {reason}")]
    Conflict {
        /// Key that conflicted
        key: String,
        /// Human-readable reason
        reason: String,
    },

    /// The store could not be reached for this attempt
    #[error("store unavailable: {message}")]
    Unavailable {
        /// Error detail
        message: String,
    },

    /// Every attempt in the retry budget failed with a transient error
    #[error("gave up after {attempts} attempt(s): {last}")]
    RetryExhausted {
        /// Number of attempts made
        attempts: usize,
        /// The error returned by the final attempt
        last: Box<HueError>,
    },

    /// Transaction used after it left the Active state
    #[error("transaction not active (state: {state})")]
    TransactionNotActive {
        /// Observed state
        state: String,
    },

    /// Stored data does not have the expected shape
    #[error("data corruption: {message}")]
    Corruption {
        /// Error detail
        message: String,
    },

    /// Unrecoverable store failure
    #[error("storage error: {message}")]
    Storage {
        /// Error detail
        message: String,
    },

    /// Caller supplied an invalid argument or configuration
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Error detail
        message: String,
    },

    /// Internal invariant violated
    #[error("internal error: {message}")]
    Internal {
        /// Error detail
        message: String,
    },
}

impl HueError {
    /// Create a conflict error
    pub fn conflict(key: impl Into<String>, reason: impl Into<String>) -> Self {
        HueError::Conflict {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create an unavailable error
    pub fn unavailable(message: impl Into<String>) -> Self {
        HueError::Unavailable {
            message: message.into(),
        }
    }

    /// Create a corruption error
    pub fn corruption(message: impl Into<String>) -> Self {
        HueError::Corruption {
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        HueError::Storage {
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        HueError::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        HueError::Internal {
            message: message.into(),
        }
    }

    /// True for commit-time conflicts
    pub fn is_conflict(&self) -> bool {
        matches!(self, HueError::Conflict { .. })
    }

    /// True for errors worth another attempt: conflicts and unavailability
    pub fn is_transient(&self) -> bool {
        matches!(self, HueError::Conflict { .. } | HueError::Unavailable { .. })
    }

    /// True for input rejections
    pub fn is_validation(&self) -> bool {
        matches!(self, HueError::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::NotNumeric {
            field: "threshold_hue".to_string(),
            type_name: "String",
            rendered: "\"red\"".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("threshold_hue"));
        assert!(msg.contains("String"));
        assert!(msg.contains("red"));
    }

    #[test]
    fn test_missing_field_display() {
        let err = ValidationError::MissingField {
            field: "threshold_hue".to_string(),
        };
        assert_eq!(err.to_string(), "field 'threshold_hue' is missing");
    }

    #[test]
    fn test_conflict_is_transient() {
        let err = HueError::conflict("bucket-counts/5", "read version changed");
        assert!(err.is_conflict());
        assert!(err.is_transient());
        assert!(err.to_string().contains("bucket-counts/5"));
    }

    #[test]
    fn test_unavailable_is_transient_not_conflict() {
        let err = HueError::unavailable("connection reset");
        assert!(err.is_transient());
        assert!(!err.is_conflict());
    }

    #[test]
    fn test_fatal_errors_are_not_transient() {
        assert!(!HueError::corruption("bad count").is_transient());
        assert!(!HueError::storage("disk gone").is_transient());
        assert!(!HueError::internal("bug").is_transient());
        assert!(!HueError::invalid_input("bad").is_transient());
    }

    #[test]
    fn test_retry_exhausted_wraps_last_error() {
        let err = HueError::RetryExhausted {
            attempts: 5,
            last: Box::new(HueError::conflict("bucket-counts/7", "stale read")),
        };
        assert!(!err.is_transient());
        let msg = err.to_string();
        assert!(msg.contains("5 attempt"));
        assert!(msg.contains("bucket-counts/7"));
    }

    #[test]
    fn test_from_validation_error() {
        let err: HueError = ValidationError::UnexpectedPath("users/x".to_string()).into();
        assert!(err.is_validation());
        assert!(!err.is_transient());
    }
}
