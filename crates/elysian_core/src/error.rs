//! Error types for ElysianDB core.

use crate::schema::ValidationError;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in ElysianDB core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Key/value store error.
    #[error("store error: {0}")]
    Store(#[from] elysian_store::StoreError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An entity or field name cannot be used as a key segment.
    #[error("invalid {kind} name {name:?}: {reason}")]
    InvalidName {
        /// What the name is for (`entity` or `field`).
        kind: &'static str,
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The schema validator rejected a document.
    #[error("validation failed with {} error(s)", .errors.len())]
    Validation {
        /// Per-field diagnostics, forwarded unchanged.
        errors: Vec<ValidationError>,
    },

    /// No open transaction has this id.
    #[error("transaction not found: {id}")]
    TransactionNotFound {
        /// The transaction id.
        id: String,
    },

    /// An update targeted a document that does not exist.
    #[error("update failed: {entity}/{id} not found")]
    UpdateFailed {
        /// Entity type.
        entity: String,
        /// Document id.
        id: String,
    },

    /// A query could not be interpreted.
    #[error("invalid query: {message}")]
    InvalidQuery {
        /// Description of the problem.
        message: String,
    },

    /// Operation not permitted in its current form.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// Configuration is unusable.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the problem.
        message: String,
    },

    /// The engine has been shut down.
    #[error("engine is closed")]
    EngineClosed,
}

impl CoreError {
    /// Creates an invalid query error.
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CoreError::InvalidName {
            kind: "entity",
            name: "a:b".into(),
            reason: "contains ':'",
        };
        assert_eq!(err.to_string(), "invalid entity name \"a:b\": contains ':'");

        let err = CoreError::Validation {
            errors: vec![ValidationError::new("title", "required")],
        };
        assert_eq!(err.to_string(), "validation failed with 1 error(s)");

        let err = CoreError::config("workers must be at least 1");
        assert!(err.to_string().contains("workers"));
    }

    #[test]
    fn store_error_converts() {
        let store = elysian_store::StoreError::corrupted("bad bucket");
        let err: CoreError = store.into();
        assert!(matches!(err, CoreError::Store(_)));
    }
}
