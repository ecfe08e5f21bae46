//! Schema validation seam.
//!
//! Schema inference and enforcement live outside the core. The engine only
//! asks a [`SchemaValidator`] for diagnostics before a document is stored
//! and forwards whatever it gets back.

use elysian_store::Document;
use serde::{Deserialize, Serialize};

/// A per-field diagnostic produced by a schema validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl ValidationError {
    /// Creates a diagnostic for `field`.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Checks documents before they are written.
pub trait SchemaValidator: Send + Sync {
    /// Returns the problems found in `doc`; an empty list accepts it.
    fn validate(&self, entity: &str, doc: &Document) -> Vec<ValidationError>;
}

/// Validator that accepts every document.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl SchemaValidator for AcceptAll {
    fn validate(&self, _entity: &str, _doc: &Document) -> Vec<ValidationError> {
        Vec::new()
    }
}
