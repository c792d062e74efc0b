//! Domain-level errors.
//!
//! Raised while building domain values (passwords, identities) before
//! anything reaches a persistence backend.

use thiserror::Error;

/// Rule violations detected inside the domain layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A field failed a domain rule
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// Password rejected before hashing
    #[error("password {0}")]
    WeakPassword(String),

    /// The hasher itself failed
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

impl DomainError {
    pub fn invalid_field(field: &'static str, reason: impl Into<String>) -> Self {
        DomainError::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

/// Result type alias for domain operations
pub type DomainResult<T> = Result<T, DomainError>;
