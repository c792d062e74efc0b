//! Unified error handling for both persistence backends.
//!
//! Relational and document-store failures are normalized into one error type
//! so callers above the repository boundary cannot tell which backend is active.

use domain::DomainError;
use thiserror::Error;

/// MongoDB server code for a unique index violation.
#[cfg(feature = "document")]
const DUPLICATE_KEY: i32 = 11000;

/// Application error types.
#[derive(Error, Debug)]
pub enum AppError {
    // Resource errors
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    Conflict(String),

    // Validation
    #[error("{0}")]
    Validation(String),

    // Backend errors, tagged with the operation that produced them
    #[cfg(feature = "database")]
    #[error("{op} failed: {source}")]
    Database {
        op: &'static str,
        #[source]
        source: sea_orm::DbErr,
    },

    #[cfg(feature = "document")]
    #[error("{op} failed: {source}")]
    Document {
        op: &'static str,
        #[source]
        source: mongodb::error::Error,
    },

    // Transaction lifecycle
    #[error("failed to begin transaction: {0}")]
    TransactionBegin(#[source] Box<AppError>),

    #[error("failed to commit transaction: {0}")]
    TransactionCommit(#[source] Box<AppError>),

    #[error("tx failed: {original}, unable to rollback: {rollback}")]
    RollbackFailed {
        original: Box<AppError>,
        rollback: Box<AppError>,
    },

    #[error("operation cancelled")]
    Cancelled,

    // Connectivity
    #[error("{0} is unavailable")]
    Unavailable(String),

    // Internal
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get error code for client
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Validation(_) => "VALIDATION_ERROR",
            #[cfg(feature = "database")]
            AppError::Database { .. } => "DATABASE_ERROR",
            #[cfg(feature = "document")]
            AppError::Document { .. } => "DATABASE_ERROR",
            AppError::TransactionBegin(_)
            | AppError::TransactionCommit(_)
            | AppError::RollbackFailed { .. } => "TRANSACTION_ERROR",
            AppError::Cancelled => "CANCELLED",
            AppError::Unavailable(_) => "SERVICE_UNAVAILABLE",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// True for the normalized not-found kind, whichever backend produced it
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }

    /// True for a unique-constraint violation
    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::Conflict(_))
    }

    /// Error that started a failed transaction, looking through rollback wrapping
    pub fn root(&self) -> &AppError {
        match self {
            AppError::RollbackFailed { original, .. } => original.root(),
            other => other,
        }
    }
}

// =============================================================================
// Backend Error Conversion
// =============================================================================

#[cfg(feature = "database")]
impl AppError {
    /// Map a sea-orm error raised by `op`, surfacing constraint violations.
    ///
    /// Intended for `map_err(AppError::db("create user"))`.
    pub fn db(op: &'static str) -> impl FnOnce(sea_orm::DbErr) -> AppError {
        move |source| match source.sql_err() {
            Some(sea_orm::SqlErr::UniqueConstraintViolation(detail)) => {
                AppError::Conflict(format!("{op}: {detail}"))
            }
            Some(sea_orm::SqlErr::ForeignKeyConstraintViolation(detail)) => {
                AppError::Validation(format!("{op}: referenced record does not exist ({detail})"))
            }
            _ => AppError::Database { op, source },
        }
    }
}

#[cfg(feature = "document")]
impl AppError {
    /// Map a MongoDB driver error raised by `op`, surfacing duplicate keys.
    pub fn document(op: &'static str) -> impl FnOnce(mongodb::error::Error) -> AppError {
        move |source| {
            if is_duplicate_key(&source) {
                AppError::Conflict(format!("{op}: {source}"))
            } else {
                AppError::Document { op, source }
            }
        }
    }
}

#[cfg(feature = "document")]
fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};

    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        ErrorKind::InsertMany(e) => e
            .write_errors
            .as_ref()
            .is_some_and(|errors| errors.iter().any(|w| w.code == DUPLICATE_KEY)),
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

/// Turn an affected/matched count into the shared not-found kind.
///
/// Both adapters route update results through here: a relational update that
/// touched zero rows and a document update that matched zero documents end up
/// as the same error.
pub fn ensure_found(affected: u64, entity: &str) -> AppResult<()> {
    if affected == 0 {
        Err(AppError::not_found(entity))
    } else {
        Ok(())
    }
}

// =============================================================================
// Domain Error Conversion
// =============================================================================

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidField { .. } | DomainError::WeakPassword(_) => {
                AppError::Validation(err.to_string())
            }
            DomainError::Hashing(msg) => AppError::Internal(msg),
        }
    }
}

/// Result type alias
pub type AppResult<T> = Result<T, AppError>;

/// Extension trait for Option -> AppError conversion
pub trait OptionExt<T> {
    fn ok_or_not_found(self, entity: &str) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, entity: &str) -> AppResult<T> {
        self.ok_or_else(|| AppError::not_found(entity))
    }
}

/// Convenience constructors
impl AppError {
    pub fn not_found(entity: impl Into<String>) -> Self {
        AppError::NotFound(entity.into())
    }

    pub fn conflict(entity: impl Into<String>) -> Self {
        AppError::Conflict(entity.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }

    pub fn unavailable(service: impl Into<String>) -> Self {
        AppError::Unavailable(service.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_found_zero_is_not_found() {
        let err = ensure_found(0, "user").unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "user not found");
        assert!(ensure_found(1, "user").is_ok());
    }

    #[test]
    fn test_rollback_failure_names_both_errors() {
        let err = AppError::RollbackFailed {
            original: Box::new(AppError::validation("invalid role id")),
            rollback: Box::new(AppError::internal("connection reset")),
        };

        let message = err.to_string();
        assert!(message.contains("invalid role id"));
        assert!(message.contains("connection reset"));
        assert!(matches!(err.root(), AppError::Validation(_)));
        assert_eq!(err.code(), "TRANSACTION_ERROR");
    }

    #[test]
    fn test_domain_errors_map_onto_app_errors() {
        let err: AppError = DomainError::WeakPassword("too short".to_string()).into();
        assert!(matches!(err, AppError::Validation(msg) if msg == "password too short"));

        let err: AppError = DomainError::invalid_field("email", "missing @").into();
        assert_eq!(err.to_string(), "invalid email: missing @");

        let err: AppError = DomainError::Hashing("rng failure".to_string()).into();
        assert_eq!(err.code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_option_ext() {
        let missing: Option<u8> = None;
        assert!(missing.ok_or_not_found("permission").unwrap_err().is_not_found());
        assert_eq!(Some(3).ok_or_not_found("permission").unwrap(), 3);
    }

    #[cfg(feature = "database")]
    #[test]
    fn test_db_mapping_keeps_operation_context() {
        let err = AppError::db("update role")(sea_orm::DbErr::Custom("boom".to_string()));
        assert!(matches!(err, AppError::Database { op: "update role", .. }));
        assert!(err.to_string().starts_with("update role failed"));
    }
}
