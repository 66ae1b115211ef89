//! # Authority Errors
//!
//! Errors surfaced by the orchestrator. A duplicate registration is not an
//! error (see `Registration::AlreadyExists`) and anomalies are data.

use thiserror::Error;

use crate::model::{ModelError, RevisionStatus};
use crate::store::StoreError;
use crate::transaction::TransactionError;

pub type AuthorityResult<T> = Result<T, AuthorityError>;

#[derive(Debug, Clone, Error)]
pub enum AuthorityError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid submission: {0}")]
    Ingest(#[from] ModelError),

    #[error("Invalid status transition for {document_id} rev.{revision}: {from} -> {to} ({reason})")]
    InvalidTransition {
        document_id: String,
        revision: String,
        from: RevisionStatus,
        to: RevisionStatus,
        reason: String,
    },

    #[error("Fatal transaction failure: {0}")]
    TransactionFatal(#[source] StoreError),

    #[error("Write failed after {attempts} attempts: {last}")]
    WriteFailed {
        attempts: u32,
        #[source]
        last: StoreError,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Startup failed after {attempts} attempts: {last}")]
    StartupFailed {
        attempts: u32,
        #[source]
        last: StoreError,
    },
}

impl AuthorityError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthorityError::NotFound(_) => "NOT_FOUND",
            AuthorityError::Ingest(e) => e.code(),
            AuthorityError::InvalidTransition { .. } => "INVALID_TRANSITION",
            AuthorityError::TransactionFatal(_) => "TRANSACTION_FATAL",
            AuthorityError::WriteFailed { .. } => "WRITE_FAILED",
            AuthorityError::Store(e) => e.code(),
            AuthorityError::StartupFailed { .. } => "STARTUP_FAILED",
        }
    }

    /// HTTP-style status for API layers.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthorityError::NotFound(_) => 404,
            AuthorityError::Ingest(_) => 400,
            AuthorityError::InvalidTransition { .. } => 409,
            AuthorityError::TransactionFatal(StoreError::TransactionTooLarge { .. }) => 413,
            AuthorityError::TransactionFatal(_) => 500,
            AuthorityError::WriteFailed { .. } => 503,
            AuthorityError::Store(_) => 500,
            AuthorityError::StartupFailed { .. } => 503,
        }
    }

    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        AuthorityError::NotFound(what.into())
    }
}

impl From<TransactionError> for AuthorityError {
    fn from(err: TransactionError) -> Self {
        match err {
            TransactionError::Fatal(e) => AuthorityError::TransactionFatal(e),
            TransactionError::WriteFailed { attempts, last } => AuthorityError::WriteFailed { attempts, last },
            TransactionError::Constraint(e) => AuthorityError::Store(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AuthorityError::not_found("x").status_code(), 404);
        assert_eq!(
            AuthorityError::from(TransactionError::Fatal(StoreError::TransactionTooLarge { size: 2, limit: 1 }))
                .status_code(),
            413
        );
        let err = AuthorityError::from(TransactionError::WriteFailed {
            attempts: 3,
            last: StoreError::Timeout(5),
        });
        assert_eq!(err.code(), "WRITE_FAILED");
        assert_eq!(err.status_code(), 503);
    }

    #[test]
    fn test_ingest_code_passthrough() {
        let err = AuthorityError::from(ModelError::DuplicatePart("A".into()));
        assert_eq!(err.code(), "DUPLICATE_PART");
        assert_eq!(err.status_code(), 400);
    }
}
