//! # Transaction Errors

use thiserror::Error;

use crate::store::StoreError;

pub type TransactionResult<T> = Result<T, TransactionError>;

#[derive(Debug, Clone, Error)]
pub enum TransactionError {
    /// Not retried: size limit or corruption.
    #[error("Fatal transaction failure: {0}")]
    Fatal(#[source] StoreError),

    /// A unique constraint rejected the write.
    #[error("Constraint violation: {0}")]
    Constraint(#[source] StoreError),

    /// Every attempt failed with a retryable error.
    #[error("Write failed after {attempts} attempts: {last}")]
    WriteFailed {
        attempts: u32,
        #[source]
        last: StoreError,
    },
}

impl TransactionError {
    pub fn code(&self) -> &'static str {
        match self {
            TransactionError::Fatal(_) => "TRANSACTION_FATAL",
            TransactionError::Constraint(_) => "CONSTRAINT_VIOLATION",
            TransactionError::WriteFailed { .. } => "WRITE_FAILED",
        }
    }

    /// The store error behind this failure.
    pub fn store_error(&self) -> &StoreError {
        match self {
            TransactionError::Fatal(e) | TransactionError::Constraint(e) => e,
            TransactionError::WriteFailed { last, .. } => last,
        }
    }
}
