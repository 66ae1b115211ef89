//! # Store Errors

use thiserror::Error;

use crate::model::DocumentRef;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// How the transaction layer treats a store failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Propagated immediately, never retried.
    Fatal,
    /// A unique constraint rejected the write; retrying cannot succeed.
    Constraint,
    /// May succeed on another attempt.
    Retryable,
}

/// Durable store errors
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Duplicate key: {0}")]
    DuplicateKey(DocumentRef),

    #[error("Not found: {0}")]
    NotFound(DocumentRef),

    #[error("Write conflict on {key}: expected version {expected}, found {found}")]
    WriteConflict {
        key: DocumentRef,
        expected: u64,
        found: u64,
    },

    #[error("Transaction attempt exceeded its deadline of {0} ms")]
    Timeout(u64),

    #[error("Transaction too large: {size} bytes (limit: {limit})")]
    TransactionTooLarge { size: usize, limit: usize },

    #[error("No active transaction")]
    NoActiveTransaction,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Revision log append failed at offset {offset}: {reason}")]
    LogAppend { offset: u64, reason: String },

    #[error("Data directory is locked by another store instance: {path}")]
    LockHeld { path: String, holder: Option<u32> },

    #[error("Revision log corrupted at offset {offset}: {reason}")]
    Corruption { offset: u64, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::DuplicateKey(_) => "DUPLICATE_KEY",
            StoreError::NotFound(_) => "NOT_FOUND",
            StoreError::WriteConflict { .. } => "WRITE_CONFLICT",
            StoreError::Timeout(_) => "TIMEOUT",
            StoreError::TransactionTooLarge { .. } => "TRANSACTION_TOO_LARGE",
            StoreError::NoActiveTransaction => "NO_ACTIVE_TRANSACTION",
            StoreError::Io(_) => "IO_ERROR",
            StoreError::LogAppend { .. } => "LOG_APPEND_FAILED",
            StoreError::LockHeld { .. } => "STORE_LOCKED",
            StoreError::Corruption { .. } => "CORRUPTION",
            StoreError::Serialization(_) => "SERIALIZATION_ERROR",
            StoreError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn class(&self) -> FailureClass {
        match self {
            StoreError::TransactionTooLarge { .. } | StoreError::LogAppend { .. } | StoreError::Corruption { .. } => {
                FailureClass::Fatal
            }
            StoreError::DuplicateKey(_) => FailureClass::Constraint,
            _ => FailureClass::Retryable,
        }
    }

    pub(crate) fn io(context: &str, err: std::io::Error) -> Self {
        StoreError::Io(format!("{}: {}", context, err))
    }

    pub(crate) fn poisoned() -> Self {
        StoreError::Internal("store lock poisoned".into())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
