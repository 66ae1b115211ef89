//! # Model Errors
//!
//! Raised at the ingestion boundary when submitted data cannot be coerced
//! into the structured model.

use thiserror::Error;

/// Result type for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// Model validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("Part at index {index} has no part_number")]
    MissingPartNumber { index: usize },

    #[error("Duplicate part_number in snapshot: {0}")]
    DuplicatePart(String),

    #[error("Invalid part at index {index}: {reason}")]
    InvalidPart { index: usize, reason: String },

    #[error("Invalid submission: {0}")]
    InvalidSubmission(String),
}

impl ModelError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            ModelError::MissingPartNumber { .. } => "MISSING_PART_NUMBER",
            ModelError::DuplicatePart(_) => "DUPLICATE_PART",
            ModelError::InvalidPart { .. } => "INVALID_PART",
            ModelError::InvalidSubmission(_) => "INVALID_SUBMISSION",
        }
    }

    pub(crate) fn invalid_part(index: usize, reason: impl Into<String>) -> Self {
        ModelError::InvalidPart {
            index,
            reason: reason.into(),
        }
    }
}
