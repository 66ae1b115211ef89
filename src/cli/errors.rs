//! CLI-specific error types
//!
//! Every CLI error ends the process with a non-zero exit after an error
//! response has been written.

use std::io;

use thiserror::Error;

use crate::authority::AuthorityError;
use crate::config::ConfigError;
use crate::model::ModelError;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Authority(#[from] AuthorityError),

    #[error("Invalid input: {0}")]
    Input(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    pub fn code(&self) -> &'static str {
        match self {
            CliError::Config(e) => e.code(),
            CliError::Authority(e) => e.code(),
            CliError::Input(_) => "INVALID_INPUT",
            CliError::Io(_) => "IO_ERROR",
            CliError::Json(_) => "INVALID_JSON",
        }
    }

    pub(crate) fn input(message: impl Into<String>) -> Self {
        CliError::Input(message.into())
    }
}

impl From<ModelError> for CliError {
    fn from(e: ModelError) -> Self {
        CliError::Authority(AuthorityError::from(e))
    }
}
