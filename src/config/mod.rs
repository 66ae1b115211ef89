//! Engine configuration
//!
//! Loaded from a JSON file. Every field except `data_dir` has a default:
//!
//! ```json
//! {
//!   "data_dir": "/var/lib/revauth",
//!   "max_retries": 3,
//!   "attempt_timeout_ms": 5000,
//!   "logging": { "level": "info", "format": "json" }
//! }
//! ```

mod errors;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use errors::{ConfigError, ConfigResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityConfig {
    /// Root of the file store
    pub data_dir: PathBuf,

    /// Transaction attempts per write, including the first
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Deadline of a single transaction attempt
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,

    /// Pause between transaction attempts, doubled per retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Largest encoded transaction the store accepts
    #[serde(default = "default_max_transaction_bytes")]
    pub max_transaction_bytes: usize,

    /// Rebuild every document's chain during startup
    #[serde(default)]
    pub eager_rebuild: bool,

    #[serde(default = "default_startup_attempts")]
    pub startup_attempts: u32,

    #[serde(default = "default_startup_retry_delay_ms")]
    pub startup_retry_delay_ms: u64,

    /// How many of the most recently active documents startup validates
    #[serde(default = "default_startup_consistency_documents")]
    pub startup_consistency_documents: usize,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_max_retries() -> u32 {
    3
}
fn default_attempt_timeout_ms() -> u64 {
    5000
}
fn default_retry_backoff_ms() -> u64 {
    25
}
fn default_max_transaction_bytes() -> usize {
    16 * 1024 * 1024
}
fn default_startup_attempts() -> u32 {
    5
}
fn default_startup_retry_delay_ms() -> u64 {
    2000
}
fn default_startup_consistency_documents() -> usize {
    5
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. "info" or "revauth=debug"
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl AuthorityConfig {
    /// Configuration with every default and the given data directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            max_retries: default_max_retries(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_transaction_bytes: default_max_transaction_bytes(),
            eager_rebuild: false,
            startup_attempts: default_startup_attempts(),
            startup_retry_delay_ms: default_startup_retry_delay_ms(),
            startup_consistency_documents: default_startup_consistency_documents(),
            logging: LoggingConfig::default(),
        }
    }

    /// Loads and validates a configuration file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: AuthorityConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::invalid("data_dir must not be empty"));
        }
        if self.max_retries == 0 {
            return Err(ConfigError::invalid("max_retries must be >= 1"));
        }
        if self.attempt_timeout_ms == 0 {
            return Err(ConfigError::invalid("attempt_timeout_ms must be > 0"));
        }
        if self.max_transaction_bytes == 0 {
            return Err(ConfigError::invalid("max_transaction_bytes must be > 0"));
        }
        if self.startup_attempts == 0 {
            return Err(ConfigError::invalid("startup_attempts must be >= 1"));
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::invalid("logging.level must not be empty"));
        }
        Ok(())
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn startup_retry_delay(&self) -> Duration {
        Duration::from_millis(self.startup_retry_delay_ms)
    }
}
