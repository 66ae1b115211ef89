//! Engine bootstrap
//!
//! Opening the store and warming up run under a bounded retry: a transient
//! store failure waits `startup_retry_delay` and tries again, a fatal one
//! (corrupt log) stops at once. After warm-up the most recently active
//! documents are validated and their findings logged.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::AuthorityConfig;
use crate::consistency::Anomaly;
use crate::observability::Event;
use crate::store::{FailureClass, FileRevisionStore, StoreError, StoreResult};
use crate::transaction::TransactionPolicy;

use super::engine::AuthorityEngine;
use super::errors::{AuthorityError, AuthorityResult};

/// Startup settings, usually taken from `AuthorityConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartupOptions {
    pub attempts: u32,
    pub retry_delay: Duration,
    /// Rebuild every document's chain before serving.
    pub eager_rebuild: bool,
    /// How many of the most recently active documents to validate.
    pub consistency_documents: usize,
}

impl Default for StartupOptions {
    fn default() -> Self {
        Self {
            attempts: 5,
            retry_delay: Duration::from_secs(2),
            eager_rebuild: false,
            consistency_documents: 5,
        }
    }
}

impl From<&AuthorityConfig> for StartupOptions {
    fn from(config: &AuthorityConfig) -> Self {
        Self {
            attempts: config.startup_attempts.max(1),
            retry_delay: config.startup_retry_delay(),
            eager_rebuild: config.eager_rebuild,
            consistency_documents: config.startup_consistency_documents,
        }
    }
}

/// Findings of one document validated at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentFindings {
    pub document_id: String,
    pub anomalies: Vec<Anomaly>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartupReport {
    /// Attempts the warm-up needed, including the successful one.
    pub attempts: u32,
    pub documents: usize,
    pub rebuilt: usize,
    pub validated: Vec<DocumentFindings>,
}

impl StartupReport {
    pub fn anomaly_count(&self) -> usize {
        self.validated.iter().map(|d| d.anomalies.len()).sum()
    }
}

impl AuthorityEngine {
    /// Opens the file store under `config.data_dir` and builds an engine
    /// on it.
    pub fn from_config(config: &AuthorityConfig) -> AuthorityResult<Self> {
        let options = StartupOptions::from(config);
        let (store, _) = with_retry(&options, "open_store", || {
            FileRevisionStore::open(&config.data_dir, config.max_transaction_bytes)
        })?;
        Ok(Self::new(Arc::new(store), TransactionPolicy::from(config)))
    }

    /// Warms the engine up and validates recently active documents.
    ///
    /// Validation findings are reported, never fatal.
    pub fn initialize(&self, options: &StartupOptions) -> AuthorityResult<StartupReport> {
        info!(
            event = Event::StartupBegin.as_str(),
            attempts = options.attempts,
            eager_rebuild = options.eager_rebuild,
            "engine startup"
        );

        let ((documents, rebuilt), attempts) = with_retry(options, "warm_up", || self.warm_up(options.eager_rebuild))?;

        let mut validated = Vec::new();
        for document_id in documents.iter().take(options.consistency_documents) {
            let anomalies = self.validate_consistency(document_id)?;
            validated.push(DocumentFindings {
                document_id: document_id.clone(),
                anomalies,
            });
        }

        let report = StartupReport {
            attempts,
            documents: documents.len(),
            rebuilt,
            validated,
        };
        info!(
            event = Event::StartupComplete.as_str(),
            attempts,
            documents = report.documents,
            rebuilt,
            validated = report.validated.len(),
            anomalies = report.anomaly_count(),
            "engine ready"
        );
        Ok(report)
    }

    fn warm_up(&self, eager_rebuild: bool) -> StoreResult<(Vec<String>, usize)> {
        let documents = self.store().document_ids()?;
        let mut rebuilt = 0;
        if eager_rebuild {
            for document_id in &documents {
                self.cache()
                    .get(document_id, true, || self.store().find_by_document(document_id))?;
                rebuilt += 1;
            }
        }
        Ok((documents, rebuilt))
    }
}

/// Runs `step` until it succeeds, fails fatally, or attempts run out.
/// Returns the value and the attempts used.
fn with_retry<T, F>(options: &StartupOptions, stage: &str, mut step: F) -> AuthorityResult<(T, u32)>
where
    F: FnMut() -> StoreResult<T>,
{
    let attempts = options.attempts.max(1);
    let mut attempt = 1;
    loop {
        let err: StoreError = match step() {
            Ok(value) => return Ok((value, attempt)),
            Err(err) => err,
        };

        if err.class() == FailureClass::Fatal || attempt >= attempts {
            error!(
                event = Event::StartupFailed.as_str(),
                stage,
                attempt,
                code = err.code(),
                error = %err,
                "startup failed"
            );
            return Err(AuthorityError::StartupFailed { attempts: attempt, last: err });
        }

        warn!(
            event = Event::StartupAttemptFailed.as_str(),
            stage,
            attempt,
            max_attempts = attempts,
            error = %err,
            "startup attempt failed, retrying"
        );
        thread::sleep(options.retry_delay);
        attempt += 1;
    }
}
