//! Bounded-retry transaction runner
//!
//! Each attempt runs in its own session:
//!
//! 1. start session and transaction
//! 2. stage writes through the caller's body
//! 3. check the attempt deadline
//! 4. commit
//!
//! Any failure aborts the transaction; the session guard releases the
//! session on every path. Fatal and constraint failures return at once,
//! everything else is retried until the attempt budget is spent.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{error, warn};

use crate::config::AuthorityConfig;
use crate::observability::{AuthorityMetrics, Event};
use crate::store::{FailureClass, RevisionStore, SessionGuard, StoreError, StoreResult, StoreSession};

use super::errors::{TransactionError, TransactionResult};

/// Retry and deadline settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionPolicy {
    /// Attempts including the first; at least 1.
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    /// Pause before the first retry, doubled for each later one.
    pub backoff: Duration,
}

impl Default for TransactionPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(5),
            backoff: Duration::from_millis(25),
        }
    }
}

impl From<&AuthorityConfig> for TransactionPolicy {
    fn from(config: &AuthorityConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            attempt_timeout: config.attempt_timeout(),
            backoff: config.retry_backoff(),
        }
    }
}

#[derive(Debug)]
pub struct TransactionManager {
    store: Arc<dyn RevisionStore>,
    policy: TransactionPolicy,
    metrics: Arc<AuthorityMetrics>,
}

impl TransactionManager {
    pub fn new(store: Arc<dyn RevisionStore>, policy: TransactionPolicy, metrics: Arc<AuthorityMetrics>) -> Self {
        Self { store, policy, metrics }
    }

    pub fn policy(&self) -> TransactionPolicy {
        self.policy
    }

    /// Runs `body` inside a transaction, retrying retryable failures.
    ///
    /// `body` may run several times and must stage the same writes each
    /// time; it should re-read whatever it bases them on.
    pub fn run<T, F>(&self, operation: &str, mut body: F) -> TransactionResult<T>
    where
        F: FnMut(&mut dyn StoreSession) -> StoreResult<T>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            self.metrics.increment_transaction_attempts();
            let err = match self.attempt(&mut body) {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            match err.class() {
                FailureClass::Fatal => {
                    self.metrics.increment_transaction_failures();
                    error!(
                        event = Event::TransactionFatal.as_str(),
                        operation,
                        attempt,
                        error = %err,
                        "transaction failed fatally"
                    );
                    return Err(TransactionError::Fatal(err));
                }
                FailureClass::Constraint => return Err(TransactionError::Constraint(err)),
                FailureClass::Retryable if attempt >= max_attempts => {
                    self.metrics.increment_transaction_failures();
                    error!(
                        event = Event::TransactionFailed.as_str(),
                        operation,
                        attempts = attempt,
                        error = %err,
                        "transaction retries exhausted"
                    );
                    return Err(TransactionError::WriteFailed {
                        attempts: attempt,
                        last: err,
                    });
                }
                FailureClass::Retryable => {
                    self.metrics.increment_transaction_retries();
                    warn!(
                        event = Event::TransactionRetry.as_str(),
                        operation,
                        attempt,
                        max_attempts,
                        error = %err,
                        "transaction attempt failed, retrying"
                    );
                    thread::sleep(self.backoff_for(attempt));
                    attempt += 1;
                }
            }
        }
    }

    fn attempt<T, F>(&self, body: &mut F) -> StoreResult<T>
    where
        F: FnMut(&mut dyn StoreSession) -> StoreResult<T>,
    {
        let deadline = Instant::now() + self.policy.attempt_timeout;
        let mut session = SessionGuard::new(self.store.start_session()?);

        let outcome = self.stage_and_commit(&mut *session, body, deadline);
        if outcome.is_err() {
            // The attempt's own error is what the caller sees.
            let _ = session.abort_transaction();
        }
        outcome
    }

    fn stage_and_commit<T, F>(&self, session: &mut dyn StoreSession, body: &mut F, deadline: Instant) -> StoreResult<T>
    where
        F: FnMut(&mut dyn StoreSession) -> StoreResult<T>,
    {
        session.start_transaction()?;
        let value = body(&mut *session)?;
        if Instant::now() > deadline {
            return Err(StoreError::Timeout(self.policy.attempt_timeout.as_millis() as u64));
        }
        session.commit_transaction()?;
        Ok(value)
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        self.policy.backoff.saturating_mul(1 << (attempt - 1).min(10))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DocumentRef;
    use crate::store::{AuditAction, AuditEntry, InMemoryRevisionStore};

    fn manager(store: Arc<InMemoryRevisionStore>, policy: TransactionPolicy) -> TransactionManager {
        TransactionManager::new(store, policy, Arc::new(AuthorityMetrics::new()))
    }

    fn fast_policy() -> TransactionPolicy {
        TransactionPolicy {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(5),
            backoff: Duration::ZERO,
        }
    }

    fn audit(session: &mut dyn StoreSession) -> StoreResult<()> {
        session.append_audit(AuditEntry::new(
            &DocumentRef::new("DOC", "1.0"),
            AuditAction::StatusChanged,
            "t",
            "",
        ))
    }

    #[test]
    fn test_retries_then_succeeds() {
        let store = Arc::new(InMemoryRevisionStore::new());
        store.fail_next_commits([StoreError::Io("a".into()), StoreError::Io("b".into())]);
        let tx = manager(store.clone(), fast_policy());

        tx.run("test", audit).unwrap();
        assert_eq!(store.audit_entries("DOC").unwrap().len(), 1);
        assert_eq!(store.sessions_opened(), 3);
        assert_eq!(store.open_sessions(), 0);
    }

    #[test]
    fn test_exhausted_retries() {
        let store = Arc::new(InMemoryRevisionStore::new());
        store.fail_next_commits((0..3).map(|i| StoreError::Io(i.to_string())));
        let tx = manager(store.clone(), fast_policy());

        let err = tx.run("test", audit).unwrap_err();
        assert!(matches!(err, TransactionError::WriteFailed { attempts: 3, .. }));
        assert!(store.audit_entries("DOC").unwrap().is_empty());
        assert_eq!(store.open_sessions(), 0);
    }

    #[test]
    fn test_fatal_not_retried() {
        let store = Arc::new(InMemoryRevisionStore::new());
        store.fail_next_commits([StoreError::TransactionTooLarge { size: 9, limit: 1 }]);
        let tx = manager(store.clone(), fast_policy());

        assert!(matches!(tx.run("test", audit), Err(TransactionError::Fatal(_))));
        assert_eq!(store.sessions_opened(), 1);
        assert_eq!(store.open_sessions(), 0);
    }

    #[test]
    fn test_body_error_aborts_and_retries() {
        let store = Arc::new(InMemoryRevisionStore::new());
        let tx = manager(store.clone(), fast_policy());
        let mut calls = 0;

        let result = tx.run("test", |session| {
            calls += 1;
            audit(session)?;
            if calls < 2 {
                return Err(StoreError::Io("flaky".into()));
            }
            Ok(calls)
        });

        assert_eq!(result.unwrap(), 2);
        assert_eq!(store.audit_entries("DOC").unwrap().len(), 1);
    }

    #[test]
    fn test_deadline_exceeded_is_retryable() {
        let store = Arc::new(InMemoryRevisionStore::new());
        store.set_write_latency(Some(Duration::from_millis(30)));
        let policy = TransactionPolicy {
            max_attempts: 2,
            attempt_timeout: Duration::from_millis(5),
            backoff: Duration::ZERO,
        };
        let tx = manager(store.clone(), policy);

        let err = tx.run("test", audit).unwrap_err();
        assert!(matches!(
            err,
            TransactionError::WriteFailed {
                attempts: 2,
                last: StoreError::Timeout(5)
            }
        ));
        assert_eq!(store.commits(), 0);
        assert_eq!(store.open_sessions(), 0);
    }
}
