//! In-memory revision store
//!
//! Same commit semantics as the file store without persistence. Carries
//! fault injection hooks for exercising the transaction layer: queued
//! commit failures, write latency, and session open/close counters.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock, RwLockReadGuard};
use std::time::Duration;

use crate::model::{DocumentRef, RevisionNode};

use super::audit::AuditEntry;
use super::backend::{BatchCommitter, RevisionStore, StagedSession, StoreSession};
use super::errors::{StoreError, StoreResult};
use super::record::CommitRecord;
use super::state::StoreState;

/// Default batch size limit, matching the configuration default.
pub const DEFAULT_MAX_BATCH_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug)]
pub struct InMemoryRevisionStore {
    state: RwLock<StoreState>,
    max_batch_bytes: usize,
    injected_failures: Mutex<VecDeque<StoreError>>,
    write_latency: Mutex<Option<Duration>>,
    sessions_opened: AtomicU64,
    sessions_closed: AtomicU64,
    commits: AtomicU64,
}

impl Default for InMemoryRevisionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRevisionStore {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_BATCH_BYTES)
    }

    pub fn with_limit(max_batch_bytes: usize) -> Self {
        Self {
            state: RwLock::new(StoreState::new()),
            max_batch_bytes,
            injected_failures: Mutex::new(VecDeque::new()),
            write_latency: Mutex::new(None),
            sessions_opened: AtomicU64::new(0),
            sessions_closed: AtomicU64::new(0),
            commits: AtomicU64::new(0),
        }
    }

    /// The next commits fail with these errors, one per commit, without
    /// applying anything.
    pub fn fail_next_commits(&self, errors: impl IntoIterator<Item = StoreError>) {
        if let Ok(mut queue) = self.injected_failures.lock() {
            queue.extend(errors);
        }
    }

    /// Sleeps this long on every staged write.
    pub fn set_write_latency(&self, latency: Option<Duration>) {
        if let Ok(mut current) = self.write_latency.lock() {
            *current = latency;
        }
    }

    pub fn sessions_opened(&self) -> u64 {
        self.sessions_opened.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> u64 {
        self.sessions_closed.load(Ordering::SeqCst)
    }

    /// Sessions started and not yet ended.
    pub fn open_sessions(&self) -> u64 {
        self.sessions_opened() - self.sessions_closed()
    }

    /// Successful commits.
    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, StoreState>> {
        self.state.read().map_err(|_| StoreError::poisoned())
    }
}

impl BatchCommitter for InMemoryRevisionStore {
    fn commit_batch(&self, record: CommitRecord, _body: Vec<u8>) -> StoreResult<()> {
        let injected = self
            .injected_failures
            .lock()
            .map_err(|_| StoreError::poisoned())?
            .pop_front();
        if let Some(err) = injected {
            return Err(err);
        }

        self.state
            .write()
            .map_err(|_| StoreError::poisoned())?
            .apply_batch(record.writes)?;
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn on_stage(&self) -> StoreResult<()> {
        let latency = *self.write_latency.lock().map_err(|_| StoreError::poisoned())?;
        if let Some(latency) = latency {
            std::thread::sleep(latency);
        }
        Ok(())
    }

    fn on_session_end(&self) {
        self.sessions_closed.fetch_add(1, Ordering::SeqCst);
    }
}

impl RevisionStore for InMemoryRevisionStore {
    fn find_revision(&self, document_id: &str, revision: &str) -> StoreResult<Option<RevisionNode>> {
        Ok(self.read()?.find_revision(document_id, revision))
    }

    fn find_by_document(&self, document_id: &str) -> StoreResult<Vec<RevisionNode>> {
        Ok(self.read()?.find_by_document(document_id))
    }

    fn document_ids(&self) -> StoreResult<Vec<String>> {
        Ok(self.read()?.document_ids())
    }

    fn part_references(&self, part_number: &str) -> StoreResult<Vec<DocumentRef>> {
        Ok(self.read()?.part_references(part_number))
    }

    fn audit_entries(&self, document_id: &str) -> StoreResult<Vec<AuditEntry>> {
        Ok(self.read()?.audit_entries(document_id))
    }

    fn start_session(&self) -> StoreResult<Box<dyn StoreSession + '_>> {
        self.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StagedSession::new(self, self.max_batch_bytes)))
    }
}
