//! Store interfaces
//!
//! `RevisionStore` is the read side plus session factory. Writes go through
//! a `StoreSession`: stage inside a transaction, then commit or abort.
//! Sessions are scoped resources; `SessionGuard` ends them on every exit
//! path.

use std::fmt;
use std::ops::{Deref, DerefMut};

use chrono::Utc;

use crate::model::{DocumentRef, RevisionMetadata, RevisionNode};

use super::audit::AuditEntry;
use super::errors::{StoreError, StoreResult};
use super::record::CommitRecord;
use super::state::StagedWrite;

/// Durable revision storage.
pub trait RevisionStore: Send + Sync + fmt::Debug {
    fn find_revision(&self, document_id: &str, revision: &str) -> StoreResult<Option<RevisionNode>>;

    /// Every node of a document, oldest first.
    fn find_by_document(&self, document_id: &str) -> StoreResult<Vec<RevisionNode>>;

    /// Most recently created node of a document.
    fn find_latest(&self, document_id: &str) -> StoreResult<Option<RevisionNode>> {
        Ok(self.find_by_document(document_id)?.pop())
    }

    fn revision_exists(&self, document_id: &str, revision: &str) -> StoreResult<bool> {
        Ok(self.find_revision(document_id, revision)?.is_some())
    }

    /// Known documents, most recently active first.
    fn document_ids(&self) -> StoreResult<Vec<String>>;

    fn part_references(&self, part_number: &str) -> StoreResult<Vec<DocumentRef>>;

    /// Audit entries of a document in append order.
    fn audit_entries(&self, document_id: &str) -> StoreResult<Vec<AuditEntry>>;

    fn start_session(&self) -> StoreResult<Box<dyn StoreSession + '_>>;
}

/// A store session. Writes are only visible after `commit_transaction`.
pub trait StoreSession {
    fn start_transaction(&mut self) -> StoreResult<()>;

    /// Fails with `DuplicateKey` at commit if (document_id, revision) exists.
    fn insert_revision(&mut self, node: RevisionNode) -> StoreResult<()>;

    /// Sets the node's `next_revision` if unset and bumps its version.
    fn link_next(&mut self, key: &DocumentRef, expected_version: u64, next_revision: &str) -> StoreResult<()>;

    /// Replaces the node's metadata if its version is still `expected_version`.
    fn update_metadata(
        &mut self,
        key: &DocumentRef,
        expected_version: u64,
        metadata: RevisionMetadata,
    ) -> StoreResult<()>;

    fn index_parts(&mut self, key: &DocumentRef, part_numbers: Vec<String>) -> StoreResult<()>;

    fn append_audit(&mut self, entry: AuditEntry) -> StoreResult<()>;

    fn commit_transaction(&mut self) -> StoreResult<()>;

    /// Discards staged writes. A no-op without an active transaction.
    fn abort_transaction(&mut self) -> StoreResult<()>;

    /// Releases the session. Idempotent.
    fn end_session(&mut self);
}

/// Ends the wrapped session when dropped.
pub struct SessionGuard<'a> {
    session: Box<dyn StoreSession + 'a>,
}

impl<'a> SessionGuard<'a> {
    pub fn new(session: Box<dyn StoreSession + 'a>) -> Self {
        Self { session }
    }
}

impl<'a> Deref for SessionGuard<'a> {
    type Target = dyn StoreSession + 'a;

    fn deref(&self) -> &Self::Target {
        self.session.as_ref()
    }
}

impl<'a> DerefMut for SessionGuard<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session.as_mut()
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.session.end_session();
    }
}

/// Store side of a `StagedSession`.
pub(crate) trait BatchCommitter {
    /// Persists and applies one batch; `body` is its encoded record.
    fn commit_batch(&self, record: CommitRecord, body: Vec<u8>) -> StoreResult<()>;

    /// Called once per `StagedWrite` as it is staged.
    fn on_stage(&self) -> StoreResult<()> {
        Ok(())
    }

    fn on_session_end(&self) {}
}

/// Session that stages writes in memory and hands the batch to its store
/// at commit.
pub(crate) struct StagedSession<'a> {
    store: &'a dyn BatchCommitter,
    max_batch_bytes: usize,
    staged: Option<Vec<StagedWrite>>,
    ended: bool,
}

impl<'a> StagedSession<'a> {
    pub(crate) fn new(store: &'a dyn BatchCommitter, max_batch_bytes: usize) -> Self {
        Self {
            store,
            max_batch_bytes,
            staged: None,
            ended: false,
        }
    }

    fn stage(&mut self, write: StagedWrite) -> StoreResult<()> {
        self.store.on_stage()?;
        self.staged
            .as_mut()
            .ok_or(StoreError::NoActiveTransaction)?
            .push(write);
        Ok(())
    }
}

impl StoreSession for StagedSession<'_> {
    fn start_transaction(&mut self) -> StoreResult<()> {
        if self.ended {
            return Err(StoreError::Internal("session already ended".into()));
        }
        self.staged = Some(Vec::new());
        Ok(())
    }

    fn insert_revision(&mut self, node: RevisionNode) -> StoreResult<()> {
        self.stage(StagedWrite::InsertRevision(node))
    }

    fn link_next(&mut self, key: &DocumentRef, expected_version: u64, next_revision: &str) -> StoreResult<()> {
        self.stage(StagedWrite::LinkNext {
            key: key.clone(),
            expected_version,
            next_revision: next_revision.to_string(),
            at: Utc::now(),
        })
    }

    fn update_metadata(
        &mut self,
        key: &DocumentRef,
        expected_version: u64,
        metadata: RevisionMetadata,
    ) -> StoreResult<()> {
        self.stage(StagedWrite::UpdateMetadata {
            key: key.clone(),
            expected_version,
            metadata,
            at: Utc::now(),
        })
    }

    fn index_parts(&mut self, key: &DocumentRef, part_numbers: Vec<String>) -> StoreResult<()> {
        self.stage(StagedWrite::IndexParts {
            key: key.clone(),
            part_numbers,
        })
    }

    fn append_audit(&mut self, entry: AuditEntry) -> StoreResult<()> {
        self.stage(StagedWrite::AppendAudit(entry))
    }

    fn commit_transaction(&mut self) -> StoreResult<()> {
        let writes = self.staged.take().ok_or(StoreError::NoActiveTransaction)?;
        let record = CommitRecord {
            committed_at: Utc::now(),
            writes,
        };
        let body = record.encode_body()?;
        if body.len() > self.max_batch_bytes {
            return Err(StoreError::TransactionTooLarge {
                size: body.len(),
                limit: self.max_batch_bytes,
            });
        }
        self.store.commit_batch(record, body)
    }

    fn abort_transaction(&mut self) -> StoreResult<()> {
        self.staged = None;
        Ok(())
    }

    fn end_session(&mut self) {
        if !self.ended {
            self.ended = true;
            self.staged = None;
            self.store.on_session_end();
        }
    }
}
