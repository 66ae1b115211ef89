//! Committed store state and staged writes
//!
//! Both store implementations keep their committed data in a `StoreState`.
//! A transaction stages `StagedWrite`s; at commit the whole batch is
//! validated against the current state and then applied. Validation covers
//! every failure mode, so applying never fails halfway.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{DocumentRef, RevisionMetadata, RevisionNode};

use super::audit::AuditEntry;
use super::errors::{StoreError, StoreResult};

/// One write inside a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StagedWrite {
    /// Unique on (document_id, revision).
    InsertRevision(RevisionNode),
    /// Sets `next_revision` if it is unset.
    LinkNext {
        key: DocumentRef,
        expected_version: u64,
        next_revision: String,
        at: DateTime<Utc>,
    },
    UpdateMetadata {
        key: DocumentRef,
        expected_version: u64,
        metadata: RevisionMetadata,
        at: DateTime<Utc>,
    },
    IndexParts {
        key: DocumentRef,
        part_numbers: Vec<String>,
    },
    AppendAudit(AuditEntry),
}

/// Committed data of a revision store.
#[derive(Debug, Default)]
pub struct StoreState {
    nodes: HashMap<DocumentRef, RevisionNode>,
    /// Revisions per document in insertion order.
    by_document: HashMap<String, Vec<String>>,
    /// part_number → documents referencing it.
    part_index: BTreeMap<String, BTreeSet<DocumentRef>>,
    audit: Vec<AuditEntry>,
    /// Commit sequence of the last write per document.
    last_activity: HashMap<String, u64>,
    sequence: u64,
}

impl StoreState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed batches.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn revision_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn find_revision(&self, document_id: &str, revision: &str) -> Option<RevisionNode> {
        self.nodes.get(&DocumentRef::new(document_id, revision)).cloned()
    }

    pub fn contains(&self, key: &DocumentRef) -> bool {
        self.nodes.contains_key(key)
    }

    /// Nodes of a document by creation time, insertion order on ties.
    pub fn find_by_document(&self, document_id: &str) -> Vec<RevisionNode> {
        let mut nodes: Vec<RevisionNode> = self
            .by_document
            .get(document_id)
            .map(|revs| {
                revs.iter()
                    .filter_map(|rev| self.find_revision(document_id, rev))
                    .collect()
            })
            .unwrap_or_default();
        nodes.sort_by_key(|n| n.created_at);
        nodes
    }

    /// Most recently active document first.
    pub fn document_ids(&self) -> Vec<String> {
        let mut ids: Vec<(&String, u64)> = self.last_activity.iter().map(|(id, seq)| (id, *seq)).collect();
        ids.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ids.into_iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn part_references(&self, part_number: &str) -> Vec<DocumentRef> {
        self.part_index
            .get(part_number)
            .map(|refs| refs.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn audit_entries(&self, document_id: &str) -> Vec<AuditEntry> {
        self.audit
            .iter()
            .filter(|e| e.document_id == document_id)
            .cloned()
            .collect()
    }

    /// Checks that `batch` would apply cleanly, including effects of
    /// earlier writes in the same batch.
    pub fn validate_batch(&self, batch: &[StagedWrite]) -> StoreResult<()> {
        let mut indexed: HashSet<&DocumentRef> = HashSet::new();
        let mut versions: HashMap<DocumentRef, u64> = HashMap::new();

        for write in batch {
            match write {
                StagedWrite::InsertRevision(node) => {
                    let key = node.key();
                    if self.nodes.contains_key(&key) || versions.contains_key(&key) {
                        return Err(StoreError::DuplicateKey(key));
                    }
                    versions.insert(key, node.version);
                }
                StagedWrite::LinkNext {
                    key,
                    expected_version,
                    ..
                }
                | StagedWrite::UpdateMetadata {
                    key,
                    expected_version,
                    ..
                } => {
                    let found = match versions.get(key) {
                        Some(v) => *v,
                        None => self
                            .nodes
                            .get(key)
                            .map(|n| n.version)
                            .ok_or_else(|| StoreError::NotFound(key.clone()))?,
                    };
                    if found != *expected_version {
                        return Err(StoreError::WriteConflict {
                            key: key.clone(),
                            expected: *expected_version,
                            found,
                        });
                    }
                    versions.insert(key.clone(), found + 1);
                }
                StagedWrite::IndexParts { key, .. } => {
                    indexed.insert(key);
                }
                StagedWrite::AppendAudit(_) => {}
            }
        }

        for key in indexed {
            if !self.nodes.contains_key(key) && !versions.contains_key(key) {
                return Err(StoreError::NotFound(key.clone()));
            }
        }

        Ok(())
    }

    /// Validates and applies a batch as one commit.
    pub fn apply_batch(&mut self, batch: Vec<StagedWrite>) -> StoreResult<()> {
        self.validate_batch(&batch)?;
        self.sequence += 1;
        let sequence = self.sequence;

        for write in batch {
            match write {
                StagedWrite::InsertRevision(node) => {
                    self.last_activity.insert(node.document_id.clone(), sequence);
                    self.by_document
                        .entry(node.document_id.clone())
                        .or_default()
                        .push(node.revision.clone());
                    self.nodes.insert(node.key(), node);
                }
                StagedWrite::LinkNext {
                    key,
                    next_revision,
                    at,
                    ..
                } => {
                    if let Some(node) = self.nodes.get_mut(&key) {
                        if node.next_revision.is_none() {
                            node.next_revision = Some(next_revision);
                        }
                        node.version += 1;
                        node.updated_at = at;
                    }
                }
                StagedWrite::UpdateMetadata { key, metadata, at, .. } => {
                    self.last_activity.insert(key.document_id.clone(), sequence);
                    if let Some(node) = self.nodes.get_mut(&key) {
                        node.metadata = metadata;
                        node.version += 1;
                        node.updated_at = at;
                    }
                }
                StagedWrite::IndexParts { key, part_numbers } => {
                    for part_number in part_numbers {
                        self.part_index.entry(part_number).or_default().insert(key.clone());
                    }
                }
                StagedWrite::AppendAudit(entry) => self.audit.push(entry),
            }
        }

        Ok(())
    }
}
