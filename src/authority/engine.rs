//! Authority engine
//!
//! Composes the store, chain cache, delta engine, validator and
//! transaction manager behind the public operations. The engine holds no
//! global state; everything is injected at construction.
//!
//! Write path of `register_revision`:
//!
//! 1. validate the submission and build its part snapshot
//! 2. under the document's registration lock, short-circuit duplicates
//! 3. resolve the predecessor from the cached chain
//! 4. summarize the delta and check the transition
//! 5. commit node, predecessor link, part index and audit entry in one
//!    transaction
//! 6. refresh the cached chain

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::cache::{CacheStats, ChainCache, DocumentLocks};
use crate::chain::{LineageEntry, RevisionChain};
use crate::consistency::{check_chain, check_links, check_part_lineage, check_transition, Anomaly};
use crate::delta::{compute_delta, summarize};
use crate::model::{DocumentRef, PartSnapshot, RevisionMetadata, RevisionNode, RevisionStatus, RevisionSubmission};
use crate::observability::{AuthorityMetrics, Event, MetricsSnapshot};
use crate::store::{AuditAction, AuditEntry, RevisionStore, StoreError, StoreResult};
use crate::transaction::{TransactionError, TransactionManager, TransactionPolicy};

use super::approval::{self, StatusChange};
use super::errors::{AuthorityError, AuthorityResult};
use super::views::{AuditTrail, CompareView, PartLineageReport, Registration, RevisionGraph, TimelineEntry};

#[derive(Debug)]
pub struct AuthorityEngine {
    store: Arc<dyn RevisionStore>,
    cache: ChainCache,
    transactions: TransactionManager,
    registration_locks: DocumentLocks,
    metrics: Arc<AuthorityMetrics>,
}

impl AuthorityEngine {
    pub fn new(store: Arc<dyn RevisionStore>, policy: TransactionPolicy) -> Self {
        let metrics = Arc::new(AuthorityMetrics::new());
        Self {
            transactions: TransactionManager::new(Arc::clone(&store), policy, Arc::clone(&metrics)),
            store,
            cache: ChainCache::new(),
            registration_locks: DocumentLocks::new(),
            metrics,
        }
    }

    pub fn store(&self) -> &Arc<dyn RevisionStore> {
        &self.store
    }

    pub(crate) fn cache(&self) -> &ChainCache {
        &self.cache
    }

    /// Registers one revision of a document.
    ///
    /// Anomalies found against the predecessor are returned and logged but
    /// never block the commit. Registering an existing (document_id,
    /// revision) writes nothing and returns `AlreadyExists`.
    pub fn register_revision(&self, submission: RevisionSubmission) -> AuthorityResult<Registration> {
        let snapshot = submission.snapshot()?;
        let document_id = submission.document_id.clone();
        let revision = submission.revision.clone();

        let result = self
            .registration_locks
            .with_lock(&document_id, || self.register_locked(submission, snapshot));

        match &result {
            Ok(Registration::Created { node, anomalies }) => {
                self.metrics.increment_registrations();
                self.metrics.add_anomalies(anomalies.len() as u64);
                info!(
                    event = Event::RevisionRegistered.as_str(),
                    document_id = %node.document_id,
                    revision = %node.revision,
                    previous_revision = node.previous_revision.as_deref().unwrap_or(""),
                    parts = node.part_count,
                    added = node.change_summary.added_parts.len(),
                    removed = node.change_summary.removed_parts.len(),
                    modified = node.change_summary.modified_parts.len(),
                    anomalies = anomalies.len(),
                    "revision registered"
                );
                log_anomalies(anomalies);
            }
            Ok(Registration::AlreadyExists { .. }) => {
                self.metrics.increment_duplicates();
                info!(
                    event = Event::RevisionDuplicate.as_str(),
                    document_id = %document_id,
                    revision = %revision,
                    "revision already registered"
                );
            }
            Err(err) => {
                self.metrics.increment_registration_failures();
                error!(
                    event = Event::RegistrationFailed.as_str(),
                    document_id = %document_id,
                    revision = %revision,
                    code = err.code(),
                    error = %err,
                    "revision registration failed"
                );
            }
        }

        result
    }

    fn register_locked(
        &self,
        submission: RevisionSubmission,
        snapshot: PartSnapshot,
    ) -> AuthorityResult<Registration> {
        if let Some(existing) = self.store.find_revision(&submission.document_id, &submission.revision)? {
            return Ok(Registration::AlreadyExists { node: existing });
        }

        let chain = self.chain(&submission.document_id, false)?;
        let predecessor = chain.resolve_previous(&submission.revision).cloned();

        let now = Utc::now();
        let node = RevisionNode {
            id: Uuid::new_v4(),
            change_summary: summarize(predecessor.as_ref().map(|p| &p.parts), &snapshot),
            part_count: snapshot.len(),
            parts: snapshot,
            previous_revision: predecessor.as_ref().map(|p| p.revision.clone()),
            next_revision: None,
            metadata: RevisionMetadata::draft(&submission.created_by, now),
            document_id: submission.document_id,
            document_number: submission.document_number,
            revision: submission.revision,
            issue_date: submission.issue_date,
            source_reference: submission.source_reference,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        let anomalies = check_transition(predecessor.as_ref(), &node);
        let key = node.key();

        let committed = self.transactions.run("register_revision", |session| {
            session.insert_revision(node.clone())?;

            let mut linked = None;
            if let Some(prev) = &predecessor {
                // Versions may have moved since the chain was cached.
                if let Some(current) = self.store.find_revision(&prev.document_id, &prev.revision)? {
                    if current.next_revision.is_none() {
                        session.link_next(&current.key(), current.version, &node.revision)?;
                        linked = Some(current.key());
                    }
                }
            }

            session.index_parts(&key, node.parts.part_numbers().map(str::to_string).collect())?;
            session.append_audit(AuditEntry::new(
                &key,
                AuditAction::RevisionRegistered,
                &node.metadata.created_by,
                format!(
                    "{} parts, {} added, {} removed, {} modified",
                    node.part_count,
                    node.change_summary.added_parts.len(),
                    node.change_summary.removed_parts.len(),
                    node.change_summary.modified_parts.len()
                ),
            ))?;
            Ok(linked)
        });

        let linked = match committed {
            Ok(linked) => linked,
            Err(TransactionError::Constraint(StoreError::DuplicateKey(_))) => {
                // Lost the race to another process.
                let existing = self
                    .store
                    .find_revision(&key.document_id, &key.revision)?
                    .ok_or_else(|| AuthorityError::not_found(format!("{} rev.{}", key.document_id, key.revision)))?;
                return Ok(Registration::AlreadyExists { node: existing });
            }
            Err(err) => return Err(err.into()),
        };

        let mut refreshed = vec![node.clone()];
        if let Some(prev_key) = linked {
            match self.store.find_revision(&prev_key.document_id, &prev_key.revision) {
                Ok(Some(prev)) => refreshed.push(prev),
                _ => self.cache.clear_document(&key.document_id),
            }
        }
        self.cache.put(&key.document_id, refreshed);

        Ok(Registration::Created { node, anomalies })
    }

    /// The document's chain, oldest first. Unknown documents give an empty
    /// graph.
    pub fn get_revision_graph(&self, document_id: &str, force_rebuild: bool) -> AuthorityResult<RevisionGraph> {
        Ok(self.chain(document_id, force_rebuild)?.into())
    }

    pub fn compare_revisions(&self, document_id: &str, from: &str, to: &str) -> AuthorityResult<CompareView> {
        let chain = self.chain(document_id, false)?;
        let from_node = chain.get(from).ok_or_else(|| missing_revision(document_id, from))?;
        let to_node = chain.get(to).ok_or_else(|| missing_revision(document_id, to))?;
        Ok(compare_view(from_node, to_node))
    }

    /// Presence of one part in every revision of a document, oldest first.
    pub fn get_part_lineage(&self, part_number: &str, document_id: &str) -> AuthorityResult<Vec<LineageEntry>> {
        let chain = self.non_empty_chain(document_id)?;
        let lineage = chain.part_lineage(part_number);
        if !lineage.iter().any(|entry| entry.present) {
            return Err(AuthorityError::not_found(format!(
                "part {part_number} in document {document_id}"
            )));
        }
        Ok(lineage)
    }

    /// Lineage of one part plus disappearance and reappearance findings.
    pub fn validate_part_lineage(&self, part_number: &str, document_id: &str) -> AuthorityResult<PartLineageReport> {
        let chain = self.non_empty_chain(document_id)?;
        let lineage = chain.part_lineage(part_number);
        let anomalies = check_part_lineage(document_id, part_number, &lineage);
        log_anomalies(&anomalies);

        Ok(PartLineageReport {
            document_id: document_id.to_string(),
            part_number: part_number.to_string(),
            is_consistent: anomalies.is_empty(),
            lineage,
            anomalies,
        })
    }

    /// Rebuilds the chain from the store and checks links, resurrections,
    /// spurious adds and termination.
    pub fn validate_consistency(&self, document_id: &str) -> AuthorityResult<Vec<Anomaly>> {
        let chain = self.chain(document_id, true)?;
        let mut anomalies = check_links(&chain, |revision| self.store.revision_exists(document_id, revision))?;
        anomalies.extend(check_chain(&chain));

        self.metrics.add_anomalies(anomalies.len() as u64);
        info!(
            event = Event::ConsistencyChecked.as_str(),
            document_id,
            revisions = chain.len(),
            anomalies = anomalies.len(),
            "consistency checked"
        );
        log_anomalies(&anomalies);
        Ok(anomalies)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn clear_document_cache(&self, document_id: &str) {
        self.cache.clear_document(document_id);
    }

    /// Applies an approval status change and returns the updated node.
    ///
    /// Approving supersedes every earlier Approved node of the document in
    /// the same transaction.
    pub fn transition_status(
        &self,
        document_id: &str,
        revision: &str,
        change: StatusChange,
    ) -> AuthorityResult<RevisionNode> {
        self.registration_locks
            .with_lock(document_id, || self.transition_locked(document_id, revision, &change))
    }

    fn transition_locked(&self, document_id: &str, revision: &str, change: &StatusChange) -> AuthorityResult<RevisionNode> {
        let chain = RevisionChain::build(document_id, self.store.find_by_document(document_id)?);
        let node = chain.get(revision).ok_or_else(|| missing_revision(document_id, revision))?;
        let position = chain.position(revision).unwrap_or_default();

        let from = node.status();
        let to = change.target();
        let invalid = |reason: &str| AuthorityError::InvalidTransition {
            document_id: document_id.to_string(),
            revision: revision.to_string(),
            from,
            to,
            reason: reason.to_string(),
        };

        if !from.can_transition_to(to) {
            return Err(invalid("transition not allowed"));
        }

        let mut superseded = Vec::new();
        if to == RevisionStatus::Approved {
            let (earlier, later) = chain.nodes().split_at(position);
            if later.iter().skip(1).any(|n| n.status() == RevisionStatus::Approved) {
                return Err(invalid("a later revision is already approved"));
            }
            superseded = earlier
                .iter()
                .filter(|n| n.status() == RevisionStatus::Approved)
                .collect();
        }

        let key = node.key();
        let metadata = change.apply(&node.metadata, Utc::now());
        let actor = change.actor();

        self.transactions.run("transition_status", |session| {
            session.update_metadata(&key, self.current_version(&key)?, metadata.clone())?;
            session.append_audit(AuditEntry::new(
                &key,
                AuditAction::StatusChanged,
                actor,
                format!("{from} -> {to}"),
            ))?;

            for old in &superseded {
                let old_key = old.key();
                session.update_metadata(
                    &old_key,
                    self.current_version(&old_key)?,
                    approval::superseded(&old.metadata),
                )?;
                session.append_audit(AuditEntry::new(
                    &old_key,
                    AuditAction::RevisionSuperseded,
                    actor,
                    format!("superseded by rev.{revision}"),
                ))?;
            }
            Ok(())
        })?;

        self.metrics.increment_status_changes();
        info!(
            event = Event::StatusChanged.as_str(),
            document_id,
            revision,
            from = from.as_str(),
            to = to.as_str(),
            actor,
            "revision status changed"
        );

        let mut refreshed = Vec::with_capacity(superseded.len() + 1);
        for old in &superseded {
            info!(
                event = Event::RevisionSuperseded.as_str(),
                document_id,
                revision = %old.revision,
                superseded_by = revision,
                "revision superseded"
            );
            if let Some(current) = self.store.find_revision(document_id, &old.revision)? {
                refreshed.push(current);
            }
        }
        let updated = self
            .store
            .find_revision(document_id, revision)?
            .ok_or_else(|| missing_revision(document_id, revision))?;
        refreshed.push(updated.clone());
        self.cache.put(document_id, refreshed);

        Ok(updated)
    }

    /// Timeline of a document plus the delta between each consecutive pair.
    pub fn audit_trail(&self, document_id: &str) -> AuthorityResult<AuditTrail> {
        let chain = self.non_empty_chain(document_id)?;
        let nodes = chain.nodes();

        Ok(AuditTrail {
            document_id: document_id.to_string(),
            timeline: nodes.iter().map(TimelineEntry::from).collect(),
            changes: nodes.windows(2).map(|pair| compare_view(&pair[0], &pair[1])).collect(),
            total_revisions: nodes.len(),
        })
    }

    /// Every (document_id, revision) whose snapshot contains the part.
    pub fn documents_containing_part(&self, part_number: &str) -> AuthorityResult<Vec<DocumentRef>> {
        Ok(self.store.part_references(part_number)?)
    }

    pub fn audit_log(&self, document_id: &str) -> AuthorityResult<Vec<AuditEntry>> {
        Ok(self.store.audit_entries(document_id)?)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        let cache = self.cache.stats();
        MetricsSnapshot {
            cache_hits: cache.hits,
            cache_rebuilds: cache.rebuilds,
            ..self.metrics.snapshot()
        }
    }

    pub(crate) fn chain(&self, document_id: &str, force_rebuild: bool) -> AuthorityResult<RevisionChain> {
        Ok(self
            .cache
            .get(document_id, force_rebuild, || self.store.find_by_document(document_id))?)
    }

    fn non_empty_chain(&self, document_id: &str) -> AuthorityResult<RevisionChain> {
        let chain = self.chain(document_id, false)?;
        if chain.is_empty() {
            return Err(AuthorityError::not_found(format!("document {document_id}")));
        }
        Ok(chain)
    }

    fn current_version(&self, key: &DocumentRef) -> StoreResult<u64> {
        self.store
            .find_revision(&key.document_id, &key.revision)?
            .map(|node| node.version)
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }
}

fn compare_view(from: &RevisionNode, to: &RevisionNode) -> CompareView {
    CompareView {
        document_id: to.document_id.clone(),
        from_revision: from.revision.clone(),
        to_revision: to.revision.clone(),
        delta: compute_delta(Some(&from.parts), &to.parts),
        from_issue_date: from.issue_date,
        to_issue_date: to.issue_date,
        from_status: from.status(),
        to_status: to.status(),
    }
}

fn missing_revision(document_id: &str, revision: &str) -> AuthorityError {
    AuthorityError::not_found(format!("{document_id} rev.{revision}"))
}

fn log_anomalies(anomalies: &[Anomaly]) {
    for anomaly in anomalies {
        warn!(
            event = Event::AnomalyDetected.as_str(),
            kind = anomaly.code(),
            document_id = anomaly.document_id(),
            revision = anomaly.revision(),
            part_number = anomaly.part_number().unwrap_or(""),
            "{anomaly}"
        );
    }
}
