//! Structured results of orchestrator operations
//!
//! Everything here is plain serializable data for the API layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chain::{LineageEntry, RevisionChain};
use crate::consistency::Anomaly;
use crate::delta::Delta;
use crate::model::{RevisionNode, RevisionStatus, SummaryKind};

/// Outcome of `register_revision`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Registration {
    /// A new node was committed. Anomalies are advisory.
    Created { node: RevisionNode, anomalies: Vec<Anomaly> },
    /// The (document_id, revision) pair was already registered; nothing
    /// was written.
    AlreadyExists { node: RevisionNode },
}

impl Registration {
    pub fn node(&self) -> &RevisionNode {
        match self {
            Registration::Created { node, .. } | Registration::AlreadyExists { node } => node,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Registration::Created { .. })
    }

    pub fn anomalies(&self) -> &[Anomaly] {
        match self {
            Registration::Created { anomalies, .. } => anomalies,
            Registration::AlreadyExists { .. } => &[],
        }
    }
}

/// A document's revision chain, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionGraph {
    pub document_id: String,
    pub head: Option<String>,
    pub nodes: Vec<RevisionNode>,
}

impl RevisionGraph {
    pub fn get(&self, revision: &str) -> Option<&RevisionNode> {
        self.nodes.iter().find(|n| n.revision == revision)
    }

    pub fn revisions(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.revision.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl From<RevisionChain> for RevisionGraph {
    fn from(chain: RevisionChain) -> Self {
        Self {
            document_id: chain.document_id().to_string(),
            head: chain.head().map(|n| n.revision.clone()),
            nodes: chain.nodes().to_vec(),
        }
    }
}

/// Delta between two revisions of one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareView {
    pub document_id: String,
    pub from_revision: String,
    pub to_revision: String,
    pub delta: Delta,
    pub from_issue_date: Option<DateTime<Utc>>,
    pub to_issue_date: Option<DateTime<Utc>>,
    pub from_status: RevisionStatus,
    pub to_status: RevisionStatus,
}

/// Lineage of one part plus the findings over it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartLineageReport {
    pub document_id: String,
    pub part_number: String,
    pub lineage: Vec<LineageEntry>,
    pub anomalies: Vec<Anomaly>,
    pub is_consistent: bool,
}

/// One row of an audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineEntry {
    pub revision: String,
    pub issue_date: Option<DateTime<Utc>>,
    pub status: RevisionStatus,
    pub created_at: DateTime<Utc>,
    pub total_parts: usize,
    pub kind: SummaryKind,
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
    pub has_next: bool,
}

impl From<&RevisionNode> for TimelineEntry {
    fn from(node: &RevisionNode) -> Self {
        let summary = &node.change_summary;
        Self {
            revision: node.revision.clone(),
            issue_date: node.issue_date,
            status: node.status(),
            created_at: node.created_at,
            total_parts: summary.total_parts,
            kind: summary.kind,
            added: summary.added_parts.len(),
            removed: summary.removed_parts.len(),
            modified: summary.modified_parts.len(),
            has_next: node.next_revision.is_some(),
        }
    }
}

/// Full history of a document: timeline plus consecutive deltas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditTrail {
    pub document_id: String,
    pub timeline: Vec<TimelineEntry>,
    pub changes: Vec<CompareView>,
    pub total_revisions: usize,
}
