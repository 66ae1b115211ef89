//! RevisionChain - ordered revision history of one document
//!
//! - Nodes are held in creation order, oldest first
//! - Exactly one predecessor and one successor per node; no branches
//! - The head is the most recently created node

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Effectivity, PartChangeType, RevisionNode, RevisionStatus};

use super::token::RevisionToken;

/// Chronological revision chain of a single document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionChain {
    document_id: String,
    nodes: Vec<RevisionNode>,
    positions: HashMap<String, usize>,
}

impl RevisionChain {
    /// Creates an empty chain.
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            nodes: Vec::new(),
            positions: HashMap::new(),
        }
    }

    /// Builds a chain from persisted nodes.
    ///
    /// Nodes are ordered by creation time; ties keep the order they were
    /// given in, which is the store's insertion order. Nodes of other
    /// documents are ignored.
    pub fn build(document_id: impl Into<String>, mut nodes: Vec<RevisionNode>) -> Self {
        let document_id = document_id.into();
        nodes.retain(|n| n.document_id == document_id);
        nodes.sort_by_key(|n| n.created_at);

        let positions = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.revision.clone(), i))
            .collect();

        Self {
            document_id,
            nodes,
            positions,
        }
    }

    #[inline]
    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &RevisionNode> {
        self.nodes.iter()
    }

    pub fn nodes(&self) -> &[RevisionNode] {
        &self.nodes
    }

    /// Revision tokens oldest first.
    pub fn revisions(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.revision.as_str()).collect()
    }

    pub fn get(&self, revision: &str) -> Option<&RevisionNode> {
        self.positions.get(revision).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, revision: &str) -> bool {
        self.positions.contains_key(revision)
    }

    /// Position of a revision in creation order.
    pub fn position(&self, revision: &str) -> Option<usize> {
        self.positions.get(revision).copied()
    }

    /// The most recently created node.
    pub fn head(&self) -> Option<&RevisionNode> {
        self.nodes.last()
    }

    /// The node `node.previous_revision` refers to, if it is in this chain.
    pub fn predecessor_of(&self, node: &RevisionNode) -> Option<&RevisionNode> {
        node.previous_revision.as_deref().and_then(|rev| self.get(rev))
    }

    /// Inserts or replaces a node.
    ///
    /// A new revision is appended as the newest node; an existing revision
    /// is replaced in place.
    pub fn upsert(&mut self, node: RevisionNode) {
        match self.positions.get(&node.revision) {
            Some(&i) => self.nodes[i] = node,
            None => {
                self.positions.insert(node.revision.clone(), self.nodes.len());
                self.nodes.push(node);
            }
        }
    }

    /// Resolves the previous revision for a candidate token.
    ///
    /// 1. `<major>.<minor>` tokens look up `<major>.<minor-1>` by exact match.
    /// 2. Otherwise the chain head. An empty chain has no previous revision.
    ///
    /// Never fails; malformed tokens use step 2.
    pub fn resolve_previous(&self, revision: &str) -> Option<&RevisionNode> {
        RevisionToken::parse(revision)
            .and_then(|token| {
                token
                    .predecessor_candidates()
                    .iter()
                    .find_map(|candidate| self.get(candidate))
            })
            .or_else(|| self.head())
    }

    /// Follows `previous_revision` links back from `revision`.
    ///
    /// The walk gives up after `len()` hops, so it always terminates.
    pub fn walk_back(&self, revision: &str) -> Walk {
        let mut visited = Vec::new();
        let mut current = match self.get(revision) {
            Some(node) => node,
            None => return Walk::Dangling(visited),
        };

        loop {
            if visited.len() >= self.len() {
                return Walk::Cycle(visited);
            }
            visited.push(current.revision.clone());
            match current.previous_revision.as_deref() {
                None => return Walk::Complete(visited),
                Some(prev) => match self.get(prev) {
                    Some(node) => current = node,
                    None => return Walk::Dangling(visited),
                },
            }
        }
    }

    /// Presence and state of one part in every revision, oldest first.
    pub fn part_lineage(&self, part_number: &str) -> Vec<LineageEntry> {
        self.nodes
            .iter()
            .map(|node| {
                let record = node.parts.get(part_number);
                LineageEntry {
                    revision: node.revision.clone(),
                    created_at: node.created_at,
                    status: node.status(),
                    present: record.is_some(),
                    effectivity: record.map(|r| r.effectivity.clone()),
                    change_type: record.and_then(|r| r.change_type),
                }
            })
            .collect()
    }
}

/// Outcome of following `previous_revision` links; carries the revisions
/// visited, starting with the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Walk {
    /// Reached a node with no previous revision.
    Complete(Vec<String>),
    /// Hit the hop limit.
    Cycle(Vec<String>),
    /// A link pointed outside the chain.
    Dangling(Vec<String>),
}

impl Walk {
    pub fn is_complete(&self) -> bool {
        matches!(self, Walk::Complete(_))
    }

    pub fn visited(&self) -> &[String] {
        match self {
            Walk::Complete(v) | Walk::Cycle(v) | Walk::Dangling(v) => v,
        }
    }
}

/// One revision's view of a part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageEntry {
    pub revision: String,
    pub created_at: DateTime<Utc>,
    pub status: RevisionStatus,
    pub present: bool,
    pub effectivity: Option<Effectivity>,
    pub change_type: Option<PartChangeType>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::summarize;
    use crate::model::{PartSnapshot, RevisionMetadata};
    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    fn node(rev: &str, minute: i64, prev: Option<&str>) -> RevisionNode {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minute);
        let parts = PartSnapshot::new();
        RevisionNode {
            id: Uuid::new_v4(),
            document_id: "DOC".into(),
            document_number: "N".into(),
            revision: rev.into(),
            previous_revision: prev.map(str::to_string),
            next_revision: None,
            change_summary: summarize(None, &parts),
            part_count: 0,
            parts,
            metadata: RevisionMetadata::draft("t", created),
            issue_date: None,
            source_reference: None,
            version: 1,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn test_build_sorts_by_creation() {
        let chain = RevisionChain::build("DOC", vec![node("030.4", 2, None), node("030.3", 1, None)]);
        assert_eq!(chain.revisions(), vec!["030.3", "030.4"]);
        assert_eq!(chain.head().unwrap().revision, "030.4");
    }

    #[test]
    fn test_build_ignores_other_documents() {
        let mut other = node("1.0", 0, None);
        other.document_id = "OTHER".into();
        let chain = RevisionChain::build("DOC", vec![other, node("1.1", 1, None)]);
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_resolve_previous_by_numbering() {
        let chain = RevisionChain::build("DOC", vec![node("030.3", 1, None), node("030.4", 2, None)]);
        assert_eq!(chain.resolve_previous("030.5").unwrap().revision, "030.4");
        assert_eq!(chain.resolve_previous("030.4").unwrap().revision, "030.3");
    }

    #[test]
    fn test_resolve_previous_falls_back_to_head() {
        let chain = RevisionChain::build("DOC", vec![node("030.2", 1, None)]);
        assert_eq!(chain.resolve_previous("030.5").unwrap().revision, "030.2");
        assert_eq!(chain.resolve_previous("garbage").unwrap().revision, "030.2");
    }

    #[test]
    fn test_resolve_previous_empty_chain() {
        let chain = RevisionChain::new("DOC");
        assert!(chain.resolve_previous("030.5").is_none());
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut chain = RevisionChain::build("DOC", vec![node("1.0", 0, None), node("1.1", 1, Some("1.0"))]);
        let mut updated = chain.get("1.0").unwrap().clone();
        updated.next_revision = Some("1.1".into());
        chain.upsert(updated);

        assert_eq!(chain.revisions(), vec!["1.0", "1.1"]);
        assert_eq!(chain.get("1.0").unwrap().next_revision.as_deref(), Some("1.1"));
    }

    #[test]
    fn test_walk_back_terminates() {
        let chain = RevisionChain::build(
            "DOC",
            vec![node("1.0", 0, None), node("1.1", 1, Some("1.0")), node("1.2", 2, Some("1.1"))],
        );
        let walk = chain.walk_back("1.2");
        assert!(walk.is_complete());
        assert_eq!(walk.visited(), ["1.2", "1.1", "1.0"]);
    }

    #[test]
    fn test_walk_back_detects_cycle() {
        let chain = RevisionChain::build("DOC", vec![node("1.0", 0, Some("1.1")), node("1.1", 1, Some("1.0"))]);
        assert!(matches!(chain.walk_back("1.1"), Walk::Cycle(ref v) if v.len() == 2));
    }

    #[test]
    fn test_walk_back_dangling() {
        let chain = RevisionChain::build("DOC", vec![node("1.1", 1, Some("1.0"))]);
        assert_eq!(chain.walk_back("1.1"), Walk::Dangling(vec!["1.1".to_string()]));
    }

    #[test]
    fn test_part_lineage() {
        use crate::model::{Effectivity, PartRecord};

        let mut first = node("1.0", 0, None);
        first.parts = PartSnapshot::from_records([PartRecord::new("A", Effectivity::list([1]))]).unwrap();
        let second = node("1.1", 1, Some("1.0"));
        let chain = RevisionChain::build("DOC", vec![first, second]);

        let lineage = chain.part_lineage("A");
        assert_eq!(lineage.len(), 2);
        assert!(lineage[0].present);
        assert_eq!(lineage[0].effectivity, Some(Effectivity::list([1])));
        assert!(!lineage[1].present);
        assert_eq!(lineage[1].change_type, None);
    }
}
