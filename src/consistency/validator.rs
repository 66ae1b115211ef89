//! Consistency checks
//!
//! Every check is read-only and returns findings as data:
//!
//! - transition: resurrection and spurious add between a node and its predecessor
//! - chain: transitions over a whole chain plus termination of previous links
//! - links: every set previous/next link resolves in durable storage
//! - part lineage: disappearance and reappearance without a declared ADD

use crate::chain::{LineageEntry, RevisionChain, Walk};
use crate::model::{PartChangeType, RevisionNode};

use super::anomaly::{Anomaly, LinkDirection};

/// Checks the transition from `predecessor` to `node`.
///
/// A part counts as explicitly added only when its record declares ADD.
pub fn check_transition(predecessor: Option<&RevisionNode>, node: &RevisionNode) -> Vec<Anomaly> {
    let Some(prev) = predecessor else {
        return Vec::new();
    };

    let mut anomalies = Vec::new();

    for part_number in &prev.change_summary.removed_parts {
        if let Some(record) = node.parts.get(part_number) {
            if !record.declared_add() {
                anomalies.push(Anomaly::Resurrection {
                    document_id: node.document_id.clone(),
                    part_number: part_number.clone(),
                    removed_at: prev.revision.clone(),
                    revision: node.revision.clone(),
                });
            }
        }
    }

    for record in node.parts.iter() {
        let listed_as_added = node.change_summary.is_added(&record.part_number) || record.declared_add();
        if listed_as_added && prev.parts.contains(&record.part_number) {
            anomalies.push(Anomaly::SpuriousAdd {
                document_id: node.document_id.clone(),
                part_number: record.part_number.clone(),
                revision: node.revision.clone(),
                predecessor: prev.revision.clone(),
            });
        }
    }

    anomalies
}

/// Checks every transition in a chain and that previous links from the
/// head terminate.
pub fn check_chain(chain: &RevisionChain) -> Vec<Anomaly> {
    let mut anomalies: Vec<Anomaly> = chain
        .iter()
        .flat_map(|node| check_transition(chain.predecessor_of(node), node))
        .collect();

    if let Some(head) = chain.head() {
        if let Walk::Cycle(_) = chain.walk_back(&head.revision) {
            anomalies.push(Anomaly::Cycle {
                document_id: chain.document_id().to_string(),
                revision: head.revision.clone(),
            });
        }
    }

    anomalies
}

/// Checks that every set link of every node resolves.
///
/// `exists` answers whether a revision of this document is stored.
pub fn check_links<E, F>(chain: &RevisionChain, mut exists: F) -> Result<Vec<Anomaly>, E>
where
    F: FnMut(&str) -> Result<bool, E>,
{
    let mut anomalies = Vec::new();

    for node in chain.iter() {
        let links = [
            (LinkDirection::Previous, node.previous_revision.as_deref()),
            (LinkDirection::Next, node.next_revision.as_deref()),
        ];
        for (direction, target) in links {
            let Some(target) = target else { continue };
            if !exists(target)? {
                anomalies.push(Anomaly::BrokenLink {
                    document_id: node.document_id.clone(),
                    revision: node.revision.clone(),
                    direction,
                    target: target.to_string(),
                });
            }
        }
    }

    Ok(anomalies)
}

/// Checks consecutive lineage entries of one part.
pub fn check_part_lineage(document_id: &str, part_number: &str, lineage: &[LineageEntry]) -> Vec<Anomaly> {
    lineage
        .windows(2)
        .filter_map(|pair| {
            let (curr, next) = (&pair[0], &pair[1]);
            if curr.present && !next.present {
                Some(Anomaly::Disappeared {
                    document_id: document_id.to_string(),
                    part_number: part_number.to_string(),
                    revision: next.revision.clone(),
                })
            } else if !curr.present && next.present && next.change_type != Some(PartChangeType::Add) {
                Some(Anomaly::ReappearedWithoutAdd {
                    document_id: document_id.to_string(),
                    part_number: part_number.to_string(),
                    revision: next.revision.clone(),
                })
            } else {
                None
            }
        })
        .collect()
}
