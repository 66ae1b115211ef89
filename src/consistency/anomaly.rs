//! Consistency anomalies
//!
//! Anomalies are findings, never errors. They are returned to the caller
//! and logged; no anomaly blocks a commit.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which chain link an integrity finding refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkDirection {
    Previous,
    Next,
}

impl LinkDirection {
    pub fn field(&self) -> &'static str {
        match self {
            Self::Previous => "previous_revision",
            Self::Next => "next_revision",
        }
    }
}

/// A consistency finding in a document's revision history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Anomaly {
    /// Part removed at one revision and present again in the next without
    /// being declared ADD.
    Resurrection {
        document_id: String,
        part_number: String,
        removed_at: String,
        revision: String,
    },

    /// Part listed as added although the predecessor already carries it.
    SpuriousAdd {
        document_id: String,
        part_number: String,
        revision: String,
        predecessor: String,
    },

    /// A chain link that does not resolve in durable storage.
    BrokenLink {
        document_id: String,
        revision: String,
        direction: LinkDirection,
        target: String,
    },

    /// Following previous links from `revision` does not terminate.
    Cycle { document_id: String, revision: String },

    /// Part present in one revision and missing in the next.
    Disappeared {
        document_id: String,
        part_number: String,
        revision: String,
    },

    /// Part absent in one revision and present in the next without a
    /// declared ADD.
    ReappearedWithoutAdd {
        document_id: String,
        part_number: String,
        revision: String,
    },
}

impl Anomaly {
    /// Stable kind code.
    pub fn code(&self) -> &'static str {
        match self {
            Anomaly::Resurrection { .. } => "RESURRECTION",
            Anomaly::SpuriousAdd { .. } => "SPURIOUS_ADD",
            Anomaly::BrokenLink { .. } => "BROKEN_LINK",
            Anomaly::Cycle { .. } => "CYCLE",
            Anomaly::Disappeared { .. } => "DISAPPEARED",
            Anomaly::ReappearedWithoutAdd { .. } => "REAPPEARED_WITHOUT_ADD",
        }
    }

    pub fn document_id(&self) -> &str {
        match self {
            Anomaly::Resurrection { document_id, .. }
            | Anomaly::SpuriousAdd { document_id, .. }
            | Anomaly::BrokenLink { document_id, .. }
            | Anomaly::Cycle { document_id, .. }
            | Anomaly::Disappeared { document_id, .. }
            | Anomaly::ReappearedWithoutAdd { document_id, .. } => document_id,
        }
    }

    /// Revision the finding is reported at.
    pub fn revision(&self) -> &str {
        match self {
            Anomaly::Resurrection { revision, .. }
            | Anomaly::SpuriousAdd { revision, .. }
            | Anomaly::BrokenLink { revision, .. }
            | Anomaly::Cycle { revision, .. }
            | Anomaly::Disappeared { revision, .. }
            | Anomaly::ReappearedWithoutAdd { revision, .. } => revision,
        }
    }

    pub fn part_number(&self) -> Option<&str> {
        match self {
            Anomaly::Resurrection { part_number, .. }
            | Anomaly::SpuriousAdd { part_number, .. }
            | Anomaly::Disappeared { part_number, .. }
            | Anomaly::ReappearedWithoutAdd { part_number, .. } => Some(part_number),
            Anomaly::BrokenLink { .. } | Anomaly::Cycle { .. } => None,
        }
    }
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::Resurrection {
                part_number,
                removed_at,
                revision,
                ..
            } => write!(
                f,
                "part {} reappeared without ADD at rev {} (removed at rev {})",
                part_number, revision, removed_at
            ),
            Anomaly::SpuriousAdd {
                part_number,
                revision,
                predecessor,
                ..
            } => write!(
                f,
                "part {} added at rev {} but already present in rev {}",
                part_number, revision, predecessor
            ),
            Anomaly::BrokenLink {
                revision,
                direction,
                target,
                ..
            } => write!(
                f,
                "broken link: rev {} {} -> {} does not resolve",
                revision,
                direction.field(),
                target
            ),
            Anomaly::Cycle { revision, .. } => {
                write!(f, "previous_revision links from rev {} do not terminate", revision)
            }
            Anomaly::Disappeared {
                part_number,
                revision,
                ..
            } => write!(f, "part {} disappeared at rev {}", part_number, revision),
            Anomaly::ReappearedWithoutAdd {
                part_number,
                revision,
                ..
            } => write!(f, "part {} reappeared without ADD at rev {}", part_number, revision),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resurrection_rendering() {
        let anomaly = Anomaly::Resurrection {
            document_id: "DOC".into(),
            part_number: "A".into(),
            removed_at: "001.1".into(),
            revision: "001.2".into(),
        };
        assert!(anomaly.to_string().contains("reappeared without ADD"));
        assert_eq!(anomaly.code(), "RESURRECTION");
        assert_eq!(anomaly.part_number(), Some("A"));
    }

    #[test]
    fn test_broken_link_rendering() {
        let anomaly = Anomaly::BrokenLink {
            document_id: "DOC".into(),
            revision: "001.2".into(),
            direction: LinkDirection::Next,
            target: "001.3".into(),
        };
        assert!(anomaly.to_string().starts_with("broken link"));
        assert!(anomaly.part_number().is_none());
    }

    #[test]
    fn test_serializes_with_kind_tag() {
        let anomaly = Anomaly::Cycle {
            document_id: "DOC".into(),
            revision: "1".into(),
        };
        let json = serde_json::to_value(&anomaly).unwrap();
        assert_eq!(json["kind"], "CYCLE");
    }
}
