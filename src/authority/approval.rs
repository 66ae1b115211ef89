//! Approval status changes
//!
//! ```text
//! SubmitForReview: Draft       -> UnderReview
//! Approve:         UnderReview -> Approved   (earlier Approved -> Superseded)
//! Reject:          UnderReview -> Rejected
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{RevisionMetadata, RevisionStatus};

/// A caller-requested status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StatusChange {
    SubmitForReview {
        actor: String,
    },
    Approve {
        actor: String,
        #[serde(default)]
        notes: Option<String>,
        #[serde(default)]
        signature: Option<String>,
    },
    Reject {
        actor: String,
        #[serde(default)]
        notes: Option<String>,
    },
}

impl StatusChange {
    pub fn target(&self) -> RevisionStatus {
        match self {
            StatusChange::SubmitForReview { .. } => RevisionStatus::UnderReview,
            StatusChange::Approve { .. } => RevisionStatus::Approved,
            StatusChange::Reject { .. } => RevisionStatus::Rejected,
        }
    }

    pub fn actor(&self) -> &str {
        match self {
            StatusChange::SubmitForReview { actor }
            | StatusChange::Approve { actor, .. }
            | StatusChange::Reject { actor, .. } => actor,
        }
    }

    /// Metadata after applying this change at `at`.
    pub(crate) fn apply(&self, current: &RevisionMetadata, at: DateTime<Utc>) -> RevisionMetadata {
        let mut next = current.clone();
        next.status = self.target();
        match self {
            StatusChange::SubmitForReview { .. } => {}
            StatusChange::Approve { actor, notes, signature } => {
                next.approved_by = Some(actor.clone());
                next.approved_at = Some(at);
                next.approval_notes = notes.clone();
                next.signature = signature.clone();
            }
            StatusChange::Reject { notes, .. } => {
                next.approval_notes = notes.clone();
            }
        }
        next
    }
}

/// Metadata of an Approved node replaced by a later approval.
pub(crate) fn superseded(current: &RevisionMetadata) -> RevisionMetadata {
    let mut next = current.clone();
    next.status = RevisionStatus::Superseded;
    next
}
