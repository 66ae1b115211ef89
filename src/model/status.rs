//! Revision approval status
//!
//! Allowed transitions:
//!
//! ```text
//! Draft ──> UnderReview ──> Approved ──> Superseded
//!                      └──> Rejected
//! ```
//!
//! `Approved → Superseded` is never requested by a caller; it happens when a
//! later revision of the same document is approved.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RevisionStatus {
    Draft,
    UnderReview,
    Approved,
    Superseded,
    Rejected,
}

impl RevisionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::UnderReview => "UNDER_REVIEW",
            Self::Approved => "APPROVED",
            Self::Superseded => "SUPERSEDED",
            Self::Rejected => "REJECTED",
        }
    }

    /// Whether `self → next` is an allowed transition.
    pub fn can_transition_to(&self, next: RevisionStatus) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::UnderReview)
                | (Self::UnderReview, Self::Approved)
                | (Self::UnderReview, Self::Rejected)
                | (Self::Approved, Self::Superseded)
        )
    }

    /// No transition leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Superseded | Self::Rejected)
    }
}

impl Default for RevisionStatus {
    fn default() -> Self {
        Self::Draft
    }
}

impl fmt::Display for RevisionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
