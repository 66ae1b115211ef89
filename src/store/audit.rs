//! Audit log entries

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::DocumentRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    RevisionRegistered,
    StatusChanged,
    RevisionSuperseded,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RevisionRegistered => "REVISION_REGISTERED",
            Self::StatusChanged => "STATUS_CHANGED",
            Self::RevisionSuperseded => "REVISION_SUPERSEDED",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One append-only audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub document_id: String,
    pub revision: String,
    pub action: AuditAction,
    pub actor: String,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(key: &DocumentRef, action: AuditAction, actor: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id: key.document_id.clone(),
            revision: key.revision.clone(),
            action,
            actor: actor.into(),
            detail: detail.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn key(&self) -> DocumentRef {
        DocumentRef::new(&self.document_id, &self.revision)
    }
}
