//! Revision nodes and change summaries
//!
//! A `RevisionNode` is one committed snapshot of a document. Chain
//! neighbours are referenced by revision token within the same document,
//! never by pointer, so nodes can be stored, cached, and cloned freely.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::part::{Effectivity, PartRecord, PartSnapshot};
use super::status::RevisionStatus;

/// Whether a revision starts a chain or follows a predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SummaryKind {
    Initial,
    Update,
}

/// A part field the delta engine tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedField {
    Effectivity,
    SupplierCode,
    Nomenclature,
}

impl TrackedField {
    /// Fields in comparison order.
    pub const ALL: [TrackedField; 3] = [
        TrackedField::Effectivity,
        TrackedField::SupplierCode,
        TrackedField::Nomenclature,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Effectivity => "effectivity",
            Self::SupplierCode => "supplier_code",
            Self::Nomenclature => "nomenclature",
        }
    }

    /// Reads this field from a part record.
    pub fn value_of(&self, part: &PartRecord) -> FieldValue {
        match self {
            Self::Effectivity => FieldValue::Effectivity(part.effectivity.clone()),
            Self::SupplierCode => FieldValue::Text(part.supplier_code.clone()),
            Self::Nomenclature => FieldValue::Text(part.nomenclature.clone()),
        }
    }
}

impl fmt::Display for TrackedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of one tracked field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Effectivity(Effectivity),
    Text(Option<String>),
}

/// Old and new value of one changed field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: TrackedField,
    pub old_value: FieldValue,
    pub new_value: FieldValue,
}

/// A part present in both snapshots whose tracked fields differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartChange {
    pub part_number: String,
    pub fields_changed: Vec<TrackedField>,
    pub field_changes: Vec<FieldChange>,
    pub old_value: PartRecord,
    pub new_value: PartRecord,
}

impl PartChange {
    /// The change recorded for `field`, if it changed.
    pub fn change_for(&self, field: TrackedField) -> Option<&FieldChange> {
        self.field_changes.iter().find(|c| c.field == field)
    }
}

/// What changed in the transition that produced a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub kind: SummaryKind,
    pub added_parts: Vec<String>,
    pub removed_parts: Vec<String>,
    pub modified_parts: Vec<PartChange>,
    pub total_parts: usize,
}

impl ChangeSummary {
    pub fn is_added(&self, part_number: &str) -> bool {
        self.added_parts.iter().any(|p| p == part_number)
    }

    pub fn is_removed(&self, part_number: &str) -> bool {
        self.removed_parts.iter().any(|p| p == part_number)
    }

    pub fn modification(&self, part_number: &str) -> Option<&PartChange> {
        self.modified_parts.iter().find(|c| c.part_number == part_number)
    }
}

/// Where a revision's source file came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReference {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_hash: Option<String>,
}

impl SourceReference {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            file_hash: None,
        }
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.file_hash = Some(hash.into());
        self
    }
}

/// Authorship and approval state of a node. The only mutable part of a
/// committed node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionMetadata {
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub status: RevisionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl RevisionMetadata {
    /// Metadata for a freshly registered node.
    pub fn draft(created_by: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            created_by: created_by.into(),
            created_at,
            status: RevisionStatus::Draft,
            approved_by: None,
            approved_at: None,
            approval_notes: None,
            signature: None,
        }
    }
}

/// One committed snapshot of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionNode {
    pub id: Uuid,
    pub document_id: String,
    pub document_number: String,
    pub revision: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_revision: Option<String>,
    pub parts: PartSnapshot,
    pub part_count: usize,
    pub change_summary: ChangeSummary,
    pub metadata: RevisionMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_reference: Option<SourceReference>,
    /// Write counter for this node; 1 on insert.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RevisionNode {
    pub fn status(&self) -> RevisionStatus {
        self.metadata.status
    }

    pub fn key(&self) -> DocumentRef {
        DocumentRef::new(&self.document_id, &self.revision)
    }
}

/// (document_id, revision) pair; the unique key of a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentRef {
    pub document_id: String,
    pub revision: String,
}

impl DocumentRef {
    pub fn new(document_id: impl Into<String>, revision: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            revision: revision.into(),
        }
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} rev.{}", self.document_id, self.revision)
    }
}
