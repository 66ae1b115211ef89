//! Revision data model
//!
//! Part records, part snapshots, revision nodes and the approval status
//! state, plus the ingestion boundary that coerces loosely-typed records
//! into this model.

mod errors;
mod ingest;
mod part;
mod revision;
mod status;

pub use errors::{ModelError, ModelResult};
pub use ingest::{coerce_parts, RevisionSubmission};
pub use part::{Effectivity, PartChangeType, PartRecord, PartSnapshot};
pub use revision::{
    ChangeSummary, DocumentRef, FieldChange, FieldValue, PartChange, RevisionMetadata,
    RevisionNode, SourceReference, SummaryKind, TrackedField,
};
pub use status::RevisionStatus;
