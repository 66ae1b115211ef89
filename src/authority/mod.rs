//! Authority engine
//!
//! Public entry point of the crate. Registration, chain queries,
//! comparisons, lineage, consistency validation, approval and startup all
//! go through `AuthorityEngine`.

mod approval;
mod background;
mod engine;
mod errors;
mod startup;
mod views;

pub use approval::StatusChange;
pub use background::spawn_registration;
pub use engine::AuthorityEngine;
pub use errors::{AuthorityError, AuthorityResult};
pub use startup::{DocumentFindings, StartupOptions, StartupReport};
pub use views::{AuditTrail, CompareView, PartLineageReport, Registration, RevisionGraph, TimelineEntry};
