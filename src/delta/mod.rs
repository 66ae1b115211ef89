//! Delta engine
//!
//! Computes added, removed and modified parts between two snapshots. The
//! tracked fields are effectivity, supplier code and nomenclature.

mod engine;

pub use engine::{compute_delta, summarize, Delta};
