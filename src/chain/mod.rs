//! Revision chain
//!
//! Orders persisted revision nodes into one linear chain per document and
//! resolves the previous revision of a new registration from its numbering.

mod builder;
mod token;

pub use builder::{LineageEntry, RevisionChain, Walk};
pub use token::RevisionToken;
