//! Cache manager
//!
//! Read-through projection of durable storage: document_id → revision
//! chain, plus the per-document locks that serialize registrations.

mod locks;
mod manager;

pub use locks::DocumentLocks;
pub use manager::{CacheStats, ChainCache};
