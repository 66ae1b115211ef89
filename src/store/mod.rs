//! Durable store
//!
//! Interfaces the engine writes through plus two implementations:
//!
//! - `InMemoryRevisionStore`: volatile, with fault injection for tests
//! - `FileRevisionStore`: append-only checksummed commit log, exclusive
//!   per data directory
//!
//! Persisted layout: revision nodes unique on (document_id, revision),
//! nodes per document in creation order, the part cross-reference index,
//! and the audit log.

mod audit;
mod backend;
mod checksum;
mod errors;
mod file;
mod lock;
mod memory;
mod record;
mod state;

pub use audit::{AuditAction, AuditEntry};
pub use backend::{RevisionStore, SessionGuard, StoreSession};
pub use errors::{FailureClass, StoreError, StoreResult};
pub use file::FileRevisionStore;
pub use lock::{StoreLock, StoreLockMeta};
pub use memory::{InMemoryRevisionStore, DEFAULT_MAX_BATCH_BYTES};
pub use record::CommitRecord;
pub use state::{StagedWrite, StoreState};
