//! Observability
//!
//! Structured logging through `tracing` with a closed event vocabulary,
//! plus lock-free counters.
//!
//! ```ignore
//! use revauth::observability::Event;
//!
//! tracing::info!(event = Event::RevisionRegistered.as_str(), document_id, revision, "registered");
//! ```

mod events;
mod logging;
mod metrics;

pub use events::Event;
pub use logging::init_logging;
pub use metrics::{AuthorityMetrics, MetricsSnapshot};
