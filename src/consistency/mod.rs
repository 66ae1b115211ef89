//! Consistency validator
//!
//! Inspects revision chains for anomalies and broken links. Findings are
//! advisory: registration succeeds regardless of what is reported here.

mod anomaly;
mod validator;

pub use anomaly::{Anomaly, LinkDirection};
pub use validator::{check_chain, check_links, check_part_lineage, check_transition};
