//! Transaction manager
//!
//! Wraps multi-step store writes in one atomic unit with bounded retry.

mod errors;
mod manager;

pub use errors::{TransactionError, TransactionResult};
pub use manager::{TransactionManager, TransactionPolicy};
