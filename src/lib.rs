//! revauth - revision authority and consistency engine
//!
//! Tracks every revision of an engineering configuration document as a
//! node in a per-document chain, computes part deltas between revisions,
//! and reports consistency anomalies such as parts reappearing without an
//! explicit ADD.

pub mod authority;
pub mod cache;
pub mod chain;
pub mod cli;
pub mod config;
pub mod consistency;
pub mod crash_point;
pub mod delta;
pub mod model;
pub mod observability;
pub mod store;
pub mod transaction;
