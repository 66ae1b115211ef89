//! Engine metrics
//!
//! Counters only, monotonic, reset on process start. Relaxed atomics:
//! readers see eventually consistent values.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct AuthorityMetrics {
    registrations: AtomicU64,
    duplicates: AtomicU64,
    registration_failures: AtomicU64,
    anomalies_found: AtomicU64,
    transaction_attempts: AtomicU64,
    transaction_retries: AtomicU64,
    transaction_failures: AtomicU64,
    status_changes: AtomicU64,
}

impl AuthorityMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_registrations(&self) {
        self.registrations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_duplicates(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_registration_failures(&self) {
        self.registration_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_anomalies(&self, count: u64) {
        self.anomalies_found.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_transaction_attempts(&self) {
        self.transaction_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_transaction_retries(&self) {
        self.transaction_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_transaction_failures(&self) {
        self.transaction_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_status_changes(&self) {
        self.status_changes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            registrations: self.registrations.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            registration_failures: self.registration_failures.load(Ordering::Relaxed),
            anomalies_found: self.anomalies_found.load(Ordering::Relaxed),
            transaction_attempts: self.transaction_attempts.load(Ordering::Relaxed),
            transaction_retries: self.transaction_retries.load(Ordering::Relaxed),
            transaction_failures: self.transaction_failures.load(Ordering::Relaxed),
            status_changes: self.status_changes.load(Ordering::Relaxed),
            cache_hits: 0,
            cache_rebuilds: 0,
        }
    }
}

/// Point-in-time copy of all counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub registrations: u64,
    pub duplicates: u64,
    pub registration_failures: u64,
    pub anomalies_found: u64,
    pub transaction_attempts: u64,
    pub transaction_retries: u64,
    pub transaction_failures: u64,
    pub status_changes: u64,
    pub cache_hits: u64,
    pub cache_rebuilds: u64,
}
