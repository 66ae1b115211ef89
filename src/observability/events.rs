//! Observable events
//!
//! Every log line carries one of these as its `event` field, so log
//! consumers can match on a closed vocabulary instead of message text.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    ConfigLoaded,
    StartupBegin,
    StartupAttemptFailed,
    StartupComplete,
    StartupFailed,

    // Store
    StoreOpened,
    /// Revision log corruption detected (FATAL)
    StoreCorruption,
    /// Append or fsync of the revision log failed (FATAL for the commit)
    StoreAppendFailed,

    // Registration
    RevisionRegistered,
    RevisionDuplicate,
    RegistrationFailed,
    AnomalyDetected,

    // Transactions
    TransactionRetry,
    TransactionFatal,
    TransactionFailed,

    // Approval
    StatusChanged,
    RevisionSuperseded,

    // Cache
    CacheRebuilt,
    CacheCleared,

    // Validation
    ConsistencyChecked,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::StartupBegin => "STARTUP_BEGIN",
            Event::StartupAttemptFailed => "STARTUP_ATTEMPT_FAILED",
            Event::StartupComplete => "STARTUP_COMPLETE",
            Event::StartupFailed => "STARTUP_FAILED",
            Event::StoreOpened => "STORE_OPENED",
            Event::StoreCorruption => "STORE_CORRUPTION",
            Event::StoreAppendFailed => "STORE_APPEND_FAILED",
            Event::RevisionRegistered => "REVISION_REGISTERED",
            Event::RevisionDuplicate => "REVISION_DUPLICATE",
            Event::RegistrationFailed => "REGISTRATION_FAILED",
            Event::AnomalyDetected => "ANOMALY_DETECTED",
            Event::TransactionRetry => "TRANSACTION_RETRY",
            Event::TransactionFatal => "TRANSACTION_FATAL",
            Event::TransactionFailed => "TRANSACTION_FAILED",
            Event::StatusChanged => "STATUS_CHANGED",
            Event::RevisionSuperseded => "REVISION_SUPERSEDED",
            Event::CacheRebuilt => "CACHE_REBUILT",
            Event::CacheCleared => "CACHE_CLEARED",
            Event::ConsistencyChecked => "CONSISTENCY_CHECKED",
        }
    }

    /// Events after which the process cannot continue serving.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::StoreCorruption | Event::StartupFailed)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
