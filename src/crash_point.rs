//! Crash point injection for durability testing
//!
//! Crash points are enabled through the `REVAUTH_CRASH_POINT` environment
//! variable. When the named point is reached the process terminates with
//! `std::process::abort()`: no cleanup, no unwinding, no catching.
//!
//! ```bash
//! REVAUTH_CRASH_POINT=revision_log_after_append revauth register --config cfg.json < rev.json
//! ```

use std::sync::OnceLock;

static CRASH_POINT: OnceLock<Option<String>> = OnceLock::new();

#[inline]
fn configured_point() -> Option<&'static str> {
    CRASH_POINT
        .get_or_init(|| std::env::var("REVAUTH_CRASH_POINT").ok())
        .as_deref()
}

/// Returns true if `REVAUTH_CRASH_POINT` equals `name`.
#[inline]
pub fn crash_point_enabled(name: &str) -> bool {
    configured_point() == Some(name)
}

/// Aborts the process if the named crash point is enabled.
#[inline]
pub fn maybe_crash(name: &str) {
    if crash_point_enabled(name) {
        eprintln!("[CRASH] Triggering crash at point: {}", name);
        std::process::abort();
    }
}

/// Defined crash point names
pub mod points {
    pub const REVISION_LOG_BEFORE_APPEND: &str = "revision_log_before_append";
    pub const REVISION_LOG_AFTER_APPEND: &str = "revision_log_after_append";
    pub const REVISION_LOG_AFTER_FSYNC: &str = "revision_log_after_fsync";
    pub const REVISION_LOG_BEFORE_APPLY: &str = "revision_log_before_apply";

    pub fn all() -> &'static [&'static str] {
        &[
            REVISION_LOG_BEFORE_APPEND,
            REVISION_LOG_AFTER_APPEND,
            REVISION_LOG_AFTER_FSYNC,
            REVISION_LOG_BEFORE_APPLY,
        ]
    }
}
