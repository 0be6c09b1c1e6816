//! Bus configuration.

use std::time::Duration;

/// Tunable defaults for a [`Bus`](crate::Bus) instance.
///
/// The defaults mirror what a UI-facing history and interactive programs
/// tolerate; both are operational knobs, not contracts.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Maximum number of messages retained in the history log.
    /// Oldest-first eviction once exceeded.
    pub history_cap: usize,
    /// Timeout applied by [`BusHandle::request`](crate::BusHandle::request)
    /// when the caller does not supply one.
    pub default_request_timeout: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            history_cap: 20,
            default_request_timeout: Duration::from_secs(5),
        }
    }
}
