//! Reference-count trace counters.

use serde::Serialize;

/// Counters gathered while tracing is enabled.
///
/// `attempts` count every retain/release call including those on immediate
/// values; the plain counts only include operations on heap objects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RcCounters {
    /// Retains applied to heap objects
    pub num_retains: u64,
    /// Retain calls of any value
    pub num_retain_attempts: u64,
    /// Releases applied to heap objects
    pub num_releases: u64,
    /// Release calls of any value
    pub num_release_attempts: u64,
    /// Objects freed by a forced teardown rather than by reaching zero
    pub num_force_releases: u64,
    /// Objects found on reference cycles during the last cycle report
    pub num_retain_cycles: u64,
    /// Distinct cycle roots found during the last cycle report
    pub num_retain_cycle_roots: u64,
}

impl RcCounters {
    /// Net retains minus releases on heap objects
    pub fn balance(&self) -> i64 {
        self.num_retains as i64 - self.num_releases as i64
    }
}
