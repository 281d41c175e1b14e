//! Per-host delivery metrics

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use metro_metrics::{HostMetricsProvider, HostSnapshot};

/// Counters for one downstream host
#[derive(Debug, Default)]
pub struct HostMetrics {
    /// Records written to the connection
    pub out_recs: AtomicU64,

    /// Records dropped at push because the queue was full
    pub throttled_out: AtomicU64,

    /// Availability edges, both directions
    pub state_changes: AtomicU64,

    /// Stale connections closed and reopened
    pub old_connection_refresh: AtomicU64,
}

impl HostMetrics {
    pub const fn new() -> Self {
        Self {
            out_recs: AtomicU64::new(0),
            throttled_out: AtomicU64::new(0),
            state_changes: AtomicU64::new(0),
            old_connection_refresh: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_sent(&self) {
        self.out_recs.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_throttled(&self) {
        self.throttled_out.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_state_change(&self) {
        self.state_changes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_refresh(&self) {
        self.old_connection_refresh.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> HostSnapshot {
        HostSnapshot {
            out_recs: self.out_recs.load(Ordering::Relaxed),
            throttled_out: self.throttled_out.load(Ordering::Relaxed),
            state_changes: self.state_changes.load(Ordering::Relaxed),
            old_connection_refresh: self.old_connection_refresh.load(Ordering::Relaxed),
        }
    }
}

/// Reporting handle for one host
///
/// Holds Arcs into the host's counters, so it stays valid for the lifetime
/// of the daemon regardless of what the host tasks are doing.
#[derive(Clone)]
pub struct HostMetricsHandle {
    pub(crate) cluster: String,
    pub(crate) label: String,
    pub(crate) metrics: Arc<HostMetrics>,
    pub(crate) available: Arc<AtomicBool>,
}

impl HostMetricsProvider for HostMetricsHandle {
    fn cluster(&self) -> &str {
        &self.cluster
    }

    fn host(&self) -> &str {
        &self.label
    }

    fn available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    fn snapshot(&self) -> HostSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let m = HostMetrics::new();
        m.record_sent();
        m.record_sent();
        m.record_throttled();
        m.record_state_change();

        let s = m.snapshot();
        assert_eq!(s.out_recs, 2);
        assert_eq!(s.throttled_out, 1);
        assert_eq!(s.state_changes, 1);
        assert_eq!(s.old_connection_refresh, 0);
    }
}
