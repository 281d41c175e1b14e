//! Worker pool metrics

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use metro_metrics::{PipelineMetricsProvider, PipelineSnapshot};

/// Counters for the worker pool
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    lines_processed: AtomicU64,
    parse_errors: AtomicU64,
    unrouted: AtomicU64,
    routed: AtomicU64,
}

impl PipelineMetrics {
    pub const fn new() -> Self {
        Self {
            lines_processed: AtomicU64::new(0),
            parse_errors: AtomicU64::new(0),
            unrouted: AtomicU64::new(0),
            routed: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_line(&self) {
        self.lines_processed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_parse_error(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_unrouted(&self) {
        self.unrouted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_routed(&self) {
        self.routed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            lines_processed: self.lines_processed.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            unrouted: self.unrouted.load(Ordering::Relaxed),
            routed: self.routed.load(Ordering::Relaxed),
        }
    }
}

/// Reporting handle for the worker pool
#[derive(Clone)]
pub struct PipelineMetricsHandle {
    pub(crate) metrics: Arc<PipelineMetrics>,
}

impl PipelineMetricsProvider for PipelineMetricsHandle {
    fn snapshot(&self) -> PipelineSnapshot {
        self.metrics.snapshot()
    }
}
