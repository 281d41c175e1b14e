//! Shared listener plumbing: metrics and the main-queue sender

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossfire::{MAsyncTx, TrySendError};

use metro_metrics::{ListenerMetricsProvider, ListenerSnapshot};

/// Counters shared by both listener types
#[derive(Debug, Default)]
pub struct ListenerMetrics {
    /// Lines accepted into the main queue
    pub in_recs: AtomicU64,

    /// Lines dropped because the main queue was full
    pub throttled_in: AtomicU64,

    /// Currently open inbound connections
    pub connections_active: AtomicU64,

    /// Total inbound connections accepted
    pub connections_total: AtomicU64,

    /// Lines discarded for exceeding the length limit
    pub oversized_lines: AtomicU64,

    /// Accept / read errors
    pub read_errors: AtomicU64,
}

impl ListenerMetrics {
    pub const fn new() -> Self {
        Self {
            in_recs: AtomicU64::new(0),
            throttled_in: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            connections_total: AtomicU64::new(0),
            oversized_lines: AtomicU64::new(0),
            read_errors: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn connection_opened(&self) {
        self.connections_active.fetch_add(1, Ordering::Relaxed);
        self.connections_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn oversized_line(&self) {
        self.oversized_lines.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn read_error(&self) {
        self.read_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ListenerSnapshot {
        ListenerSnapshot {
            in_recs: self.in_recs.load(Ordering::Relaxed),
            throttled_in: self.throttled_in.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            connections_total: self.connections_total.load(Ordering::Relaxed),
            oversized_lines: self.oversized_lines.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
        }
    }
}

/// Reporting handle for one listener
#[derive(Clone)]
pub struct ListenerMetricsHandle {
    pub(crate) id: &'static str,
    pub(crate) metrics: Arc<ListenerMetrics>,
}

impl ListenerMetricsProvider for ListenerMetricsHandle {
    fn listener_id(&self) -> &str {
        self.id
    }

    fn snapshot(&self) -> ListenerSnapshot {
        self.metrics.snapshot()
    }
}

/// Non-blocking producer side of the main queue
///
/// Every complete line from every listener goes through here. A full queue
/// drops the line; this bounds memory under overload at the cost of lossy
/// ingest.
#[derive(Clone)]
pub struct LineSender {
    tx: MAsyncTx<String>,
    metrics: Arc<ListenerMetrics>,
}

impl LineSender {
    pub fn new(tx: MAsyncTx<String>, metrics: Arc<ListenerMetrics>) -> Self {
        Self { tx, metrics }
    }

    /// Push one line; drop and count when the queue is full or closed.
    #[inline]
    pub fn push(&self, line: String) {
        match self.tx.try_send(line) {
            Ok(()) => {
                self.metrics.in_recs.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Full(_)) => {
                self.metrics.throttled_in.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Disconnected(_)) => {
                // only reachable while the daemon is tearing down
                self.metrics.throttled_in.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("main queue closed, dropping line");
            }
        }
    }
}
