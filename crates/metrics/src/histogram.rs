//! Processing-latency histogram
//!
//! Fixed exponential buckets, atomic counts. One instance is shared by every
//! host sender; `observe` is called once per successfully written record with
//! the time elapsed since ingest.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Bucket upper bounds. Records slower than the last bound land in the
/// overflow bucket.
const BOUNDS: [Duration; 14] = [
    Duration::from_micros(100),
    Duration::from_micros(250),
    Duration::from_micros(500),
    Duration::from_millis(1),
    Duration::from_micros(2_500),
    Duration::from_millis(5),
    Duration::from_millis(10),
    Duration::from_millis(25),
    Duration::from_millis(50),
    Duration::from_millis(100),
    Duration::from_millis(250),
    Duration::from_millis(500),
    Duration::from_secs(1),
    Duration::from_secs(5),
];

/// Lock-free latency histogram with fixed buckets
#[derive(Debug)]
pub struct LatencyHistogram {
    // BOUNDS.len() buckets plus one overflow bucket
    counts: [AtomicU64; BOUNDS.len() + 1],
    total: AtomicU64,
    sum_nanos: AtomicU64,
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencyHistogram {
    pub fn new() -> Self {
        Self {
            counts: std::array::from_fn(|_| AtomicU64::new(0)),
            total: AtomicU64::new(0),
            sum_nanos: AtomicU64::new(0),
        }
    }

    /// Record one observation.
    #[inline]
    pub fn observe(&self, elapsed: Duration) {
        let idx = BOUNDS
            .iter()
            .position(|b| elapsed <= *b)
            .unwrap_or(BOUNDS.len());
        self.counts[idx].fetch_add(1, Ordering::Relaxed);
        self.total.fetch_add(1, Ordering::Relaxed);
        self.sum_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Point-in-time copy of all buckets.
    pub fn snapshot(&self) -> HistogramSnapshot {
        HistogramSnapshot {
            buckets: std::array::from_fn(|i| {
                (
                    BOUNDS.get(i).copied(),
                    self.counts[i].load(Ordering::Relaxed),
                )
            }),
            count: self.total.load(Ordering::Relaxed),
            sum: Duration::from_nanos(self.sum_nanos.load(Ordering::Relaxed)),
        }
    }
}

/// Point-in-time histogram contents
///
/// `buckets[i].0` is the upper bound, `None` for the overflow bucket.
#[derive(Debug, Clone)]
pub struct HistogramSnapshot {
    pub buckets: [(Option<Duration>, u64); BOUNDS.len() + 1],
    pub count: u64,
    pub sum: Duration,
}

impl HistogramSnapshot {
    /// Mean observed latency, if anything was observed.
    pub fn mean(&self) -> Option<Duration> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as u32)
        }
    }

    /// Smallest bucket bound covering at least `q` of observations.
    ///
    /// Returns `None` when empty or when the quantile falls in the overflow
    /// bucket (no upper bound to report).
    pub fn quantile_bound(&self, q: f64) -> Option<Duration> {
        if self.count == 0 {
            return None;
        }
        let target = (self.count as f64 * q).ceil() as u64;
        let mut seen = 0;
        for (bound, n) in &self.buckets {
            seen += n;
            if seen >= target {
                return *bound;
            }
        }
        None
    }
}
