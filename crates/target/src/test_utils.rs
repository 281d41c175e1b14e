//! Helpers for tests in dependent crates
//!
//! Builds hosts backed by an inspectable queue, without spawning delivery
//! tasks. Only meant for test code.

use std::sync::Arc;

use metro_metrics::LatencyHistogram;
use metro_record::Record;
use tokio::sync::mpsc;

use crate::host::{Host, HostConfig};

/// A host whose queue is exposed instead of being drained by a sender task.
pub fn queue_backed_host(name: &str, queue_size: usize) -> (Host, mpsc::Receiver<Record>) {
    Host::new_detached(
        "test",
        name,
        2003,
        HostConfig::default(),
        queue_size,
        Arc::new(LatencyHistogram::new()),
    )
}
