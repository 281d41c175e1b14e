//! metro - Pipeline
//!
//! The worker pool between ingest and delivery.
//!
//! ```text
//! [Listeners]                 [Workers]                    [Targets]
//!    TCP ──┐                 ┌─ parse ─ rules ─ dispatch ──► cluster/hosts
//!    UDP ──┴─► main queue ──┼─ parse ─ rules ─ dispatch ──► cluster/hosts
//!                            └─ ...
//! ```
//!
//! Workers are stateless and independent: each takes raw lines off the
//! shared bounded queue, parses them, runs the rule engine and hands copies
//! to the selected host queues. Scaling is horizontal in worker count.
//! Relative order of distinct records across workers is not preserved.

mod metrics;
mod worker;

pub use metrics::{PipelineMetrics, PipelineMetricsHandle};
pub use worker::WorkerPool;

use crossfire::{MAsyncRx, MAsyncTx};

/// Create the bounded main queue shared by all listeners and workers.
pub fn main_queue(capacity: usize) -> (MAsyncTx<String>, MAsyncRx<String>) {
    crossfire::mpmc::bounded_async(capacity)
}
