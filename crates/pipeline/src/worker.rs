//! Worker pool

use std::sync::Arc;

use crossfire::MAsyncRx;
use tokio::task::JoinHandle;

use metro_record::Record;
use metro_rules::Engine;

use crate::metrics::{PipelineMetrics, PipelineMetricsHandle};

/// Fixed pool of workers draining the main queue
///
/// Each worker runs the same loop: receive a line, parse, classify through
/// the shared rule engine, dispatch. Workers exit when the queue closes,
/// which happens once every listener has shut down.
pub struct WorkerPool {
    engine: Arc<Engine>,
    metrics: Arc<PipelineMetrics>,
}

impl WorkerPool {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    /// Reporting handle, valid after `run()` consumes the pool.
    pub fn metrics_handle(&self) -> PipelineMetricsHandle {
        PipelineMetricsHandle {
            metrics: Arc::clone(&self.metrics),
        }
    }

    /// Spawn `workers` tasks sharing the queue receiver.
    pub fn run(self, rx: MAsyncRx<String>, workers: usize) -> Vec<JoinHandle<()>> {
        tracing::info!(
            workers,
            rewrites = self.engine.rewrite_count(),
            routes = self.engine.route_count(),
            "worker pool starting"
        );

        let pool = Arc::new(self);
        (0..workers)
            .map(|worker_id| {
                let pool = Arc::clone(&pool);
                let rx = rx.clone();
                tokio::spawn(async move {
                    tracing::debug!(worker_id, "worker starting");
                    while let Ok(line) = rx.recv().await {
                        pool.handle_line(&line);
                    }
                    tracing::debug!(worker_id, "worker stopped");
                })
            })
            .collect()
    }

    /// Hot path: parse and route one line.
    fn handle_line(&self, line: &str) {
        self.metrics.record_line();

        match Record::parse(line) {
            Ok(rec) => {
                if self.engine.process(rec) {
                    self.metrics.record_routed();
                } else {
                    self.metrics.record_unrouted();
                    tracing::trace!(line, "no routing rule matched");
                }
            }
            Err(e) => {
                self.metrics.record_parse_error();
                tracing::debug!(error = %e, line, "dropping malformed line");
            }
        }
    }
}

#[cfg(test)]
#[path = "worker_test.rs"]
mod worker_test;
