//! Queue sizing and worker pool configuration

use serde::Deserialize;

/// Main queue and worker pool settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Capacity of the main ingest queue (raw lines)
    pub main_queue_size: usize,

    /// Capacity of each per-host record queue
    pub host_queue_size: usize,

    /// Worker tasks draining the main queue. 0 = available parallelism.
    pub workers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            main_queue_size: 50_000,
            host_queue_size: 10_000,
            workers: 0,
        }
    }
}

impl PipelineConfig {
    /// Configured worker count, or available parallelism when auto.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        }
    }
}
