//! Periodic metrics reporter
//!
//! Collects snapshots from registered providers on a fixed interval and logs
//! them through `tracing`. Totals are diffed against the previous interval so
//! the log line carries rates, not just lifetime counts.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::histogram::LatencyHistogram;
use crate::traits::{
    HostMetricsProvider, HostSnapshot, ListenerMetricsProvider, ListenerSnapshot,
    PipelineMetricsProvider, PipelineSnapshot,
};

/// Periodic reporter over all registered metric providers
pub struct Reporter {
    interval: Duration,
    listeners: Vec<Arc<dyn ListenerMetricsProvider>>,
    pipeline: Option<Arc<dyn PipelineMetricsProvider>>,
    hosts: Vec<Arc<dyn HostMetricsProvider>>,
    latency: Option<Arc<LatencyHistogram>>,
}

impl Reporter {
    pub fn builder() -> ReporterBuilder {
        ReporterBuilder::default()
    }

    /// Run until cancelled, logging one summary per interval plus a final
    /// summary on shutdown.
    pub async fn run(self, cancel: CancellationToken) {
        let mut tick = tokio::time::interval(self.interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // first tick fires immediately; skip it so the first report covers
        // a full interval
        tick.tick().await;

        let mut prev_listeners: Vec<ListenerSnapshot> =
            vec![ListenerSnapshot::default(); self.listeners.len()];
        let mut prev_pipeline = PipelineSnapshot::default();
        let mut prev_hosts: Vec<HostSnapshot> = vec![HostSnapshot::default(); self.hosts.len()];

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {
                    self.report(&mut prev_listeners, &mut prev_pipeline, &mut prev_hosts);
                }
            }
        }

        self.report(&mut prev_listeners, &mut prev_pipeline, &mut prev_hosts);
        tracing::debug!("metrics reporter stopped");
    }

    fn report(
        &self,
        prev_listeners: &mut [ListenerSnapshot],
        prev_pipeline: &mut PipelineSnapshot,
        prev_hosts: &mut [HostSnapshot],
    ) {
        for (provider, prev) in self.listeners.iter().zip(prev_listeners.iter_mut()) {
            let s = provider.snapshot();
            tracing::info!(
                listener = provider.listener_id(),
                in_recs = s.in_recs,
                in_recs_delta = s.in_recs - prev.in_recs,
                throttled_in = s.throttled_in,
                connections_active = s.connections_active,
                oversized_lines = s.oversized_lines,
                read_errors = s.read_errors,
                "ingest"
            );
            *prev = s;
        }

        if let Some(ref pipeline) = self.pipeline {
            let s = pipeline.snapshot();
            tracing::info!(
                lines_processed = s.lines_processed,
                lines_delta = s.lines_processed - prev_pipeline.lines_processed,
                parse_errors = s.parse_errors,
                unrouted = s.unrouted,
                routed = s.routed,
                "pipeline"
            );
            *prev_pipeline = s;
        }

        for (provider, prev) in self.hosts.iter().zip(prev_hosts.iter_mut()) {
            let s = provider.snapshot();
            tracing::info!(
                cluster = provider.cluster(),
                host = provider.host(),
                available = provider.available(),
                out_recs = s.out_recs,
                out_recs_delta = s.out_recs - prev.out_recs,
                throttled_out = s.throttled_out,
                state_changes = s.state_changes,
                old_connection_refresh = s.old_connection_refresh,
                "egress"
            );
            *prev = s;
        }

        if let Some(ref latency) = self.latency {
            let s = latency.snapshot();
            if s.count > 0 {
                tracing::info!(
                    observations = s.count,
                    mean_us = s.mean().map(|d| d.as_micros() as u64).unwrap_or(0),
                    p99_bound_us = s
                        .quantile_bound(0.99)
                        .map(|d| d.as_micros() as u64),
                    "processing latency"
                );
            }
        }
    }
}

/// Builder for [`Reporter`]
#[derive(Default)]
pub struct ReporterBuilder {
    interval: Option<Duration>,
    listeners: Vec<Arc<dyn ListenerMetricsProvider>>,
    pipeline: Option<Arc<dyn PipelineMetricsProvider>>,
    hosts: Vec<Arc<dyn HostMetricsProvider>>,
    latency: Option<Arc<LatencyHistogram>>,
}

impl ReporterBuilder {
    #[must_use]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    #[must_use]
    pub fn listener(mut self, provider: Arc<dyn ListenerMetricsProvider>) -> Self {
        self.listeners.push(provider);
        self
    }

    #[must_use]
    pub fn pipeline(mut self, provider: Arc<dyn PipelineMetricsProvider>) -> Self {
        self.pipeline = Some(provider);
        self
    }

    #[must_use]
    pub fn hosts(mut self, providers: Vec<Arc<dyn HostMetricsProvider>>) -> Self {
        self.hosts.extend(providers);
        self
    }

    #[must_use]
    pub fn latency(mut self, histogram: Arc<LatencyHistogram>) -> Self {
        self.latency = Some(histogram);
        self
    }

    pub fn build(self) -> Reporter {
        Reporter {
            interval: self.interval.unwrap_or(Duration::from_secs(30)),
            listeners: self.listeners,
            pipeline: self.pipeline,
            hosts: self.hosts,
            latency: self.latency,
        }
    }
}
