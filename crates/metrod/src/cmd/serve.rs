//! Serve command - run the relay
//!
//! Wires the pipeline together and supervises it until a stop signal:
//! listeners feed the main queue, workers classify and dispatch, host
//! senders deliver. Shutdown runs in pipeline order so that every accepted
//! record is attempted at least once:
//!
//! 1. listeners stop accepting and drain inbound connections,
//! 2. the main queue closes and workers drain it,
//! 3. host queues close and senders drain, flush and disconnect.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use metro_config::{
    parse_listen_addr, split_host_port, ClustersFile, Config, LogConfig, LogFormat, LogOutput,
    PolicyConfig, RulesFile,
};
use metro_metrics::{
    HostMetricsProvider, LatencyHistogram, ListenerMetricsProvider, Reporter,
};
use metro_pipeline::WorkerPool;
use metro_rules::Engine;
use metro_sources::{
    IngestError, LineSender, ListenerMetrics, TcpIngest, TcpIngestConfig, UdpIngest,
    UdpIngestConfig,
};
use metro_target::{Cluster, HostConfig, HostTasks, Policy};

pub async fn run(config_path: PathBuf, log_level: Option<String>) -> Result<()> {
    let config = Config::from_file(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    init_logging(&config.log, log_level.as_deref())?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        "metro starting"
    );

    let rules = RulesFile::from_file(&config.rules_file)
        .with_context(|| format!("failed to load rules file {}", config.rules_file))?;
    let clusters = ClustersFile::from_file(&config.clusters_file)
        .with_context(|| format!("failed to load clusters file {}", config.clusters_file))?;

    run_daemon(config, rules, clusters).await?;

    info!("metro shutdown complete");
    Ok(())
}

fn init_logging(log: &LogConfig, override_level: Option<&str>) -> Result<()> {
    let level = override_level.unwrap_or_else(|| log.level.as_str());
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow!("invalid log level: {e}"))?;

    let registry = tracing_subscriber::registry().with(filter);
    match (log.format, &log.output) {
        (LogFormat::Console, LogOutput::Stdout) => {
            registry.with(fmt::layer().with_target(true)).init()
        }
        (LogFormat::Console, LogOutput::Stderr) => registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init(),
        (LogFormat::Json, LogOutput::Stdout) => {
            registry.with(fmt::layer().json().with_target(true)).init()
        }
        (LogFormat::Json, LogOutput::Stderr) => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
    Ok(())
}

async fn run_daemon(config: Config, rules: RulesFile, clusters: ClustersFile) -> Result<()> {
    let cancel = CancellationToken::new();
    let latency = Arc::new(LatencyHistogram::new());

    let host_config = HostConfig {
        send_timeout: config.upstream.send_timeout,
        connect_timeout: config.upstream.connect_timeout,
        keep_alive: config.upstream.keep_alive,
        max_reconnect_period: config.upstream.max_reconnect_period,
        reconnect_period_delta: config.upstream.reconnect_period_delta,
        buf_size: config.upstream.buf_size,
        buf_flush_period: config.upstream.buf_flush_period,
        connection_refresh_period: config.upstream.connection_refresh_period,
    };

    // Build hosts and clusters. Hosts spawn their sender/flusher tasks
    // immediately; queues stay open until the handles are dropped.
    let mut host_tasks: Vec<HostTasks> = Vec::new();
    let mut host_metrics: Vec<Arc<dyn HostMetricsProvider>> = Vec::new();
    let mut cluster_map: HashMap<String, Arc<Cluster>> = HashMap::new();

    for cluster_cfg in &clusters.cluster {
        let mut hosts = Vec::with_capacity(cluster_cfg.hosts.len());
        for entry in &cluster_cfg.hosts {
            let (name, port) = split_host_port(entry)
                .map_err(|m| anyhow!("cluster '{}', host {entry:?}: {m}", cluster_cfg.name))?;
            let port = port.unwrap_or(config.upstream.target_port);

            let (host, tasks) = metro_target::Host::spawn(
                &cluster_cfg.name,
                name,
                port,
                host_config.clone(),
                config.pipeline.host_queue_size,
                Arc::clone(&latency),
            );
            host_metrics.push(Arc::new(host.metrics_handle()));
            host_tasks.push(tasks);
            hosts.push(host);
        }

        let policy = match cluster_cfg.policy {
            PolicyConfig::Jump => Policy::Jump,
            PolicyConfig::Broadcast => Policy::Broadcast,
            PolicyConfig::Lb => Policy::Lb {
                fallback_to_all: cluster_cfg.lb_fallback_to_all,
            },
        };

        info!(
            cluster = %cluster_cfg.name,
            policy = ?cluster_cfg.policy,
            hosts = cluster_cfg.hosts.len(),
            "cluster configured"
        );
        cluster_map.insert(
            cluster_cfg.name.clone(),
            Arc::new(Cluster::new(&cluster_cfg.name, policy, hosts)),
        );
    }

    let engine = Arc::new(
        Engine::compile(&rules, &cluster_map).context("failed to compile routing rules")?,
    );
    drop(cluster_map);

    info!(
        rewrites = engine.rewrite_count(),
        routes = engine.route_count(),
        "rule engine compiled"
    );

    // Main queue and worker pool
    let (line_tx, line_rx) = metro_pipeline::main_queue(config.pipeline.main_queue_size);
    let pool = WorkerPool::new(Arc::clone(&engine));
    let pipeline_metrics = pool.metrics_handle();
    let worker_count = config.pipeline.effective_workers();
    let workers = pool.run(line_rx, worker_count);

    // Listeners
    let mut listener_tasks: Vec<(&'static str, JoinHandle<Result<(), IngestError>>)> = Vec::new();
    let mut listener_metrics: Vec<Arc<dyn ListenerMetricsProvider>> = Vec::new();

    if config.listen.tcp_enabled() {
        let addr = parse_listen_addr(&config.listen.tcp)?;
        let metrics = Arc::new(ListenerMetrics::new());
        let ingest = TcpIngest::new(
            TcpIngestConfig {
                addr,
                idle_timeout: config.listen.idle_timeout,
                max_line_len: config.listen.max_line_len,
            },
            LineSender::new(line_tx.clone(), Arc::clone(&metrics)),
            metrics,
        );
        listener_metrics.push(Arc::new(ingest.metrics_handle()));
        listener_tasks.push(("tcp", tokio::spawn(ingest.run(cancel.clone()))));
    }

    if config.listen.udp_enabled() {
        let addr = parse_listen_addr(&config.listen.udp)?;
        let metrics = Arc::new(ListenerMetrics::new());
        let ingest = UdpIngest::new(
            UdpIngestConfig { addr },
            LineSender::new(line_tx.clone(), Arc::clone(&metrics)),
            metrics,
        );
        listener_metrics.push(Arc::new(ingest.metrics_handle()));
        listener_tasks.push(("udp", tokio::spawn(ingest.run(cancel.clone()))));
    }

    // Metrics reporter
    let reporter_task = if config.metrics.enabled {
        let mut builder = Reporter::builder()
            .interval(config.metrics.interval)
            .pipeline(Arc::new(pipeline_metrics))
            .hosts(host_metrics)
            .latency(Arc::clone(&latency));
        for handle in &listener_metrics {
            builder = builder.listener(Arc::clone(handle));
        }
        Some(tokio::spawn(builder.build().run(cancel.clone())))
    } else {
        info!("metrics reporting disabled");
        None
    };

    info!(
        workers = worker_count,
        listeners = listener_tasks.len(),
        "metro running"
    );

    wait_for_shutdown().await;
    info!("shutdown signal received, stopping");

    cancel.cancel();

    // 1. listeners stop accepting, drain inbound connections, drop their
    //    queue senders
    let listener_grace = config.listen.idle_timeout + Duration::from_secs(5);
    for (id, task) in listener_tasks {
        match tokio::time::timeout(listener_grace, task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => warn!(listener = id, error = %e, "listener exited with error"),
            Ok(Err(e)) => warn!(listener = id, error = %e, "listener task panicked"),
            Err(_) => warn!(listener = id, "listener did not stop within grace period"),
        }
    }

    // 2. close the main queue (this was the last sender) and let workers
    //    drain it to empty
    drop(line_tx);
    info!("draining the main queue");
    for task in workers {
        if let Err(e) = task.await {
            warn!(error = %e, "worker task panicked");
        }
    }

    // 3. dropping the engine drops clusters and host handles, closing every
    //    host queue; senders drain, flush and disconnect
    drop(engine);
    info!("draining host queues");
    let drain_timeout = config.upstream.send_timeout
        + config.upstream.max_reconnect_period
        + Duration::from_secs(5);
    for tasks in host_tasks {
        match tokio::time::timeout(drain_timeout, tasks.sender).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "host sender panicked"),
            Err(_) => warn!("host sender did not drain within timeout"),
        }
        if let Some(flusher) = tasks.flusher {
            let _ = tokio::time::timeout(Duration::from_secs(1), flusher).await;
        }
    }

    if let Some(task) = reporter_task {
        task.abort();
    }

    Ok(())
}

/// Block until SIGINT or SIGTERM.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler, using Ctrl-C only");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
