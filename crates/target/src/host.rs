//! Per-host delivery actor
//!
//! One sender task drains the host queue and writes serialized records into
//! a buffered TCP connection. A second task flushes the buffer on a period
//! so low-rate hosts do not sit in the buffer indefinitely.
//!
//! # Connection cell
//!
//! The connection (socket + buffered writer + last-use instant) lives in a
//! `tokio::sync::Mutex<Option<Conn>>` shared by the sender and the flusher.
//! The lock is never held across a reconnect sleep or a channel operation;
//! dialing happens unlocked and the result is installed afterwards.
//!
//! # Reconnect
//!
//! After any write or flush error the connection is dropped and the sender
//! redials with a capped exponential backoff: the wait starts at zero (first
//! attempt dials immediately) and grows by `wait*2 + delta` up to the cap.
//! The current record is retried until it is written; it can be lost only if
//! the OS accepted part of it before the connection broke.
//!
//! # Availability
//!
//! `available` flips only through compare-and-set, and every edge (either
//! direction) bumps the host's `state_changes` counter, so flapping is
//! distinguishable from steady state. A failed first dial attempt marks the
//! host down; any successful dial marks it up.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use socket2::{SockRef, TcpKeepalive};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use metro_metrics::LatencyHistogram;
use metro_record::Record;

use crate::metrics::{HostMetrics, HostMetricsHandle};

/// Connection tuning for one host, copied from the upstream config section
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Deadline for one buffered write or flush
    pub send_timeout: Duration,

    /// Deadline for establishing a connection
    pub connect_timeout: Duration,

    /// TCP keepalive time, zero to disable
    pub keep_alive: Duration,

    /// Backoff cap
    pub max_reconnect_period: Duration,

    /// Additive backoff step
    pub reconnect_period_delta: Duration,

    /// Write buffer capacity in bytes
    pub buf_size: usize,

    /// Flusher period, zero to disable the flusher task
    pub buf_flush_period: Duration,

    /// Close and reopen connections unused for this long, zero to disable
    pub connection_refresh_period: Duration,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(5),
            keep_alive: Duration::from_secs(30),
            max_reconnect_period: Duration::from_secs(5),
            reconnect_period_delta: Duration::from_millis(10),
            buf_size: 4096,
            buf_flush_period: Duration::from_secs(2),
            connection_refresh_period: Duration::ZERO,
        }
    }
}

/// Live connection to a downstream host
struct Conn {
    writer: BufWriter<TcpStream>,
    last_use: Instant,
}

impl Conn {
    fn new(stream: TcpStream, buf_size: usize) -> Self {
        Self {
            writer: BufWriter::with_capacity(buf_size, stream),
            last_use: Instant::now(),
        }
    }
}

/// State shared between the host handle, the sender task and the flusher
struct HostShared {
    label: String,
    cluster: String,
    config: HostConfig,
    available: Arc<AtomicBool>,
    conn: Mutex<Option<Conn>>,
    metrics: Arc<HostMetrics>,
    latency: Arc<LatencyHistogram>,
}

/// Handle to a downstream host
///
/// Cheap to clone; clusters hold clones. Dropping every clone closes the
/// host queue, which lets the sender task drain, flush and exit.
#[derive(Clone)]
pub struct Host {
    shared: Arc<HostShared>,
    tx: mpsc::Sender<Record>,
}

/// Join handles for a host's background tasks
pub struct HostTasks {
    pub sender: JoinHandle<()>,
    pub flusher: Option<JoinHandle<()>>,
}

impl Host {
    /// Create a host and spawn its sender (and flusher, if enabled).
    pub fn spawn(
        cluster: impl Into<String>,
        name: &str,
        port: u16,
        config: HostConfig,
        queue_size: usize,
        latency: Arc<LatencyHistogram>,
    ) -> (Host, HostTasks) {
        let (host, rx) = Self::new_detached(cluster, name, port, config, queue_size, latency);

        let flush_cancel = CancellationToken::new();
        let flusher = if host.shared.config.buf_flush_period.is_zero() {
            None
        } else {
            let shared = Arc::clone(&host.shared);
            let cancel = flush_cancel.clone();
            Some(tokio::spawn(async move {
                run_flusher(shared, cancel).await;
            }))
        };

        let shared = Arc::clone(&host.shared);
        let sender = tokio::spawn(async move {
            run_sender(shared, rx, flush_cancel).await;
        });

        (host, HostTasks { sender, flusher })
    }

    /// Construct the host and its queue without spawning tasks.
    pub(crate) fn new_detached(
        cluster: impl Into<String>,
        name: &str,
        port: u16,
        config: HostConfig,
        queue_size: usize,
        latency: Arc<LatencyHistogram>,
    ) -> (Host, mpsc::Receiver<Record>) {
        let (tx, rx) = mpsc::channel(queue_size);
        let shared = Arc::new(HostShared {
            label: format!("{name}:{port}"),
            cluster: cluster.into(),
            config,
            available: Arc::new(AtomicBool::new(true)),
            conn: Mutex::new(None),
            metrics: Arc::new(HostMetrics::new()),
            latency,
        });
        (Host { shared, tx }, rx)
    }

    /// Queue a record for delivery. Non-blocking: a full queue drops the
    /// record and bumps `throttled_out`.
    pub fn push(&self, rec: Record) {
        if self.tx.try_send(rec).is_err() {
            self.shared.metrics.record_throttled();
        }
    }

    /// Last observed connect outcome.
    pub fn available(&self) -> bool {
        self.shared.available.load(Ordering::Relaxed)
    }

    /// `host:port` label.
    pub fn label(&self) -> &str {
        &self.shared.label
    }

    /// Reporting handle for this host's counters.
    pub fn metrics_handle(&self) -> HostMetricsHandle {
        HostMetricsHandle {
            cluster: self.shared.cluster.clone(),
            label: self.shared.label.clone(),
            metrics: Arc::clone(&self.shared.metrics),
            available: Arc::clone(&self.shared.available),
        }
    }

    #[cfg(test)]
    pub(crate) fn force_available(&self, up: bool) {
        self.shared.available.store(up, Ordering::Relaxed);
    }

    #[cfg(test)]
    pub(crate) fn state_changes(&self) -> u64 {
        self.shared
            .metrics
            .state_changes
            .load(Ordering::Relaxed)
    }

    #[cfg(test)]
    pub(crate) fn set_available_cas(&self, up: bool) {
        self.shared.set_available(up);
    }
}

/// Sender loop: drain the queue, then final flush.
async fn run_sender(
    shared: Arc<HostShared>,
    mut rx: mpsc::Receiver<Record>,
    flush_cancel: CancellationToken,
) {
    tracing::debug!(host = %shared.label, "host sender starting");

    while let Some(rec) = rx.recv().await {
        shared.send_record(&rec).await;
    }

    // queue closed: push out whatever is still buffered
    shared.flush_if_necessary().await;
    flush_cancel.cancel();

    tracing::debug!(
        host = %shared.label,
        out_recs = shared.metrics.out_recs.load(Ordering::Relaxed),
        "host sender stopped"
    );
}

/// Flusher loop: periodically flush buffered bytes while the sender is idle.
async fn run_flusher(shared: Arc<HostShared>, cancel: CancellationToken) {
    let mut tick = tokio::time::interval(shared.config.buf_flush_period);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    tick.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tick.tick() => shared.flush_if_necessary().await,
        }
    }
}

impl HostShared {
    /// Write one record, retrying with reconnects until it succeeds.
    async fn send_record(&self, rec: &Record) {
        let line = rec.serialize();

        loop {
            self.ensure_connection().await;

            let mut cell = self.conn.lock().await;
            self.refresh_if_stale(&mut cell);
            let Some(conn) = cell.as_mut() else {
                // refreshed away (or the flusher hit an error); redial
                continue;
            };

            match timeout(self.config.send_timeout, conn.writer.write_all(line.as_bytes())).await {
                Ok(Ok(())) => {
                    self.metrics.record_sent();
                    self.latency.observe(rec.received_at.elapsed());
                    conn.last_use = Instant::now();
                    return;
                }
                Ok(Err(e)) => {
                    tracing::warn!(host = %self.label, error = %e, "write failed, reconnecting");
                    *cell = None;
                }
                Err(_) => {
                    tracing::warn!(host = %self.label, "write timed out, reconnecting");
                    *cell = None;
                }
            }
        }
    }

    /// Dial until a connection is installed. Sleeps happen unlocked; only
    /// the install takes the connection lock.
    async fn ensure_connection(&self) {
        if self.conn.lock().await.is_some() {
            return;
        }

        let mut wait = Duration::ZERO;
        let mut first_attempt = true;

        loop {
            tokio::time::sleep(wait).await;
            wait = next_backoff(
                wait,
                self.config.reconnect_period_delta,
                self.config.max_reconnect_period,
            );

            match self.dial().await {
                Ok(stream) => {
                    *self.conn.lock().await = Some(Conn::new(stream, self.config.buf_size));
                    self.set_available(true);
                    tracing::debug!(host = %self.label, "connected");
                    return;
                }
                Err(e) => {
                    tracing::warn!(host = %self.label, error = %e, "connection to host failed");
                    if first_attempt {
                        self.set_available(false);
                    }
                }
            }
            first_attempt = false;
        }
    }

    async fn dial(&self) -> io::Result<TcpStream> {
        let stream = timeout(self.config.connect_timeout, TcpStream::connect(&self.label))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??;

        if !self.config.keep_alive.is_zero() {
            let keepalive = TcpKeepalive::new().with_time(self.config.keep_alive);
            #[cfg(target_os = "linux")]
            let keepalive = keepalive.with_interval(self.config.keep_alive);

            if let Err(e) = SockRef::from(&stream).set_tcp_keepalive(&keepalive) {
                tracing::debug!(host = %self.label, error = %e, "failed to set TCP keepalive");
            }
        }

        Ok(stream)
    }

    /// Drop a connection that has been idle past the refresh period. The
    /// caller's retry loop redials before the next write.
    fn refresh_if_stale(&self, cell: &mut Option<Conn>) {
        let period = self.config.connection_refresh_period;
        if period.is_zero() {
            return;
        }
        if let Some(conn) = cell {
            if conn.last_use.elapsed() > period {
                self.metrics.record_refresh();
                tracing::debug!(host = %self.label, "refreshing stale connection");
                *cell = None;
            }
        }
    }

    /// Flush buffered bytes if there are any. Errors drop the connection
    /// and with it the buffered bytes.
    async fn flush_if_necessary(&self) {
        let mut cell = self.conn.lock().await;
        let Some(conn) = cell.as_mut() else { return };
        if conn.writer.buffer().is_empty() {
            return;
        }

        match timeout(self.config.send_timeout, conn.writer.flush()).await {
            Ok(Ok(())) => conn.last_use = Instant::now(),
            Ok(Err(e)) => {
                tracing::warn!(host = %self.label, error = %e, "flush failed, dropping connection");
                *cell = None;
            }
            Err(_) => {
                tracing::warn!(host = %self.label, "flush timed out, dropping connection");
                *cell = None;
            }
        }
    }

    /// Flip `available` by compare-and-set; each observed edge counts.
    fn set_available(&self, up: bool) {
        if self
            .available
            .compare_exchange(!up, up, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
        {
            self.metrics.record_state_change();
        }
    }
}

/// Backoff step: `min(cap, wait*2 + delta)`.
fn next_backoff(wait: Duration, delta: Duration, cap: Duration) -> Duration {
    (wait * 2 + delta).min(cap)
}

#[cfg(test)]
#[path = "host_test.rs"]
mod host_test;
