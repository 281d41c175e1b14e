//! TCP ingest tests

use std::sync::Arc;
use std::time::Duration;

use crossfire::MAsyncRx;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

use crate::common::{LineSender, ListenerMetrics};
use crate::tcp::{TcpIngest, TcpIngestConfig};
use crate::IngestError;

async fn find_available_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

struct Fixture {
    port: u16,
    rx: MAsyncRx<String>,
    metrics: Arc<ListenerMetrics>,
    cancel: CancellationToken,
    task: JoinHandle<Result<(), IngestError>>,
}

async fn start(idle_timeout: Duration, max_line_len: usize) -> Fixture {
    let port = find_available_port().await;
    let (tx, rx) = crossfire::mpmc::bounded_async::<String>(100);
    let metrics = Arc::new(ListenerMetrics::new());
    let cancel = CancellationToken::new();

    let ingest = TcpIngest::new(
        TcpIngestConfig {
            addr: format!("127.0.0.1:{port}").parse().unwrap(),
            idle_timeout,
            max_line_len,
        },
        LineSender::new(tx, Arc::clone(&metrics)),
        Arc::clone(&metrics),
    );

    let task = tokio::spawn(ingest.run(cancel.clone()));
    // give the listener a moment to bind
    sleep(Duration::from_millis(50)).await;

    Fixture {
        port,
        rx,
        metrics,
        cancel,
        task,
    }
}

async fn recv_line(rx: &MAsyncRx<String>) -> String {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for line")
        .expect("queue closed")
}

#[tokio::test]
async fn lines_reach_the_main_queue() {
    let f = start(Duration::from_secs(30), 8192).await;

    let mut client = TcpStream::connect(("127.0.0.1", f.port)).await.unwrap();
    client.write_all(b"a.b 1 100\nc.d 2 200\n").await.unwrap();

    assert_eq!(recv_line(&f.rx).await, "a.b 1 100");
    assert_eq!(recv_line(&f.rx).await, "c.d 2 200");

    let s = f.metrics.snapshot();
    assert_eq!(s.in_recs, 2);
    assert_eq!(s.connections_total, 1);

    f.cancel.cancel();
    f.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn partial_line_waits_for_terminator() {
    let f = start(Duration::from_secs(30), 8192).await;

    let mut client = TcpStream::connect(("127.0.0.1", f.port)).await.unwrap();
    client.write_all(b"a.b 1").await.unwrap();
    client.flush().await.unwrap();
    sleep(Duration::from_millis(100)).await;
    client.write_all(b" 100\n").await.unwrap();

    assert_eq!(recv_line(&f.rx).await, "a.b 1 100");

    f.cancel.cancel();
    f.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn unterminated_tail_is_discarded_on_close() {
    let f = start(Duration::from_secs(30), 8192).await;

    let mut client = TcpStream::connect(("127.0.0.1", f.port)).await.unwrap();
    client.write_all(b"full 1 100\ndangling 2").await.unwrap();
    drop(client);

    assert_eq!(recv_line(&f.rx).await, "full 1 100");

    // connection reader observed EOF; nothing else may arrive
    sleep(Duration::from_millis(100)).await;
    assert_eq!(f.metrics.snapshot().in_recs, 1);

    f.cancel.cancel();
    f.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn oversized_lines_are_skipped() {
    let f = start(Duration::from_secs(30), 16).await;

    let mut client = TcpStream::connect(("127.0.0.1", f.port)).await.unwrap();
    let long = "x".repeat(100);
    client
        .write_all(format!("{long} 1 100\nok 1 100\n").as_bytes())
        .await
        .unwrap();

    assert_eq!(recv_line(&f.rx).await, "ok 1 100");
    assert_eq!(f.metrics.snapshot().oversized_lines, 1);

    f.cancel.cancel();
    f.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn crlf_terminator_is_stripped() {
    let f = start(Duration::from_secs(30), 8192).await;

    let mut client = TcpStream::connect(("127.0.0.1", f.port)).await.unwrap();
    client.write_all(b"a.b 1 100\r\n").await.unwrap();

    assert_eq!(recv_line(&f.rx).await, "a.b 1 100");

    f.cancel.cancel();
    f.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn idle_connection_is_closed() {
    let f = start(Duration::from_millis(200), 8192).await;

    let _client = TcpStream::connect(("127.0.0.1", f.port)).await.unwrap();
    sleep(Duration::from_millis(100)).await;
    assert_eq!(f.metrics.snapshot().connections_active, 1);

    // no traffic: the idle deadline fires and the server side closes
    sleep(Duration::from_millis(600)).await;
    let s = f.metrics.snapshot();
    assert_eq!(s.connections_active, 0);
    assert_eq!(s.connections_total, 1);

    f.cancel.cancel();
    f.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn shutdown_waits_for_open_connections() {
    let f = start(Duration::from_secs(1), 8192).await;

    let mut client = TcpStream::connect(("127.0.0.1", f.port)).await.unwrap();
    client.write_all(b"early 1 100\n").await.unwrap();
    assert_eq!(recv_line(&f.rx).await, "early 1 100");

    f.cancel.cancel();
    // run() returns once the acceptor and the reader have both stopped
    timeout(Duration::from_secs(5), f.task)
        .await
        .expect("listener did not shut down")
        .unwrap()
        .unwrap();
    assert_eq!(f.metrics.snapshot().connections_active, 0);
}
