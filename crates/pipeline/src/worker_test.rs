//! Worker pool tests

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use metro_config::RulesFile;
use metro_metrics::PipelineMetricsProvider;
use metro_rules::Engine;
use metro_target::test_utils::queue_backed_host;
use metro_target::{Cluster, Policy};
use tokio::time::{sleep, timeout};

use crate::main_queue;
use crate::worker::WorkerPool;

fn single_cluster_engine(
    rules_toml: &str,
) -> (Arc<Engine>, tokio::sync::mpsc::Receiver<metro_record::Record>) {
    let (host, rx) = queue_backed_host("downstream", 1000);
    let cluster = Arc::new(Cluster::new("main", Policy::Broadcast, vec![host]));
    let clusters: HashMap<_, _> = [("main".to_string(), cluster)].into();
    let rules = RulesFile::from_str(rules_toml).unwrap();
    (Arc::new(Engine::compile(&rules, &clusters).unwrap()), rx)
}

const ROUTE_ALL: &str = r#"
[[route]]
match = '.'
clusters = ["main"]
"#;

#[tokio::test]
async fn workers_drain_the_queue_until_it_closes() {
    let (engine, mut host_rx) = single_cluster_engine(ROUTE_ALL);
    let (tx, rx) = main_queue(1000);

    let pool = WorkerPool::new(engine);
    let handle = pool.metrics_handle();
    let workers = pool.run(rx, 4);

    for i in 0..100 {
        tx.send(format!("m.{i} {i} 1700000000")).await.unwrap();
    }
    drop(tx);

    for task in workers {
        timeout(Duration::from_secs(5), task)
            .await
            .expect("worker did not exit after queue close")
            .unwrap();
    }

    let mut delivered = 0;
    while host_rx.try_recv().is_ok() {
        delivered += 1;
    }
    assert_eq!(delivered, 100);

    let s = handle.snapshot();
    assert_eq!(s.lines_processed, 100);
    assert_eq!(s.routed, 100);
    assert_eq!(s.parse_errors, 0);
    assert_eq!(s.unrouted, 0);
}

#[tokio::test]
async fn malformed_lines_are_counted_and_dropped() {
    let (engine, mut host_rx) = single_cluster_engine(ROUTE_ALL);
    let (tx, rx) = main_queue(100);

    let pool = WorkerPool::new(engine);
    let handle = pool.metrics_handle();
    let _workers = pool.run(rx, 1);

    tx.send("good 1 1700000000".into()).await.unwrap();
    tx.send("bad line".into()).await.unwrap();
    tx.send("".into()).await.unwrap();
    tx.send("also.good 2 1700000000".into()).await.unwrap();

    sleep(Duration::from_millis(200)).await;

    let s = handle.snapshot();
    assert_eq!(s.lines_processed, 4);
    assert_eq!(s.parse_errors, 2);
    assert_eq!(s.routed, 2);

    assert_eq!(host_rx.try_recv().unwrap().path, "good");
    assert_eq!(host_rx.try_recv().unwrap().path, "also.good");
    assert!(host_rx.try_recv().is_err());
}

#[tokio::test]
async fn unrouted_records_are_counted() {
    let (engine, mut host_rx) = single_cluster_engine(
        r#"
[[route]]
match = '^only\.'
clusters = ["main"]
"#,
    );
    let (tx, rx) = main_queue(100);

    let pool = WorkerPool::new(engine);
    let handle = pool.metrics_handle();
    let _workers = pool.run(rx, 1);

    tx.send("only.this 1 1700000000".into()).await.unwrap();
    tx.send("nothing.else 2 1700000000".into()).await.unwrap();

    sleep(Duration::from_millis(200)).await;

    let s = handle.snapshot();
    assert_eq!(s.routed, 1);
    assert_eq!(s.unrouted, 1);

    assert_eq!(host_rx.try_recv().unwrap().path, "only.this");
    assert!(host_rx.try_recv().is_err());
}
