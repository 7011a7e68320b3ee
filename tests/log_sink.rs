use std::sync::Arc;
use std::time::Duration;

use ringleader::config::TrafficConfig;
use ringleader::sink::LogSink;
use ringleader::transport::serve;
use tokio::net::TcpListener;

mod cluster;
use crate::cluster::{transport_config, wait_until, ClusterBuilder};

#[tokio::test]
async fn records_end_up_in_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("files").join("logs.txt");

    let sink = Arc::new(LogSink::open(&path).await.unwrap());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let sink_address = listener.local_addr().unwrap().to_string();
    let sink_task = tokio::spawn(serve(listener, sink, transport_config()));

    let cluster = ClusterBuilder::new(1..=5)
        .sink(sink_address)
        .traffic(TrafficConfig {
            interval: Duration::from_millis(10)..Duration::from_millis(30),
            limit: Some(3),
        })
        .spawn()
        .await;

    // four followers, three records each
    let stored = wait_until(Duration::from_secs(5), || async {
        let content = tokio::fs::read_to_string(&path).await.unwrap_or_default();
        content.lines().count() == 12
    })
    .await;
    assert!(stored);

    let content = tokio::fs::read_to_string(&path).await.unwrap();
    for line in content.lines() {
        assert!(line.starts_with("device_id = "), "{line}");
        assert!(line.ends_with(" | leader = 4"), "{line}");
        assert!(!line.starts_with("device_id = 4 "), "{line}");
    }

    drop(cluster);
    sink_task.abort();
}
