//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use dual_listener::{with_bind_address, Server, ServerError, ServerOption};
use prometheus::proto::Metric;
use prometheus::Registry;
use tokio::task::JoinHandle;

/// Bind on loopback only.
pub fn loopback() -> ServerOption {
    with_bind_address(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Build a server from `options` (loopback added first) and start running it.
pub async fn start(
    options: Vec<ServerOption>,
) -> (Arc<Server>, JoinHandle<Vec<ServerError>>) {
    let mut all = vec![loopback()];
    all.extend(options);
    let server = Arc::new(Server::new(all).await.expect("server should bind"));
    let running = tokio::spawn({
        let server = server.clone();
        async move { server.run().await }
    });
    wait_ready(server.metrics_port(), "/metrics").await;
    (server, running)
}

/// Poll until `GET http://127.0.0.1:{port}{path}` answers at all.
pub async fn wait_ready(port: u16, path: &str) {
    let client = client();
    let url = format!("http://127.0.0.1:{port}{path}");
    for _ in 0..100 {
        if client.get(&url).send().await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{url} never became reachable");
}

/// Shut down with a generous deadline and assert both phases were clean.
pub async fn stop(server: Arc<Server>, running: JoinHandle<Vec<ServerError>>) {
    let errors = server.shutdown(Duration::from_secs(10)).await;
    assert!(errors.is_empty(), "shutdown errors: {errors:?}");
    let errors = tokio::time::timeout(Duration::from_secs(10), running)
        .await
        .expect("run should return after shutdown")
        .unwrap();
    assert!(errors.is_empty(), "run errors: {errors:?}");
}

/// Every series of metric family `name`, keyed by its full label set.
pub fn series(registry: &Registry, name: &str) -> Vec<(BTreeMap<String, String>, Metric)> {
    registry
        .gather()
        .into_iter()
        .filter(|f| f.get_name() == name)
        .flat_map(|f| f.get_metric().to_vec())
        .map(|m| {
            let labels = m
                .get_label()
                .iter()
                .map(|l| (l.get_name().to_string(), l.get_value().to_string()))
                .collect();
            (labels, m)
        })
        .collect()
}

pub fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
