// HTTP routes driven through the router with tower's oneshot

mod common;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use common::FakeCluster;
use k8s_openapi::serde_json::{self, Value};
use nodeload::{CacheConfig, SnapshotCache, server};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn router(cluster: &Arc<FakeCluster>) -> (axum::Router, SnapshotCache) {
    let cache = SnapshotCache::new(cluster.clone(), &CacheConfig::default());
    (server::app(cache.clone(), Duration::from_secs(5)), cache)
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

#[tokio::test]
async fn test_nodes_endpoint_returns_snapshot_json() {
    let cluster = Arc::new(FakeCluster::uniform(2, 3));
    let (app, _) = router(&cluster);

    let (status, body) = get(app, "/api/nodes").await;
    assert_eq!(status, StatusCode::OK);

    let nodes: Value = serde_json::from_slice(&body).unwrap();
    let nodes = nodes.as_array().unwrap();
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0]["name"], "node-0");

    let pod = &nodes[0]["pods"][0];
    assert_eq!(pod["name"], "pod-0-0");
    assert_eq!(pod["cpu"], "100m");
    assert_eq!(pod["cpu_dec"], 100);
    assert_eq!(pod["memory"], "64Mi");
    assert_eq!(pod["memory_dec"], 64 * 1024 * 1024);
}

#[tokio::test]
async fn test_nodes_endpoint_reports_cold_failure() {
    let cluster = Arc::new(FakeCluster::uniform(1, 1));
    cluster.fail_node_listing(true);
    let (app, _) = router(&cluster);

    let (status, body) = get(app, "/api/nodes").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(String::from_utf8(body).unwrap().contains("connection refused"));
}

#[tokio::test]
async fn test_status_endpoint_does_not_populate() {
    let cluster = Arc::new(FakeCluster::uniform(1, 1));
    let (app, cache) = router(&cluster);

    let (status, body) = get(app.clone(), "/api/status").await;
    assert_eq!(status, StatusCode::OK);
    let value: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["state"], "empty");
    assert_eq!(value["node_count"], 0);
    assert_eq!(cluster.node_calls(), 0);

    cache.get().await.unwrap();

    let (_, body) = get(app, "/api/status").await;
    let value: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["state"], "fresh");
    assert_eq!(value["node_count"], 1);
    assert_eq!(value["ttl_ms"], 30_000);
    assert_eq!(value["refresh_successes"], 1);
    assert!(value["last_error"].is_null());
    assert!(value["produced_at"].is_string());
}

#[tokio::test]
async fn test_status_lists_degraded_nodes() {
    let cluster = Arc::new(FakeCluster::uniform(2, 1));
    cluster.fail_pod_listing_for("node-0");
    let (app, cache) = router(&cluster);

    cache.get().await.unwrap();

    let (_, body) = get(app, "/api/status").await;
    let value: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["warning_count"], 1);
    assert_eq!(value["warnings"][0]["node"], "node-0");
}

#[tokio::test]
async fn test_index_page_served() {
    let cluster = Arc::new(FakeCluster::default());
    let (app, _) = router(&cluster);

    let (status, body) = get(app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(body).unwrap().contains("api/nodes"));
}
