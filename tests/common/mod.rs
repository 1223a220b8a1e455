// Shared test helpers: an in-memory cluster that records how it is called

#![allow(dead_code)]

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Container, Node, Pod, PodSpec, ResourceRequirements};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use nodeload::error::{Error, Result};
use nodeload::k8s::source::ClusterDataSource;
use nodeload::SnapshotCache;
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Default)]
pub struct FakeCluster {
    nodes: Vec<Node>,
    pods: Vec<Pod>,
    nodes_delay: Mutex<Duration>,
    pods_delay: Mutex<Duration>,
    fail_nodes: AtomicBool,
    failing_pod_nodes: Mutex<HashSet<String>>,
    pub list_nodes_calls: AtomicUsize,
    pub list_pods_calls: AtomicUsize,
    pub completed_pod_listings: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeCluster {
    pub fn new(nodes: Vec<Node>, pods: Vec<Pod>) -> Self {
        Self {
            nodes,
            pods,
            ..Default::default()
        }
    }

    /// `node_count` nodes named `node-N`, each running `pods_per_node` pods
    pub fn uniform(node_count: usize, pods_per_node: usize) -> Self {
        let nodes = (0..node_count).map(|n| node(&format!("node-{n}"))).collect();
        let pods = (0..node_count)
            .flat_map(|n| {
                (0..pods_per_node).map(move |p| {
                    pod(
                        &format!("pod-{n}-{p}"),
                        &format!("node-{n}"),
                        &[(Some("100m"), Some("64Mi"))],
                    )
                })
            })
            .collect();
        Self::new(nodes, pods)
    }

    pub fn set_nodes_delay(&self, delay: Duration) {
        *self.nodes_delay.lock().unwrap() = delay;
    }

    pub fn set_pods_delay(&self, delay: Duration) {
        *self.pods_delay.lock().unwrap() = delay;
    }

    pub fn fail_node_listing(&self, fail: bool) {
        self.fail_nodes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_pod_listing_for(&self, node_name: &str) {
        self.failing_pod_nodes
            .lock()
            .unwrap()
            .insert(node_name.to_string());
    }

    pub fn node_calls(&self) -> usize {
        self.list_nodes_calls.load(Ordering::SeqCst)
    }

    pub fn pod_calls(&self) -> usize {
        self.list_pods_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClusterDataSource for FakeCluster {
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        self.list_nodes_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.nodes_delay.lock().unwrap();
        tokio::time::sleep(delay).await;

        if self.fail_nodes.load(Ordering::SeqCst) {
            return Err(Error::Custom("connection refused".to_string()));
        }
        Ok(self.nodes.clone())
    }

    async fn list_pods(&self, node_name: &str) -> Result<Vec<Pod>> {
        self.list_pods_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.pods_delay.lock().unwrap();
        tokio::time::sleep(delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed_pod_listings.fetch_add(1, Ordering::SeqCst);

        if self.failing_pod_nodes.lock().unwrap().contains(node_name) {
            return Err(Error::Custom(format!("pods on {node_name} forbidden")));
        }

        Ok(self
            .pods
            .iter()
            .filter(|p| {
                p.spec.as_ref().and_then(|s| s.node_name.as_deref()) == Some(node_name)
            })
            .cloned()
            .collect())
    }
}

pub fn node(name: &str) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// A pod on `node_name` with one container per `(cpu, memory)` request pair
pub fn pod(name: &str, node_name: &str, containers: &[(Option<&str>, Option<&str>)]) -> Pod {
    let containers = containers
        .iter()
        .enumerate()
        .map(|(i, (cpu, memory))| {
            let mut requests = BTreeMap::new();
            if let Some(cpu) = cpu {
                requests.insert("cpu".to_string(), Quantity((*cpu).to_string()));
            }
            if let Some(memory) = memory {
                requests.insert("memory".to_string(), Quantity((*memory).to_string()));
            }
            Container {
                name: format!("c{i}"),
                resources: Some(ResourceRequirements {
                    requests: Some(requests),
                    ..Default::default()
                }),
                ..Default::default()
            }
        })
        .collect();

    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: Some(PodSpec {
            node_name: Some(node_name.to_string()),
            containers,
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Wait for the background refresh currently in flight, if any, to finish
pub async fn wait_until_idle(cache: &SnapshotCache) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while cache.is_refreshing() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("background refresh did not finish");
}
