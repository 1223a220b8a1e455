//! Cluster data source: the two list calls a refresh is built from
//!
//! The cache only depends on the [`ClusterDataSource`] trait so it can be
//! driven by an in-memory source in tests. [`KubeDataSource`] is the
//! production implementation on top of `kube::Api`.

use crate::error::Result;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::api::{Api, ListParams};
use kube::Client;
use tracing::debug;

/// Field that binds a pod to the node it was scheduled on
const NODE_NAME_FIELD: &str = "spec.nodeName";

#[async_trait]
pub trait ClusterDataSource: Send + Sync {
    /// List every node in the cluster, in API order
    async fn list_nodes(&self) -> Result<Vec<Node>>;

    /// List the pods assigned to `node_name`
    async fn list_pods(&self, node_name: &str) -> Result<Vec<Pod>>;
}

/// [`ClusterDataSource`] backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeDataSource {
    client: Client,
    namespace: Option<String>,
}

impl KubeDataSource {
    /// Pods are listed across all namespaces unless `namespace` is given
    #[must_use]
    pub fn new(client: Client, namespace: Option<String>) -> Self {
        Self {
            client,
            namespace: namespace.filter(|ns| !ns.is_empty()),
        }
    }

    fn pods_api(&self) -> Api<Pod> {
        self.namespace.as_deref().map_or_else(
            || Api::all(self.client.clone()),
            |ns| Api::namespaced(self.client.clone(), ns),
        )
    }
}

/// List params selecting the pods scheduled on `node_name`
#[must_use]
pub fn pods_on_node(node_name: &str) -> ListParams {
    ListParams::default().fields(&format!("{NODE_NAME_FIELD}={node_name}"))
}

#[async_trait]
impl ClusterDataSource for KubeDataSource {
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        let list = nodes.list(&ListParams::default()).await?;
        debug!("Listed {} nodes", list.items.len());
        Ok(list.items)
    }

    async fn list_pods(&self, node_name: &str) -> Result<Vec<Pod>> {
        debug!("Fetching pods for node {}", node_name);
        let list = self.pods_api().list(&pods_on_node(node_name)).await?;
        Ok(list.items)
    }
}
