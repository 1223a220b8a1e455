/**
 * Node / Pod records built from cluster descriptors and the snapshot that holds them
 */
use crate::k8s::quantity::{cpu_or_zero, format_cpu, format_memory, memory_or_zero};
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{Container, Node as K8sNode, Pod as K8sPod};
use serde::Serialize;

const CPU_KEY: &str = "cpu";
const MEMORY_KEY: &str = "memory";

/// A pod and the sum of its containers' resource requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pod {
    pub name: String,
    /// Human readable memory request, e.g. `256Mi`
    pub memory: String,
    /// Human readable CPU request, e.g. `300m`
    pub cpu: String,
    /// Memory request in bytes
    pub memory_dec: u64,
    /// CPU request in millicores
    pub cpu_dec: u64,
}

impl Pod {
    #[must_use]
    pub fn new(name: impl Into<String>, cpu_millis: u64, memory_bytes: u64) -> Self {
        Self {
            name: name.into(),
            memory: format_memory(memory_bytes),
            cpu: format_cpu(cpu_millis),
            memory_dec: memory_bytes,
            cpu_dec: cpu_millis,
        }
    }

    /// Map a pod descriptor to its aggregated request record.
    ///
    /// Only regular containers' `requests` are summed; limits, init
    /// containers and pod overhead are not considered.
    #[must_use]
    pub fn from_k8s(pod: &K8sPod) -> Self {
        let name = pod.metadata.name.clone().unwrap_or_else(|| "unknown".to_string());
        let containers = pod.spec.as_ref().map_or(&[][..], |spec| spec.containers.as_slice());

        let cpu = containers
            .iter()
            .map(|c| cpu_or_zero(container_request(c, CPU_KEY)))
            .fold(0_u64, u64::saturating_add);
        let memory = containers
            .iter()
            .map(|c| memory_or_zero(container_request(c, MEMORY_KEY)))
            .fold(0_u64, u64::saturating_add);

        Self::new(name, cpu, memory)
    }
}

fn container_request<'a>(
    container: &'a Container,
    key: &str,
) -> Option<&'a k8s_openapi::apimachinery::pkg::api::resource::Quantity> {
    container.resources.as_ref()?.requests.as_ref()?.get(key)
}

/// A node and the pods scheduled on it, in listing order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub name: String,
    pub pods: Vec<Pod>,
}

impl Node {
    #[must_use]
    pub fn new(name: impl Into<String>, pods: Vec<Pod>) -> Self {
        Self {
            name: name.into(),
            pods,
        }
    }

    /// Name of a node descriptor, if it has one
    #[must_use]
    pub fn name_of(node: &K8sNode) -> Option<&str> {
        node.metadata.name.as_deref()
    }

    /// Build a node record from its pod descriptors
    #[must_use]
    pub fn from_k8s(name: impl Into<String>, pods: &[K8sPod]) -> Self {
        Self::new(name, pods.iter().map(Pod::from_k8s).collect())
    }

    #[must_use]
    pub fn total_cpu(&self) -> u64 {
        self.pods.iter().map(|p| p.cpu_dec).fold(0, u64::saturating_add)
    }

    #[must_use]
    pub fn total_memory(&self) -> u64 {
        self.pods.iter().map(|p| p.memory_dec).fold(0, u64::saturating_add)
    }
}

/// Pod listing for one node failed; the node is kept with no pods
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchWarning {
    pub node: String,
    pub message: String,
}

/// One complete, immutable result of a refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub nodes: Vec<Node>,
    pub produced_at: DateTime<Utc>,
    pub warnings: Vec<FetchWarning>,
}

impl Snapshot {
    #[must_use]
    pub fn new(nodes: Vec<Node>, warnings: Vec<FetchWarning>) -> Self {
        Self {
            nodes,
            produced_at: Utc::now(),
            warnings,
        }
    }

    #[must_use]
    pub fn pod_count(&self) -> usize {
        self.nodes.iter().map(|n| n.pods.len()).sum()
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }

    #[must_use]
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }
}
