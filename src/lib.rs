//! Per-node pod resource requests from a Kubernetes cluster, served from a
//! stale-while-revalidate snapshot cache.

pub mod error;
pub mod k8s;
pub mod model;
pub mod server;

pub use error::{Error, Result};
pub use k8s::cache::{CacheConfig, CacheState, SnapshotCache};
pub use model::{FetchWarning, Node, Pod, Snapshot};
