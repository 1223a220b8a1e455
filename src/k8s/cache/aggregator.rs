use crate::error::{Error, Result};
use crate::k8s::source::ClusterDataSource;
use crate::model::{FetchWarning, Node, Snapshot};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Builds one complete [`Snapshot`]: list nodes, then list the pods of every
/// node with at most `max_concurrent_fetches` listings in flight.
///
/// A node whose pod listing fails is kept with no pods and reported as a
/// [`FetchWarning`] on the snapshot; only a failed node listing fails the
/// whole refresh.
pub struct Aggregator {
    source: Arc<dyn ClusterDataSource>,
    max_concurrent_fetches: usize,
}

impl Aggregator {
    #[must_use]
    pub fn new(source: Arc<dyn ClusterDataSource>, max_concurrent: usize) -> Self {
        Self {
            source,
            max_concurrent_fetches: max_concurrent.max(1),
        }
    }

    #[must_use]
    pub const fn max_concurrent_fetches(&self) -> usize {
        self.max_concurrent_fetches
    }

    /// Run one full refresh.
    ///
    /// Dropping the returned future aborts the per-node tasks still running.
    ///
    /// # Errors
    ///
    /// Returns `Error::SourceUnavailable` if the node listing fails
    pub async fn refresh(&self) -> Result<Snapshot> {
        let start = Instant::now();
        info!("🔄 REFRESH START (max {} concurrent)", self.max_concurrent_fetches);

        let k8s_nodes = self.source.list_nodes().await.map_err(|e| {
            error!("❌ REFRESH FAILED: listing nodes - {}", e);
            Error::source_unavailable(e)
        })?;

        let names: Vec<String> = k8s_nodes
            .iter()
            .filter_map(|node| {
                let name = Node::name_of(node);
                if name.is_none() {
                    warn!("⚠️  Skipping node without a name");
                }
                name.map(str::to_string)
            })
            .collect();

        let gate = Arc::new(Semaphore::new(self.max_concurrent_fetches));
        let mut tasks = JoinSet::new();
        let mut task_nodes = HashMap::with_capacity(names.len());

        for (index, name) in names.iter().enumerate() {
            let source = Arc::clone(&self.source);
            let gate = Arc::clone(&gate);
            let name = name.clone();

            let handle = tasks.spawn(async move {
                let Ok(permit) = gate.acquire_owned().await else {
                    return (index, Err(Error::Custom("admission gate closed".to_string())));
                };
                debug!("📋 Fetching pods for node {}", name);
                let result = source.list_pods(&name).await;
                drop(permit);

                (index, result.map(|pods| Node::from_k8s(name, &pods)))
            });
            task_nodes.insert(handle.id(), index);
        }

        let mut results: Vec<Option<Result<Node>>> = names.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => {
                    error!("❌ Node pod listing task failed: {}", e);
                    if let Some(&index) = task_nodes.get(&e.id()) {
                        results[index] = Some(Err(Error::Custom(format!("pod listing task failed: {e}"))));
                    }
                }
            }
        }

        let (nodes, warnings) = assemble(names, results);

        let snapshot = Snapshot::new(nodes, warnings);
        info!(
            "✅ REFRESH SUCCESS: {} nodes, {} pods, {} warnings ({:.2}s)",
            snapshot.nodes.len(),
            snapshot.pod_count(),
            snapshot.warnings.len(),
            start.elapsed().as_secs_f64()
        );
        Ok(snapshot)
    }
}

/// Put node results back into listing order, degrading the failed ones
fn assemble(
    names: Vec<String>,
    results: Vec<Option<Result<Node>>>,
) -> (Vec<Node>, Vec<FetchWarning>) {
    let mut nodes = Vec::with_capacity(names.len());
    let mut warnings = Vec::new();

    for (name, result) in names.into_iter().zip(results) {
        let failure = match result {
            Some(Ok(node)) => {
                nodes.push(node);
                continue;
            }
            Some(Err(e)) => e.to_string(),
            None => "pod listing task did not complete".to_string(),
        };

        warn!("⚠️  Degrading node {}: {}", name, failure);
        warnings.push(FetchWarning {
            node: name.clone(),
            message: failure,
        });
        nodes.push(Node::new(name, Vec::new()));
    }

    (nodes, warnings)
}
