use super::aggregator::Aggregator;
use super::cached_data::{CacheState, CachedData};
use super::config::CacheConfig;
use crate::error::{Error, Result};
use crate::k8s::source::ClusterDataSource;
use crate::model::Snapshot;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info};

/// Stale-while-revalidate cache over the cluster [`Snapshot`].
///
/// The first read blocks on a synchronous refresh. After that every read
/// returns the current snapshot immediately, and a read that finds it older
/// than the TTL starts one background refresh. The handle is cheap to clone
/// and all clones share the same state.
#[derive(Clone)]
pub struct SnapshotCache {
    aggregator: Arc<Aggregator>,
    current: Arc<RwLock<Option<CachedData<Arc<Snapshot>>>>>,
    refreshing: Arc<AtomicBool>,
    // Serializes first-populate callers so only one of them runs a refresh
    populate_lock: Arc<Mutex<()>>,
    last_error: Arc<RwLock<Option<String>>>,
    metrics: Arc<RefreshMetrics>,
    ttl: Duration,
}

#[derive(Debug, Default)]
struct RefreshMetrics {
    attempts: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
}

/// Clears the refreshing flag when the refresh that set it ends, even by panic
struct RefreshGuard {
    flag: Arc<AtomicBool>,
}

impl RefreshGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                flag: Arc::clone(flag),
            })
    }
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl SnapshotCache {
    #[must_use]
    pub fn new(source: Arc<dyn ClusterDataSource>, config: &CacheConfig) -> Self {
        Self {
            aggregator: Arc::new(Aggregator::new(source, config.concurrency)),
            current: Arc::new(RwLock::new(None)),
            refreshing: Arc::new(AtomicBool::new(false)),
            populate_lock: Arc::new(Mutex::new(())),
            last_error: Arc::new(RwLock::new(None)),
            metrics: Arc::new(RefreshMetrics::default()),
            ttl: config.ttl,
        }
    }

    /// Return the current snapshot, populating the cache first if it is empty.
    ///
    /// # Errors
    ///
    /// Only while the cache is empty: returns the error of the synchronous
    /// refresh. Once a snapshot exists this never fails.
    pub async fn get(&self) -> Result<Arc<Snapshot>> {
        if let Some(snapshot) = self.serve_cached().await {
            return Ok(snapshot);
        }
        self.populate().await
    }

    /// Like [`get`](Self::get), but gives up on an empty-cache populate after
    /// `timeout`. The abandoned populate is cancelled along with its pod
    /// listings.
    ///
    /// # Errors
    ///
    /// Returns `Error::Timeout` if the populate does not finish in time, or
    /// the populate's own error
    pub async fn get_within(&self, timeout: Duration) -> Result<Arc<Snapshot>> {
        tokio::time::timeout(timeout, self.get())
            .await
            .map_err(|_| Error::Timeout(timeout))?
    }

    /// The current snapshot without triggering any refresh
    pub async fn peek(&self) -> Option<Arc<Snapshot>> {
        self.current.read().await.as_ref().map(|entry| Arc::clone(&entry.data))
    }

    pub async fn state(&self) -> CacheState {
        let current = self.current.read().await;
        match current.as_ref() {
            None => CacheState::Empty,
            Some(_) if self.is_refreshing() => CacheState::Refreshing,
            Some(entry) if entry.is_expired() => CacheState::Stale,
            Some(_) => CacheState::Fresh,
        }
    }

    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    /// Message of the most recent failed refresh, cleared by the next success
    pub async fn last_error(&self) -> Option<String> {
        self.last_error.read().await.clone()
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    #[must_use]
    pub fn max_concurrent_fetches(&self) -> usize {
        self.aggregator.max_concurrent_fetches()
    }

    #[allow(clippy::significant_drop_tightening)]
    pub async fn stats(&self) -> CacheStats {
        let state = self.state().await;
        let current = self.current.read().await;

        CacheStats {
            state,
            ttl_ms: duration_ms(self.ttl),
            age_ms: current.as_ref().map(|entry| duration_ms(entry.age())),
            version: current.as_ref().map(|entry| entry.version),
            node_count: current.as_ref().map_or(0, |entry| entry.data.nodes.len()),
            warning_count: current.as_ref().map_or(0, |entry| entry.data.warnings.len()),
            refresh_attempts: self.metrics.attempts.load(Ordering::Relaxed),
            refresh_successes: self.metrics.successes.load(Ordering::Relaxed),
            refresh_failures: self.metrics.failures.load(Ordering::Relaxed),
            last_error: self.last_error.read().await.clone(),
        }
    }

    /// Current snapshot if there is one, kicking off a refresh when it expired
    async fn serve_cached(&self) -> Option<Arc<Snapshot>> {
        let (snapshot, expired) = {
            let current = self.current.read().await;
            let entry = current.as_ref()?;
            (Arc::clone(&entry.data), entry.is_expired())
        };

        if expired {
            self.trigger_background_refresh();
        } else {
            debug!("🎯 Cache HIT (fresh)");
        }

        Some(snapshot)
    }

    fn trigger_background_refresh(&self) {
        let Some(guard) = RefreshGuard::acquire(&self.refreshing) else {
            debug!("🔄 Cache STALE: refresh already in flight");
            return;
        };

        info!("🔄 Cache STALE: starting background refresh");
        let cache = self.clone();
        // Detached from the triggering caller; other readers want the result
        tokio::spawn(async move {
            let _guard = guard;
            cache.refresh_in_background().await;
        });
    }

    async fn refresh_in_background(&self) {
        // A refresh that finished between the expiry check and taking the
        // flag already did the work
        let still_expired = self
            .current
            .read()
            .await
            .as_ref()
            .is_none_or(CachedData::is_expired);
        if !still_expired {
            debug!("🔄 Snapshot already refreshed, skipping");
            return;
        }

        if let Err(e) = self.run_refresh().await {
            error!("❌ Background refresh failed, keeping previous snapshot: {}", e);
        }
    }

    async fn populate(&self) -> Result<Arc<Snapshot>> {
        let _populating = self.populate_lock.lock().await;

        // Another caller may have populated while we waited for the lock
        if let Some(snapshot) = self.serve_cached().await {
            return Ok(snapshot);
        }

        info!("🧊 Cache EMPTY: populating synchronously");
        self.run_refresh().await
    }

    async fn run_refresh(&self) -> Result<Arc<Snapshot>> {
        self.metrics.attempts.fetch_add(1, Ordering::Relaxed);

        match self.aggregator.refresh().await {
            Ok(snapshot) => Ok(self.store(snapshot).await),
            Err(e) => {
                self.metrics.failures.fetch_add(1, Ordering::Relaxed);
                *self.last_error.write().await = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn store(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        let version = {
            let mut current = self.current.write().await;
            match current.as_mut() {
                Some(entry) => entry.update(Arc::clone(&snapshot)),
                None => *current = Some(CachedData::new(Arc::clone(&snapshot), self.ttl)),
            }
            current.as_ref().map_or(0, |entry| entry.version)
        };

        *self.last_error.write().await = None;
        self.metrics.successes.fetch_add(1, Ordering::Relaxed);
        info!(
            "💾 Cache STORE: snapshot v{} ({} nodes, TTL: {}s)",
            version,
            snapshot.nodes.len(),
            self.ttl.as_secs()
        );
        snapshot
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Point-in-time view of the cache for status reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub state: CacheState,
    pub ttl_ms: u64,
    pub age_ms: Option<u64>,
    pub version: Option<u64>,
    pub node_count: usize,
    pub warning_count: usize,
    pub refresh_attempts: u64,
    pub refresh_successes: u64,
    pub refresh_failures: u64,
    pub last_error: Option<String>,
}
