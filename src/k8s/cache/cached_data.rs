use serde::Serialize;
use std::time::{Duration, Instant};

/// A cached value together with its age and version
#[derive(Debug, Clone)]
pub struct CachedData<T> {
    pub data: T,
    pub last_updated: Instant,
    pub ttl: Duration,
    pub version: u64,  // For tracking updates
}

/// Where the cache is in its refresh lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheState {
    /// Nothing cached yet, the next read populates synchronously
    Empty,
    Fresh,
    /// Expired and no refresh running, the next read triggers one
    Stale,
    Refreshing,
}

impl<T> CachedData<T> {
    pub fn new(data: T, ttl: Duration) -> Self {
        Self {
            data,
            last_updated: Instant::now(),
            ttl,
            version: 0,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.last_updated.elapsed() >= self.ttl
    }

    pub fn age(&self) -> Duration {
        self.last_updated.elapsed()
    }

    pub fn update(&mut self, data: T) {
        self.data = data;
        self.last_updated = Instant::now();
        self.version += 1;
    }
}
