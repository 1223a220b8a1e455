/**
 * Configuration constants for the snapshot cache and its refresh fan-out
 */
use crate::error::{Error, Result};
use std::time::Duration;

/// Default snapshot time-to-live in seconds
pub const DEFAULT_TTL_SECS: u64 = 30;

/// Default number of concurrent per-node pod listings
pub const DEFAULT_CONCURRENT_FETCHERS: usize = 4;

/// Configuration for snapshot caching behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// How long a snapshot is served before a background refresh is triggered
    pub ttl: Duration,
    /// Maximum number of pod listings in flight during one refresh
    pub concurrency: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            concurrency: DEFAULT_CONCURRENT_FETCHERS,
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub const fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Reject settings the refresh engine cannot run with.
    ///
    /// A zero TTL is allowed and makes every read after the first trigger a
    /// background refresh.
    ///
    /// # Errors
    ///
    /// Returns an error if `concurrency` is zero
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::Custom(
                "cache concurrency must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Validate configuration constants at compile time
const _: () = {
    assert!(DEFAULT_TTL_SECS > 0, "DEFAULT_TTL_SECS must be greater than 0");
    assert!(DEFAULT_CONCURRENT_FETCHERS > 0, "DEFAULT_CONCURRENT_FETCHERS must be greater than 0");
};
