pub mod aggregator;
pub mod cached_data;
pub mod config;
pub mod snapshot_cache;

pub use aggregator::Aggregator;
pub use cached_data::{CacheState, CachedData};
pub use config::CacheConfig;
pub use snapshot_cache::{CacheStats, SnapshotCache};
