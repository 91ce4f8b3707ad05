//! Remarque result cache.
//!
//! Single-process storage for computed thread pages and search results:
//!
//! - **Keys** are derived from the operation name plus every parameter that shapes the result.
//! - **Entries** live for a fixed TTL and are bounded by their aggregate serialized size. When a
//!   new entry does not fit, the oldest 30% of entries are dropped until it does.
//! - **Sweeping** of expired entries happens lazily on read and optionally on a timer.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! ttl_ms = 300000
//! max_size_bytes = 104857600
//! cleanup_interval_ms = 60000
//! ```

mod config;
mod keys;
mod lock;
mod store;
mod sweeper;

pub use config::CacheConfig;
pub use keys::{CacheKeyBuilder, PARAM_DELIMITER, build_key};
pub use store::{
    CacheEntry, CacheError, CacheStats, METRIC_CACHE_EVICT_TOTAL, METRIC_CACHE_EXPIRED_TOTAL,
    METRIC_CACHE_HIT_TOTAL, METRIC_CACHE_MISS_TOTAL, METRIC_CACHE_SIZE_BYTES, TtlStore,
};
pub use sweeper::spawn_cleanup;
