//! Result cache configuration.

use std::time::Duration;

use serde::Deserialize;

const DEFAULT_TTL_MS: u64 = 5 * 60 * 1000;
const DEFAULT_MAX_SIZE_BYTES: usize = 100 * 1024 * 1024;
const DEFAULT_CLEANUP_INTERVAL_MS: u64 = 60 * 1000;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Serve and store results through the cache.
    pub enabled: bool,
    /// Lifetime of every stored result.
    pub ttl_ms: u64,
    /// Upper bound on the serialized size of all stored results.
    pub max_size_bytes: usize,
    /// Period of the background expiry sweep; zero disables it.
    pub cleanup_interval_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_ms: DEFAULT_TTL_MS,
            max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
            cleanup_interval_ms: DEFAULT_CLEANUP_INTERVAL_MS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            ttl_ms: settings.ttl_ms.get(),
            max_size_bytes: settings.max_size_bytes.get(),
            cleanup_interval_ms: settings.cleanup_interval_ms,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// `None` when the periodic sweep is disabled.
    pub fn cleanup_interval(&self) -> Option<Duration> {
        (self.cleanup_interval_ms > 0).then(|| Duration::from_millis(self.cleanup_interval_ms))
    }
}
