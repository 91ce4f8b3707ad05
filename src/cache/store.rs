//! Time-boxed result storage bounded by aggregate serialized size.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use metrics::{counter, gauge};
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

use super::lock::mutex_lock;

const SOURCE: &str = "cache::store";

pub const METRIC_CACHE_HIT_TOTAL: &str = "remarque_cache_hit_total";
pub const METRIC_CACHE_MISS_TOTAL: &str = "remarque_cache_miss_total";
pub const METRIC_CACHE_EVICT_TOTAL: &str = "remarque_cache_evict_total";
pub const METRIC_CACHE_EXPIRED_TOTAL: &str = "remarque_cache_expired_total";
pub const METRIC_CACHE_SIZE_BYTES: &str = "remarque_cache_size_bytes";

/// Share of entries removed by one eviction round, as a fraction of ten.
const EVICT_TENTHS: usize = 3;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to serialize cache payload: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("cache payload of {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: usize, max: usize },
}

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub data: T,
    pub created_at: Instant,
    pub ttl: Duration,
    pub key: String,
    pub size_bytes: usize,
    seq: u64,
}

impl<T> CacheEntry<T> {
    /// Expired strictly after `created_at + ttl`.
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) > self.ttl
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub total_size_bytes: usize,
    pub max_size_bytes: usize,
}

struct StoreState<T> {
    entries: HashMap<String, CacheEntry<T>>,
    total_size_bytes: usize,
    next_seq: u64,
}

impl<T> StoreState<T> {
    fn remove(&mut self, key: &str) -> Option<CacheEntry<T>> {
        let entry = self.entries.remove(key)?;
        self.total_size_bytes = self.total_size_bytes.saturating_sub(entry.size_bytes);
        Some(entry)
    }

    /// Drop the oldest share of entries by creation time, ties in insertion order.
    fn evict_oldest(&mut self) -> usize {
        let count = (self.entries.len() * EVICT_TENTHS / 10).max(1);
        let mut order: Vec<(Instant, u64, String)> = self
            .entries
            .values()
            .map(|entry| (entry.created_at, entry.seq, entry.key.clone()))
            .collect();
        order.sort_unstable();

        let mut removed = 0;
        for (_, _, key) in order.into_iter().take(count) {
            if self.remove(&key).is_some() {
                removed += 1;
            }
        }
        removed
    }
}

/// Key/value store with per-entry TTL.
///
/// All reads and writes go through one mutex so the size counter always equals the sum of the
/// stored entries.
pub struct TtlStore<T> {
    state: Mutex<StoreState<T>>,
    max_size_bytes: usize,
}

impl<T> TtlStore<T>
where
    T: Clone + Serialize,
{
    pub fn new(max_size_bytes: usize) -> Self {
        Self {
            state: Mutex::new(StoreState {
                entries: HashMap::new(),
                total_size_bytes: 0,
                next_seq: 0,
            }),
            max_size_bytes,
        }
    }

    /// Live value for `key`. An expired entry is removed and reported as a miss.
    pub fn get(&self, key: &str) -> Option<T> {
        let now = Instant::now();
        let mut state = mutex_lock(&self.state, SOURCE, "get");

        let expired = match state.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                counter!(METRIC_CACHE_HIT_TOTAL).increment(1);
                return Some(entry.data.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            state.remove(key);
            counter!(METRIC_CACHE_EXPIRED_TOTAL).increment(1);
            gauge!(METRIC_CACHE_SIZE_BYTES).set(state.total_size_bytes as f64);
        }
        counter!(METRIC_CACHE_MISS_TOTAL).increment(1);
        None
    }

    /// Store `data` under `key`, evicting the oldest entries first when the new payload would not
    /// fit.
    pub fn put(&self, key: &str, data: T, ttl: Duration) -> Result<(), CacheError> {
        let size_bytes = serde_json::to_vec(&data)?.len();
        if size_bytes > self.max_size_bytes {
            return Err(CacheError::TooLarge {
                size: size_bytes,
                max: self.max_size_bytes,
            });
        }

        let mut state = mutex_lock(&self.state, SOURCE, "put");
        state.remove(key);

        let mut evicted = 0;
        while state.total_size_bytes + size_bytes > self.max_size_bytes
            && !state.entries.is_empty()
        {
            evicted += state.evict_oldest();
        }
        if evicted > 0 {
            counter!(METRIC_CACHE_EVICT_TOTAL).increment(evicted as u64);
            debug!(
                target_module = SOURCE,
                evicted,
                remaining = state.entries.len(),
                "Evicted oldest result cache entries"
            );
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        state.total_size_bytes += size_bytes;
        state.entries.insert(
            key.to_string(),
            CacheEntry {
                data,
                created_at: Instant::now(),
                ttl,
                key: key.to_string(),
                size_bytes,
                seq,
            },
        );
        gauge!(METRIC_CACHE_SIZE_BYTES).set(state.total_size_bytes as f64);
        Ok(())
    }

    /// Remove every expired entry; returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut state = mutex_lock(&self.state, SOURCE, "cleanup_expired");

        let expired: Vec<String> = state
            .entries
            .values()
            .filter(|entry| entry.is_expired(now))
            .map(|entry| entry.key.clone())
            .collect();
        for key in &expired {
            state.remove(key);
        }

        if !expired.is_empty() {
            counter!(METRIC_CACHE_EXPIRED_TOTAL).increment(expired.len() as u64);
            gauge!(METRIC_CACHE_SIZE_BYTES).set(state.total_size_bytes as f64);
        }
        expired.len()
    }

    pub fn stats(&self) -> CacheStats {
        let state = mutex_lock(&self.state, SOURCE, "stats");
        CacheStats {
            entries: state.entries.len(),
            total_size_bytes: state.total_size_bytes,
            max_size_bytes: self.max_size_bytes,
        }
    }

    pub fn clear(&self) {
        let mut state = mutex_lock(&self.state, SOURCE, "clear");
        state.entries.clear();
        state.total_size_bytes = 0;
        gauge!(METRIC_CACHE_SIZE_BYTES).set(0.0);
    }
}
