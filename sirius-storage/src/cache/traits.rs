//! Cache backend trait and usage statistics.

use std::time::Duration;

use async_trait::async_trait;

use super::errors::CacheResult;

/// Pluggable byte-level cache backend.
///
/// Backends store opaque values; encoding and sentinel handling live in the
/// read-through layer. Implementations must be safe for concurrent use.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Get a value. `Ok(None)` on a miss or an expired entry.
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Store a value, replacing any previous one, expiring after `ttl`.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()>;

    /// Remove a value. Removing an absent key succeeds.
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Whether the backend is reachable.
    async fn health_check(&self) -> CacheResult<bool>;

    /// Short backend name for logs and metrics.
    fn provider_name(&self) -> &'static str;
}

/// Snapshot of read-through counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads served from a cached value.
    pub hits: u64,
    /// Reads served from a cached absence.
    pub negative_hits: u64,
    /// Reads that fell through to the store.
    pub misses: u64,
    /// Backend calls that failed or timed out.
    pub backend_errors: u64,
    /// Keys successfully evicted by invalidation.
    pub evictions: u64,
}

impl CacheStats {
    /// Fraction of reads answered without the store (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits + self.negative_hits;
        let total = served + self.misses;
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }
}
