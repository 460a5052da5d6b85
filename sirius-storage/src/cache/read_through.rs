//! Read-through cache over a pluggable backend.
//!
//! Reads consult the backend first and fall back to the store on a miss,
//! populating the backend with whatever the store returned, including
//! absence and empty lists. The backend is advisory: any failure, timeout
//! or undecodable entry is logged and handled as a miss, so a broken cache
//! changes latency but never results. Store errors always propagate and
//! are never cached.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use sirius_core::SiriusResult;
use tracing::{debug, warn};

use super::entry::{decode_list, decode_record, encode_list, encode_record, RecordEntry};
use super::errors::{CacheError, CacheResult};
use super::keys::{CacheKey, CacheKeyBuilder};
use super::traits::{CacheBackend, CacheStats};

/// Configuration for the read-through cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// TTL applied to every populated entry.
    pub entry_ttl: Duration,
    /// Upper bound on any single backend call.
    pub operation_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            entry_ttl: Duration::from_secs(3600),
            operation_timeout: Duration::from_millis(250),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the entry TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.entry_ttl = ttl;
        self
    }

    /// Set the per-call backend timeout.
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }
}

/// Loads a value from the record store on a cache miss.
#[async_trait]
pub trait StoreFetcher<T>: Send + Sync {
    async fn fetch(&self) -> SiriusResult<T>;
}

/// Where a read was answered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSource {
    Cache,
    Store,
}

/// A value together with the layer that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRead<T> {
    value: T,
    source: ReadSource,
}

impl<T> CacheRead<T> {
    pub fn from_cache(value: T) -> Self {
        Self {
            value,
            source: ReadSource::Cache,
        }
    }

    pub fn from_store(value: T) -> Self {
        Self {
            value,
            source: ReadSource::Store,
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn source(&self) -> ReadSource {
        self.source
    }

    pub fn was_cache_hit(&self) -> bool {
        self.source == ReadSource::Cache
    }

    pub fn map<U, F>(self, f: F) -> CacheRead<U>
    where
        F: FnOnce(T) -> U,
    {
        CacheRead {
            value: f(self.value),
            source: self.source,
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    negative_hits: AtomicU64,
    misses: AtomicU64,
    backend_errors: AtomicU64,
    evictions: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Read-through cache shared by every request handler.
#[derive(Clone)]
pub struct ReadThroughCache {
    backend: Arc<dyn CacheBackend>,
    keys: CacheKeyBuilder,
    config: CacheConfig,
    counters: Arc<Counters>,
}

impl std::fmt::Debug for ReadThroughCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadThroughCache")
            .field("backend", &self.backend.provider_name())
            .field("keys", &self.keys)
            .field("config", &self.config)
            .finish()
    }
}

impl ReadThroughCache {
    pub fn new(backend: Arc<dyn CacheBackend>, keys: CacheKeyBuilder, config: CacheConfig) -> Self {
        Self {
            backend,
            keys,
            config,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn keys(&self) -> &CacheKeyBuilder {
        &self.keys
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.provider_name()
    }

    pub fn stats(&self) -> CacheStats {
        let c = &self.counters;
        CacheStats {
            hits: c.hits.load(Ordering::Relaxed),
            negative_hits: c.negative_hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            backend_errors: c.backend_errors.load(Ordering::Relaxed),
            evictions: c.evictions.load(Ordering::Relaxed),
        }
    }

    /// Keyed lookup. `None` is a cacheable answer.
    pub async fn get_record<T, F>(
        &self,
        key: &CacheKey,
        fetcher: &F,
    ) -> SiriusResult<CacheRead<Option<T>>>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: StoreFetcher<Option<T>> + ?Sized,
    {
        if let Some(bytes) = self
            .bounded("get", key, self.backend.get(key.as_str()))
            .await
            .flatten()
        {
            match decode_record::<T>(&bytes) {
                Ok(RecordEntry::Present(value)) => {
                    Counters::bump(&self.counters.hits);
                    debug!(key = %key, "Cache hit");
                    return Ok(CacheRead::from_cache(Some(value)));
                }
                Ok(RecordEntry::Absent) => {
                    Counters::bump(&self.counters.negative_hits);
                    debug!(key = %key, "Cache hit (absent)");
                    return Ok(CacheRead::from_cache(None));
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                }
            }
        }

        Counters::bump(&self.counters.misses);
        debug!(key = %key, "Cache miss");
        let value = fetcher.fetch().await?;
        self.populate(key, encode_record(value.as_ref())).await;
        Ok(CacheRead::from_store(value))
    }

    /// List lookup. An empty list is a cacheable answer.
    pub async fn get_list<T, F>(
        &self,
        key: &CacheKey,
        fetcher: &F,
    ) -> SiriusResult<CacheRead<Vec<T>>>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: StoreFetcher<Vec<T>> + ?Sized,
    {
        if let Some(bytes) = self
            .bounded("get", key, self.backend.get(key.as_str()))
            .await
            .flatten()
        {
            match decode_list::<T>(&bytes) {
                Ok(values) => {
                    if values.is_empty() {
                        Counters::bump(&self.counters.negative_hits);
                    } else {
                        Counters::bump(&self.counters.hits);
                    }
                    debug!(key = %key, len = values.len(), "Cache hit");
                    return Ok(CacheRead::from_cache(values));
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                }
            }
        }

        Counters::bump(&self.counters.misses);
        debug!(key = %key, "Cache miss");
        let values = fetcher.fetch().await?;
        self.populate(key, encode_list(&values)).await;
        Ok(CacheRead::from_store(values))
    }

    /// Remove one key. Returns whether the backend confirmed the delete.
    pub async fn evict(&self, key: &CacheKey) -> bool {
        let deleted = self
            .bounded("delete", key, self.backend.delete(key.as_str()))
            .await
            .is_some();
        if deleted {
            Counters::bump(&self.counters.evictions);
            debug!(key = %key, "Evicted cache entry");
        }
        deleted
    }

    /// Backend reachability. A failing or slow backend reports `false`.
    pub async fn health_check(&self) -> bool {
        let probe = self.keys.health_probe();
        self.bounded("health_check", &probe, self.backend.health_check())
            .await
            .unwrap_or(false)
    }

    async fn populate(&self, key: &CacheKey, encoded: CacheResult<Vec<u8>>) {
        match encoded {
            Ok(bytes) => {
                self.bounded(
                    "set",
                    key,
                    self.backend.set(key.as_str(), &bytes, self.config.entry_ttl),
                )
                .await;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Skipping cache population");
            }
        }
    }

    /// Run one backend call under the operation timeout. Failures are
    /// logged, counted and reported as `None`.
    async fn bounded<R>(
        &self,
        operation: &'static str,
        key: &CacheKey,
        call: impl Future<Output = CacheResult<R>>,
    ) -> Option<R> {
        let error = match tokio::time::timeout(self.config.operation_timeout, call).await {
            Ok(Ok(value)) => return Some(value),
            Ok(Err(e)) => e,
            Err(_) => CacheError::Timeout {
                operation,
                millis: self.config.operation_timeout.as_millis() as u64,
            },
        };
        Counters::bump(&self.counters.backend_errors);
        warn!(
            backend = self.backend.provider_name(),
            operation,
            key = %key,
            error = %error,
            "Cache backend call failed; continuing without cache"
        );
        None
    }
}
