//! Cache backend that stores nothing.

use std::time::Duration;

use async_trait::async_trait;

use super::errors::CacheResult;
use super::traits::CacheBackend;

/// Always misses, always accepts writes. Used when caching is disabled or
/// the configured backend could not be opened.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpCacheBackend;

#[async_trait]
impl CacheBackend for NoOpCacheBackend {
    async fn get(&self, _key: &str) -> CacheResult<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &[u8], _ttl: Duration) -> CacheResult<()> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> CacheResult<()> {
        Ok(())
    }

    async fn health_check(&self) -> CacheResult<bool> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "noop"
    }
}
