//! Cache backend selection with graceful degradation.
//!
//! The configured backend is opened at start-up. If it cannot be opened the
//! service logs a warning and runs against [`NoOpCacheBackend`]; it never
//! fails to start because of the cache.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::keys::{CacheKeyBuilder, DEFAULT_PREFIX};
use super::lmdb_backend::LmdbCacheBackend;
use super::memory::InMemoryCacheBackend;
use super::noop::NoOpCacheBackend;
use super::read_through::{CacheConfig, ReadThroughCache};
use super::traits::CacheBackend;

#[cfg(feature = "cache-redis")]
use super::redis_backend::{redact_url, RedisCacheBackend};

/// Which backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackendKind {
    Redis,
    Lmdb,
    Memory,
    None,
}

impl CacheBackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheBackendKind::Redis => "redis",
            CacheBackendKind::Lmdb => "lmdb",
            CacheBackendKind::Memory => "memory",
            CacheBackendKind::None => "none",
        }
    }
}

impl fmt::Display for CacheBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            // Dragonfly speaks the Redis protocol.
            "redis" | "dragonfly" => Ok(CacheBackendKind::Redis),
            "lmdb" => Ok(CacheBackendKind::Lmdb),
            "memory" | "in-memory" => Ok(CacheBackendKind::Memory),
            "none" | "noop" | "disabled" | "off" => Ok(CacheBackendKind::None),
            other => Err(format!("unknown cache backend: {other}")),
        }
    }
}

/// Cache configuration loaded from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    pub backend: CacheBackendKind,
    pub prefix: String,
    pub ttl: Duration,
    pub operation_timeout: Duration,
    pub redis_url: String,
    pub lmdb_path: PathBuf,
    pub lmdb_max_size_mb: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::Memory,
            prefix: DEFAULT_PREFIX.to_string(),
            ttl: Duration::from_secs(3600),
            operation_timeout: Duration::from_millis(250),
            redis_url: "redis://127.0.0.1:6379/0".to_string(),
            lmdb_path: PathBuf::from("./data/cache"),
            lmdb_max_size_mb: 256,
        }
    }
}

impl CacheSettings {
    /// Load settings from environment variables.
    ///
    /// Environment variables:
    /// - `SIRIUS_CACHE_BACKEND`: redis, lmdb, memory or none (default: memory)
    /// - `SIRIUS_CACHE_PREFIX`: key namespace (default: sirius)
    /// - `SIRIUS_CACHE_TTL_SECS`: entry TTL (default: 3600)
    /// - `SIRIUS_CACHE_OP_TIMEOUT_MS`: per-call backend bound (default: 250)
    /// - `SIRIUS_REDIS_URL`: Redis connection URL
    /// - `SIRIUS_LMDB_PATH`: LMDB directory (default: ./data/cache)
    /// - `SIRIUS_LMDB_MAX_SIZE_MB`: LMDB map size (default: 256)
    ///
    /// Unparseable values fall back to their defaults with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let backend = match lookup("SIRIUS_CACHE_BACKEND") {
            Some(raw) => raw.parse().unwrap_or_else(|e: String| {
                warn!(error = %e, "Falling back to no cache");
                CacheBackendKind::None
            }),
            None => defaults.backend,
        };

        let number = |name: &str, default: u64| -> u64 {
            match lookup(name) {
                Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                    warn!(variable = name, value = %raw, default, "Ignoring unparseable value");
                    default
                }),
                None => default,
            }
        };

        Self {
            backend,
            prefix: lookup("SIRIUS_CACHE_PREFIX").unwrap_or(defaults.prefix),
            ttl: Duration::from_secs(number("SIRIUS_CACHE_TTL_SECS", defaults.ttl.as_secs())),
            operation_timeout: Duration::from_millis(number(
                "SIRIUS_CACHE_OP_TIMEOUT_MS",
                defaults.operation_timeout.as_millis() as u64,
            )),
            redis_url: lookup("SIRIUS_REDIS_URL").unwrap_or(defaults.redis_url),
            lmdb_path: lookup("SIRIUS_LMDB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.lmdb_path),
            lmdb_max_size_mb: number(
                "SIRIUS_LMDB_MAX_SIZE_MB",
                defaults.lmdb_max_size_mb as u64,
            ) as usize,
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .with_ttl(self.ttl)
            .with_operation_timeout(self.operation_timeout)
    }

    pub fn key_builder(&self) -> CacheKeyBuilder {
        CacheKeyBuilder::new(self.prefix.clone())
    }
}

/// Open the configured backend, degrading to NoOp on failure.
pub async fn build_backend(settings: &CacheSettings) -> Arc<dyn CacheBackend> {
    match settings.backend {
        CacheBackendKind::Redis => build_redis_backend(settings).await,
        CacheBackendKind::Lmdb => {
            match LmdbCacheBackend::new(&settings.lmdb_path, settings.lmdb_max_size_mb) {
                Ok(backend) => {
                    info!(
                        backend = "lmdb",
                        path = %settings.lmdb_path.display(),
                        "Cache backend initialized"
                    );
                    Arc::new(backend)
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        path = %settings.lmdb_path.display(),
                        "Failed to open LMDB cache, falling back to NoOp"
                    );
                    Arc::new(NoOpCacheBackend)
                }
            }
        }
        CacheBackendKind::Memory => {
            info!(backend = "memory", "Cache backend initialized");
            Arc::new(InMemoryCacheBackend::new())
        }
        CacheBackendKind::None => {
            info!("Cache disabled by configuration");
            Arc::new(NoOpCacheBackend)
        }
    }
}

#[cfg(feature = "cache-redis")]
async fn build_redis_backend(settings: &CacheSettings) -> Arc<dyn CacheBackend> {
    let connect = RedisCacheBackend::connect(&settings.redis_url);
    match tokio::time::timeout(Duration::from_secs(5), connect).await {
        Ok(Ok(backend)) => {
            info!(
                backend = "redis",
                url = %redact_url(&settings.redis_url),
                "Cache backend initialized"
            );
            Arc::new(backend)
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Failed to connect to Redis, falling back to NoOp cache");
            Arc::new(NoOpCacheBackend)
        }
        Err(_) => {
            warn!("Timed out connecting to Redis, falling back to NoOp cache");
            Arc::new(NoOpCacheBackend)
        }
    }
}

#[cfg(not(feature = "cache-redis"))]
async fn build_redis_backend(_settings: &CacheSettings) -> Arc<dyn CacheBackend> {
    warn!("Redis cache backend requested but 'cache-redis' feature not enabled, using NoOp");
    Arc::new(NoOpCacheBackend)
}

/// Open the configured backend and wrap it in a read-through cache.
pub async fn build_cache(settings: &CacheSettings) -> ReadThroughCache {
    let backend = build_backend(settings).await;
    ReadThroughCache::new(backend, settings.key_builder(), settings.cache_config())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = CacheSettings::from_lookup(lookup(&[]));
        assert_eq!(settings, CacheSettings::default());
        assert_eq!(settings.cache_config(), CacheConfig::default());
        assert_eq!(settings.key_builder().prefix(), "sirius");
    }

    #[test]
    fn test_overrides() {
        let settings = CacheSettings::from_lookup(lookup(&[
            ("SIRIUS_CACHE_BACKEND", "LMDB"),
            ("SIRIUS_CACHE_PREFIX", "blue"),
            ("SIRIUS_CACHE_TTL_SECS", "60"),
            ("SIRIUS_CACHE_OP_TIMEOUT_MS", "20"),
            ("SIRIUS_LMDB_PATH", "/tmp/sirius-cache"),
        ]));
        assert_eq!(settings.backend, CacheBackendKind::Lmdb);
        assert_eq!(settings.prefix, "blue");
        assert_eq!(settings.ttl, Duration::from_secs(60));
        assert_eq!(settings.operation_timeout, Duration::from_millis(20));
        assert_eq!(settings.lmdb_path, PathBuf::from("/tmp/sirius-cache"));
    }

    #[test]
    fn test_bad_values_fall_back() {
        let settings = CacheSettings::from_lookup(lookup(&[
            ("SIRIUS_CACHE_BACKEND", "memcached"),
            ("SIRIUS_CACHE_TTL_SECS", "an hour"),
        ]));
        assert_eq!(settings.backend, CacheBackendKind::None);
        assert_eq!(settings.ttl, Duration::from_secs(3600));
    }

    #[test]
    fn test_backend_kind_parsing() {
        assert_eq!("dragonfly".parse::<CacheBackendKind>(), Ok(CacheBackendKind::Redis));
        assert_eq!("in-memory".parse::<CacheBackendKind>(), Ok(CacheBackendKind::Memory));
        assert_eq!("off".parse::<CacheBackendKind>(), Ok(CacheBackendKind::None));
        assert!("memcached".parse::<CacheBackendKind>().is_err());
    }

    #[tokio::test]
    async fn test_build_memory_and_none() {
        let memory = build_backend(&CacheSettings::default()).await;
        assert_eq!(memory.provider_name(), "memory");

        let none = CacheSettings {
            backend: CacheBackendKind::None,
            ..Default::default()
        };
        assert_eq!(build_backend(&none).await.provider_name(), "noop");
    }

    #[tokio::test]
    async fn test_unusable_lmdb_path_degrades_to_noop() {
        let dir = tempfile::TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-directory");
        std::fs::write(&blocker, b"file").unwrap();

        let settings = CacheSettings {
            backend: CacheBackendKind::Lmdb,
            lmdb_path: blocker,
            ..Default::default()
        };
        assert_eq!(build_backend(&settings).await.provider_name(), "noop");
    }

    #[tokio::test]
    async fn test_build_lmdb() {
        let dir = tempfile::TempDir::new().unwrap();
        let settings = CacheSettings {
            backend: CacheBackendKind::Lmdb,
            lmdb_path: dir.path().join("cache"),
            lmdb_max_size_mb: 10,
            ..Default::default()
        };
        let cache = build_cache(&settings).await;
        assert_eq!(cache.backend_name(), "lmdb");
        assert!(cache.health_check().await);
    }
}
