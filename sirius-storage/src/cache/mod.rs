//! Read-through, write-invalidate cache for dish and restaurant lookups.
//!
//! Reads go through [`ReadThroughCache`], which consults a pluggable
//! [`CacheBackend`] and falls back to the record store on a miss. Mutations
//! commit in the store first, then [`InvalidationCoordinator`] evicts every
//! key the mutation made stale.
//!
//! The backend is advisory. A slow or failing backend costs latency, never
//! correctness: every backend call is bounded by a timeout and any failure
//! is treated as a miss.
//!
//! # Example
//!
//! ```ignore
//! let cache = build_cache(&CacheSettings::from_env()).await;
//! let key = cache.keys().dish(DishLookup::ById(id));
//! let read = cache.get_record(&key, &DishFetcher { store, id }).await?;
//! ```

pub mod entry;
pub mod errors;
pub mod invalidation;
pub mod keys;
pub mod lmdb_backend;
pub mod memory;
pub mod noop;
pub mod provider;
pub mod read_through;
#[cfg(feature = "cache-redis")]
pub mod redis_backend;
pub mod traits;

pub use entry::{ABSENT_MARKER, EMPTY_LIST_MARKER};
pub use errors::{CacheError, CacheResult};
pub use invalidation::{InvalidationCoordinator, InvalidationReport, Mutation};
pub use keys::{CacheKey, CacheKeyBuilder, DishLookup, RestaurantLookup, DEFAULT_PREFIX};
pub use lmdb_backend::{LmdbCacheBackend, LmdbCacheError};
pub use memory::InMemoryCacheBackend;
pub use noop::NoOpCacheBackend;
pub use provider::{build_backend, build_cache, CacheBackendKind, CacheSettings};
pub use read_through::{CacheConfig, CacheRead, ReadSource, ReadThroughCache, StoreFetcher};
#[cfg(feature = "cache-redis")]
pub use redis_backend::RedisCacheBackend;
pub use traits::{CacheBackend, CacheStats};
