//! Sirius Storage - Record Store Trait and Catalog Cache
//!
//! Defines the record store abstraction with an in-memory implementation,
//! and the read-through cache that fronts dish and restaurant lookups.
//! The Postgres store lives in sirius-api.

pub mod cache;
pub mod store;

pub use cache::{
    build_backend, build_cache, CacheBackend, CacheBackendKind, CacheConfig, CacheError,
    CacheKey, CacheKeyBuilder, CacheRead, CacheResult, CacheSettings, CacheStats, DishLookup,
    InMemoryCacheBackend, InvalidationCoordinator, InvalidationReport, LmdbCacheBackend,
    Mutation, NoOpCacheBackend, ReadSource, ReadThroughCache, RestaurantLookup, StoreFetcher,
    ABSENT_MARKER, EMPTY_LIST_MARKER,
};
pub use store::{DeletedDish, InMemoryRecordStore, RecordStore, Updated};
