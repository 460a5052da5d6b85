//! Shared application state for Axum routers.

use std::time::Instant;

use crate::catalog::CachedCatalog;

/// Application-wide state shared across all routes.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Cached catalog. Every route reads and writes through it.
    pub catalog: CachedCatalog,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(catalog: CachedCatalog) -> Self {
        Self {
            catalog,
            start_time: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

crate::impl_from_ref!(CachedCatalog, catalog);
crate::impl_from_ref!(Instant, start_time);
