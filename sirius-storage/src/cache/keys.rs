//! Cache key construction.
//!
//! Keys are plain strings of the form `{prefix}:{kind}[:{discriminator}]`.
//! Category segments use the ASCII slug so every key is ASCII.

use std::fmt;

use sirius_core::{DishCategory, DishId, RestaurantId};

/// Prefix used when none is configured.
pub const DEFAULT_PREFIX: &str = "sirius";

/// A dish lookup shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DishLookup {
    ById(DishId),
    ListAll,
    ListByCategory(DishCategory),
}

/// A restaurant lookup shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RestaurantLookup {
    ById(RestaurantId),
    ListAll,
}

/// A fully built cache key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Builds keys under a deployment-wide namespace prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeyBuilder {
    prefix: String,
}

impl Default for CacheKeyBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl CacheKeyBuilder {
    /// An empty prefix falls back to [`DEFAULT_PREFIX`].
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let prefix = prefix.trim().trim_end_matches(':').to_string();
        if prefix.is_empty() {
            Self {
                prefix: DEFAULT_PREFIX.to_string(),
            }
        } else {
            Self { prefix }
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn dish(&self, lookup: DishLookup) -> CacheKey {
        match lookup {
            DishLookup::ById(id) => CacheKey(format!("{}:dish:{}", self.prefix, id)),
            DishLookup::ListAll => CacheKey(format!("{}:dishes", self.prefix)),
            DishLookup::ListByCategory(category) => {
                CacheKey(format!("{}:dishes:{}", self.prefix, category.slug()))
            }
        }
    }

    pub fn restaurant(&self, lookup: RestaurantLookup) -> CacheKey {
        match lookup {
            RestaurantLookup::ById(id) => CacheKey(format!("{}:restaurant:{}", self.prefix, id)),
            RestaurantLookup::ListAll => CacheKey(format!("{}:restaurants", self.prefix)),
        }
    }

    /// Key used only in backend health logs.
    pub fn health_probe(&self) -> CacheKey {
        CacheKey(format!("{}:health", self.prefix))
    }
}
