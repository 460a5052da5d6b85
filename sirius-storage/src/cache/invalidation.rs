//! Write-side invalidation.
//!
//! After the store commits a mutation, every cache key whose value the
//! mutation could have changed is evicted. Key sets are computed from the
//! mutation alone (ids, categories before and after, affected menus), so
//! they can be inspected without a backend.

use std::collections::BTreeSet;

use sirius_core::{DishCategory, DishId, RestaurantId};
use tracing::{debug, warn};

use super::keys::{CacheKey, CacheKeyBuilder, DishLookup, RestaurantLookup};
use super::read_through::ReadThroughCache;

/// A committed mutation of cached data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    DishCreated {
        id: DishId,
        category: DishCategory,
    },
    DishUpdated {
        id: DishId,
        old_category: DishCategory,
        new_category: DishCategory,
    },
    DishDeleted {
        id: DishId,
        category: DishCategory,
        /// Restaurants whose menu listed the dish.
        menus: Vec<RestaurantId>,
    },
    RestaurantCreated {
        id: RestaurantId,
    },
    RestaurantUpdated {
        id: RestaurantId,
    },
    RestaurantDeleted {
        id: RestaurantId,
    },
}

/// Result of one invalidation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationReport {
    pub evicted: Vec<CacheKey>,
    pub failed: Vec<CacheKey>,
}

impl InvalidationReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Computes and applies eviction sets.
#[derive(Debug, Clone)]
pub struct InvalidationCoordinator {
    cache: ReadThroughCache,
}

impl InvalidationCoordinator {
    pub fn new(cache: ReadThroughCache) -> Self {
        Self { cache }
    }

    /// Keys a mutation makes stale.
    pub fn plan(keys: &CacheKeyBuilder, mutation: &Mutation) -> BTreeSet<CacheKey> {
        let mut stale = BTreeSet::new();
        match mutation {
            Mutation::DishCreated { id, category } => {
                // A prior miss on this id may have cached an absence.
                stale.insert(keys.dish(DishLookup::ById(*id)));
                stale.insert(keys.dish(DishLookup::ListAll));
                stale.insert(keys.dish(DishLookup::ListByCategory(*category)));
            }
            Mutation::DishUpdated {
                id,
                old_category,
                new_category,
            } => {
                stale.insert(keys.dish(DishLookup::ById(*id)));
                stale.insert(keys.dish(DishLookup::ListAll));
                stale.insert(keys.dish(DishLookup::ListByCategory(*old_category)));
                stale.insert(keys.dish(DishLookup::ListByCategory(*new_category)));
            }
            Mutation::DishDeleted {
                id,
                category,
                menus,
            } => {
                stale.insert(keys.dish(DishLookup::ById(*id)));
                stale.insert(keys.dish(DishLookup::ListAll));
                stale.insert(keys.dish(DishLookup::ListByCategory(*category)));
                for restaurant in menus {
                    stale.insert(keys.restaurant(RestaurantLookup::ById(*restaurant)));
                }
                if !menus.is_empty() {
                    stale.insert(keys.restaurant(RestaurantLookup::ListAll));
                }
            }
            Mutation::RestaurantCreated { id }
            | Mutation::RestaurantUpdated { id }
            | Mutation::RestaurantDeleted { id } => {
                stale.insert(keys.restaurant(RestaurantLookup::ById(*id)));
                stale.insert(keys.restaurant(RestaurantLookup::ListAll));
            }
        }
        stale
    }

    /// Evict every key in the mutation's plan.
    ///
    /// A key that cannot be evicted is reported and left to expire through
    /// its TTL. The mutation itself has already committed.
    pub async fn invalidate(&self, mutation: &Mutation) -> InvalidationReport {
        let mut report = InvalidationReport::default();
        for key in Self::plan(self.cache.keys(), mutation) {
            if self.cache.evict(&key).await {
                report.evicted.push(key);
            } else {
                report.failed.push(key);
            }
        }
        if report.is_complete() {
            debug!(?mutation, evicted = report.evicted.len(), "Cache invalidated");
        } else {
            warn!(
                ?mutation,
                failed = report.failed.len(),
                ttl_secs = self.cache.config().entry_ttl.as_secs(),
                "Cache invalidation incomplete; stale entries expire with TTL"
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::InMemoryCacheBackend;
    use crate::cache::read_through::CacheConfig;
    use crate::cache::traits::CacheBackend;
    use std::sync::Arc;
    use std::time::Duration;

    fn keys() -> CacheKeyBuilder {
        CacheKeyBuilder::new("t")
    }

    fn as_strs(set: &BTreeSet<CacheKey>) -> Vec<&str> {
        set.iter().map(CacheKey::as_str).collect()
    }

    #[test]
    fn test_dish_create_plan() {
        let plan = InvalidationCoordinator::plan(
            &keys(),
            &Mutation::DishCreated {
                id: DishId::new(9),
                category: DishCategory::Salad,
            },
        );
        assert_eq!(as_strs(&plan), vec!["t:dish:9", "t:dishes", "t:dishes:salad"]);
    }

    #[test]
    fn test_dish_update_evicts_both_categories() {
        let plan = InvalidationCoordinator::plan(
            &keys(),
            &Mutation::DishUpdated {
                id: DishId::new(5),
                old_category: DishCategory::Soup,
                new_category: DishCategory::MainCourse,
            },
        );
        assert_eq!(
            as_strs(&plan),
            vec![
                "t:dish:5",
                "t:dishes",
                "t:dishes:main_course",
                "t:dishes:soup"
            ]
        );
    }

    #[test]
    fn test_dish_update_same_category_collapses() {
        let plan = InvalidationCoordinator::plan(
            &keys(),
            &Mutation::DishUpdated {
                id: DishId::new(5),
                old_category: DishCategory::Soup,
                new_category: DishCategory::Soup,
            },
        );
        assert_eq!(plan.len(), 3);
    }

    #[test]
    fn test_dish_delete_reaches_menus() {
        let plan = InvalidationCoordinator::plan(
            &keys(),
            &Mutation::DishDeleted {
                id: DishId::new(5),
                category: DishCategory::Soup,
                menus: vec![RestaurantId::new(2), RestaurantId::new(3)],
            },
        );
        assert!(plan.contains(&keys().restaurant(RestaurantLookup::ById(RestaurantId::new(2)))));
        assert!(plan.contains(&keys().restaurant(RestaurantLookup::ById(RestaurantId::new(3)))));
        assert!(plan.contains(&keys().restaurant(RestaurantLookup::ListAll)));

        let unlisted = InvalidationCoordinator::plan(
            &keys(),
            &Mutation::DishDeleted {
                id: DishId::new(5),
                category: DishCategory::Soup,
                menus: vec![],
            },
        );
        assert_eq!(as_strs(&unlisted), vec!["t:dish:5", "t:dishes", "t:dishes:soup"]);
    }

    #[test]
    fn test_restaurant_mutations_never_touch_dish_keys() {
        for mutation in [
            Mutation::RestaurantCreated {
                id: RestaurantId::new(1),
            },
            Mutation::RestaurantUpdated {
                id: RestaurantId::new(1),
            },
            Mutation::RestaurantDeleted {
                id: RestaurantId::new(1),
            },
        ] {
            let plan = InvalidationCoordinator::plan(&keys(), &mutation);
            assert_eq!(as_strs(&plan), vec!["t:restaurant:1", "t:restaurants"]);
        }
    }

    #[tokio::test]
    async fn test_invalidate_removes_entries() {
        let backend = Arc::new(InMemoryCacheBackend::new());
        let cache = ReadThroughCache::new(backend.clone(), keys(), CacheConfig::default());
        let coordinator = InvalidationCoordinator::new(cache);
        let ttl = Duration::from_secs(60);
        backend.set("t:dish:1", b"{}", ttl).await.unwrap();
        backend.set("t:dishes", b"[]", ttl).await.unwrap();
        backend.set("t:dishes:dessert", b"[]", ttl).await.unwrap();

        let report = coordinator
            .invalidate(&Mutation::DishUpdated {
                id: DishId::new(1),
                old_category: DishCategory::Soup,
                new_category: DishCategory::Dessert,
            })
            .await;
        assert!(report.is_complete());
        assert_eq!(report.evicted.len(), 4);
        assert!(backend.get("t:dish:1").await.unwrap().is_none());
        assert!(backend.get("t:dishes").await.unwrap().is_none());
        assert!(backend.get("t:dishes:dessert").await.unwrap().is_none());
    }
}
