//! Cached Catalog
//!
//! The one service every route goes through. Dish and restaurant reads are
//! served by the read-through cache; mutations run the role gate, validate
//! the payload, commit in the record store and then invalidate every cache
//! key the committed change made stale. Reservations and user profiles are
//! passed straight to the store.

use async_trait::async_trait;
use sirius_core::{
    authorize, Dish, DishCategory, DishId, DishPatch, EntityKind, NewDish, NewReservation,
    NewRestaurant, Operation, Reservation, ReservationId, ReservationPatch, Restaurant,
    RestaurantId, RestaurantPatch, Role, SiriusError, SiriusResult, User, UserId, UserPatch,
};
use sirius_storage::{
    CacheStats, DishLookup, InvalidationCoordinator, InvalidationReport, Mutation,
    ReadThroughCache, RecordStore, RestaurantLookup, StoreFetcher,
};
use std::sync::Arc;
use tracing::{debug, info};

use crate::telemetry;

// ============================================================================
// STORE FETCHERS
// ============================================================================

struct DishFetcher<'a> {
    store: &'a dyn RecordStore,
    id: DishId,
}

#[async_trait]
impl StoreFetcher<Option<Dish>> for DishFetcher<'_> {
    async fn fetch(&self) -> SiriusResult<Option<Dish>> {
        self.store.dish_get(self.id).await
    }
}

struct DishListFetcher<'a> {
    store: &'a dyn RecordStore,
    category: Option<DishCategory>,
}

#[async_trait]
impl StoreFetcher<Vec<Dish>> for DishListFetcher<'_> {
    async fn fetch(&self) -> SiriusResult<Vec<Dish>> {
        self.store.dish_list(self.category).await
    }
}

struct RestaurantFetcher<'a> {
    store: &'a dyn RecordStore,
    id: RestaurantId,
}

#[async_trait]
impl StoreFetcher<Option<Restaurant>> for RestaurantFetcher<'_> {
    async fn fetch(&self) -> SiriusResult<Option<Restaurant>> {
        self.store.restaurant_get(self.id).await
    }
}

struct RestaurantListFetcher<'a> {
    store: &'a dyn RecordStore,
}

#[async_trait]
impl StoreFetcher<Vec<Restaurant>> for RestaurantListFetcher<'_> {
    async fn fetch(&self) -> SiriusResult<Vec<Restaurant>> {
        self.store.restaurant_list().await
    }
}

// ============================================================================
// CATALOG
// ============================================================================

/// Record store fronted by the read-through cache.
#[derive(Clone)]
pub struct CachedCatalog {
    store: Arc<dyn RecordStore>,
    cache: ReadThroughCache,
    invalidator: InvalidationCoordinator,
}

impl std::fmt::Debug for CachedCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedCatalog")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl CachedCatalog {
    pub fn new(store: Arc<dyn RecordStore>, cache: ReadThroughCache) -> Self {
        let invalidator = InvalidationCoordinator::new(cache.clone());
        Self {
            store,
            cache,
            invalidator,
        }
    }

    pub fn cache(&self) -> &ReadThroughCache {
        &self.cache
    }

    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    async fn invalidate(&self, mutation: Mutation) -> InvalidationReport {
        let report = self.invalidator.invalidate(&mutation).await;
        if !report.is_complete() {
            telemetry::record_invalidation_failures(report.failed.len());
        }
        report
    }

    // ========================================================================
    // DISH READS
    // ========================================================================

    pub async fn get_dish(&self, id: DishId) -> SiriusResult<Dish> {
        let key = self.cache.keys().dish(DishLookup::ById(id));
        let fetcher = DishFetcher {
            store: self.store.as_ref(),
            id,
        };
        self.cache
            .get_record(&key, &fetcher)
            .await?
            .into_value()
            .ok_or_else(|| SiriusError::not_found(EntityKind::Dish, id))
    }

    pub async fn list_dishes(&self, category: Option<DishCategory>) -> SiriusResult<Vec<Dish>> {
        let lookup = match category {
            Some(category) => DishLookup::ListByCategory(category),
            None => DishLookup::ListAll,
        };
        let key = self.cache.keys().dish(lookup);
        let fetcher = DishListFetcher {
            store: self.store.as_ref(),
            category,
        };
        Ok(self.cache.get_list(&key, &fetcher).await?.into_value())
    }

    // ========================================================================
    // DISH MUTATIONS
    // ========================================================================

    pub async fn create_dish(&self, role: Role, dish: NewDish) -> SiriusResult<Dish> {
        authorize(role, Operation::CreateDish)?;
        dish.validate()?;

        let created = self.store.dish_create(dish).await?;
        self.invalidate(Mutation::DishCreated {
            id: created.id,
            category: created.category,
        })
        .await;

        info!(dish_id = %created.id, role = %role, "Dish created");
        Ok(created)
    }

    pub async fn update_dish(&self, role: Role, id: DishId, patch: DishPatch) -> SiriusResult<Dish> {
        authorize(role, Operation::UpdateDish)?;
        patch.validate()?;

        let updated = self
            .store
            .dish_update(id, patch)
            .await?
            .ok_or_else(|| SiriusError::not_found(EntityKind::Dish, id))?;
        self.invalidate(Mutation::DishUpdated {
            id,
            old_category: updated.before.category,
            new_category: updated.after.category,
        })
        .await;

        info!(dish_id = %id, role = %role, "Dish updated");
        Ok(updated.after)
    }

    pub async fn delete_dish(&self, role: Role, id: DishId) -> SiriusResult<()> {
        authorize(role, Operation::DeleteDish)?;

        let deleted = self
            .store
            .dish_delete(id)
            .await?
            .ok_or_else(|| SiriusError::not_found(EntityKind::Dish, id))?;
        debug!(dish_id = %id, menus = deleted.menus.len(), "Dish removed from menus");
        self.invalidate(Mutation::DishDeleted {
            id,
            category: deleted.dish.category,
            menus: deleted.menus,
        })
        .await;

        info!(dish_id = %id, role = %role, "Dish deleted");
        Ok(())
    }

    // ========================================================================
    // RESTAURANT READS
    // ========================================================================

    pub async fn get_restaurant(&self, id: RestaurantId) -> SiriusResult<Restaurant> {
        let key = self.cache.keys().restaurant(RestaurantLookup::ById(id));
        let fetcher = RestaurantFetcher {
            store: self.store.as_ref(),
            id,
        };
        self.cache
            .get_record(&key, &fetcher)
            .await?
            .into_value()
            .ok_or_else(|| SiriusError::not_found(EntityKind::Restaurant, id))
    }

    pub async fn list_restaurants(&self) -> SiriusResult<Vec<Restaurant>> {
        let key = self.cache.keys().restaurant(RestaurantLookup::ListAll);
        let fetcher = RestaurantListFetcher {
            store: self.store.as_ref(),
        };
        Ok(self.cache.get_list(&key, &fetcher).await?.into_value())
    }

    /// Dishes on a restaurant's menu. Not cached.
    pub async fn restaurant_menu(
        &self,
        id: RestaurantId,
        category: Option<DishCategory>,
    ) -> SiriusResult<Vec<Dish>> {
        self.store
            .restaurant_menu(id, category)
            .await?
            .ok_or_else(|| SiriusError::not_found(EntityKind::Restaurant, id))
    }

    // ========================================================================
    // RESTAURANT MUTATIONS
    // ========================================================================

    pub async fn create_restaurant(
        &self,
        role: Role,
        restaurant: NewRestaurant,
    ) -> SiriusResult<Restaurant> {
        authorize(role, Operation::CreateRestaurant)?;
        restaurant.validate()?;

        let created = self.store.restaurant_create(restaurant).await?;
        self.invalidate(Mutation::RestaurantCreated { id: created.id })
            .await;

        info!(restaurant_id = %created.id, role = %role, "Restaurant created");
        Ok(created)
    }

    pub async fn update_restaurant(
        &self,
        role: Role,
        id: RestaurantId,
        patch: RestaurantPatch,
    ) -> SiriusResult<Restaurant> {
        authorize(role, Operation::UpdateRestaurant)?;
        patch.validate()?;

        let updated = self
            .store
            .restaurant_update(id, patch)
            .await?
            .ok_or_else(|| SiriusError::not_found(EntityKind::Restaurant, id))?;
        self.invalidate(Mutation::RestaurantUpdated { id }).await;

        info!(restaurant_id = %id, role = %role, "Restaurant updated");
        Ok(updated.after)
    }

    pub async fn delete_restaurant(&self, role: Role, id: RestaurantId) -> SiriusResult<()> {
        authorize(role, Operation::DeleteRestaurant)?;

        self.store
            .restaurant_delete(id)
            .await?
            .ok_or_else(|| SiriusError::not_found(EntityKind::Restaurant, id))?;
        self.invalidate(Mutation::RestaurantDeleted { id }).await;

        info!(restaurant_id = %id, role = %role, "Restaurant deleted");
        Ok(())
    }

    // ========================================================================
    // RESERVATIONS
    // ========================================================================

    pub async fn get_reservation(&self, id: ReservationId) -> SiriusResult<Reservation> {
        self.store
            .reservation_get(id)
            .await?
            .ok_or_else(|| SiriusError::not_found(EntityKind::Reservation, id))
    }

    pub async fn list_reservations(&self) -> SiriusResult<Vec<Reservation>> {
        self.store.reservation_list().await
    }

    /// Book a table for the caller.
    pub async fn create_reservation(
        &self,
        role: Role,
        user_id: UserId,
        reservation: NewReservation,
    ) -> SiriusResult<Reservation> {
        authorize(role, Operation::CreateReservation)?;
        reservation.validate()?;

        let created = self.store.reservation_create(user_id, reservation).await?;
        info!(
            reservation_id = %created.id,
            restaurant_id = %created.restaurant_id,
            user_id = %user_id,
            "Reservation created"
        );
        Ok(created)
    }

    pub async fn update_reservation(
        &self,
        role: Role,
        id: ReservationId,
        patch: ReservationPatch,
    ) -> SiriusResult<Reservation> {
        authorize(role, Operation::UpdateReservation)?;
        patch.validate()?;

        let updated = self
            .store
            .reservation_update(id, patch)
            .await?
            .ok_or_else(|| SiriusError::not_found(EntityKind::Reservation, id))?;
        info!(reservation_id = %id, role = %role, "Reservation updated");
        Ok(updated)
    }

    pub async fn delete_reservation(&self, role: Role, id: ReservationId) -> SiriusResult<()> {
        authorize(role, Operation::DeleteReservation)?;

        self.store
            .reservation_delete(id)
            .await?
            .ok_or_else(|| SiriusError::not_found(EntityKind::Reservation, id))?;
        info!(reservation_id = %id, role = %role, "Reservation deleted");
        Ok(())
    }

    // ========================================================================
    // CURRENT USER
    // ========================================================================

    pub async fn me(&self, user_id: UserId) -> SiriusResult<User> {
        self.store
            .user_get(user_id)
            .await?
            .ok_or_else(|| SiriusError::not_found(EntityKind::User, user_id))
    }

    pub async fn my_reservations(&self, user_id: UserId) -> SiriusResult<Vec<Reservation>> {
        self.store.reservation_list_for_user(user_id).await
    }

    pub async fn update_me(&self, user_id: UserId, patch: UserPatch) -> SiriusResult<User> {
        patch.validate()?;
        self.store
            .user_update(user_id, patch)
            .await?
            .ok_or_else(|| SiriusError::not_found(EntityKind::User, user_id))
    }

    pub async fn delete_me(&self, user_id: UserId) -> SiriusResult<()> {
        self.store
            .user_delete(user_id)
            .await?
            .ok_or_else(|| SiriusError::not_found(EntityKind::User, user_id))?;
        info!(user_id = %user_id, "User deleted");
        Ok(())
    }

    // ========================================================================
    // HEALTH
    // ========================================================================

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub async fn cache_health(&self) -> bool {
        self.cache.health_check().await
    }

    pub async fn store_ping(&self) -> SiriusResult<()> {
        self.store.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sirius_storage::{CacheConfig, CacheKeyBuilder, InMemoryCacheBackend, EMPTY_LIST_MARKER};
    use sirius_test_utils::assertions::{assert_forbidden, assert_not_found, assert_validation};
    use sirius_test_utils::{fixtures, CountingStore, FailingCacheBackend, RecordingCacheBackend};

    struct Harness {
        store: Arc<CountingStore>,
        backend: Arc<RecordingCacheBackend>,
        catalog: CachedCatalog,
    }

    fn harness() -> Harness {
        let store = Arc::new(CountingStore::new());
        let backend = Arc::new(RecordingCacheBackend::new());
        let cache = ReadThroughCache::new(
            backend.clone(),
            CacheKeyBuilder::default(),
            CacheConfig::new(),
        );
        let catalog = CachedCatalog::new(store.clone(), cache);
        Harness {
            store,
            backend,
            catalog,
        }
    }

    #[tokio::test]
    async fn test_second_read_served_from_cache() -> SiriusResult<()> {
        let h = harness();
        let dish = h.store.inner().dish_create(fixtures::borscht()).await?;

        assert_eq!(h.catalog.get_dish(dish.id).await?, dish);
        assert_eq!(h.catalog.get_dish(dish.id).await?, dish);
        assert_eq!(h.store.calls("dish_get"), 1);
        assert_eq!(h.catalog.cache_stats().hits, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_dish_is_cached_as_absent() -> SiriusResult<()> {
        let h = harness();
        assert_not_found(&h.catalog.get_dish(DishId::new(404)).await, EntityKind::Dish);
        assert_not_found(&h.catalog.get_dish(DishId::new(404)).await, EntityKind::Dish);
        assert_eq!(h.store.calls("dish_get"), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_evicts_cached_absence() -> SiriusResult<()> {
        let h = harness();
        // Ids start at 1, so the next dish will be #1.
        assert!(h.catalog.get_dish(DishId::new(1)).await.is_err());

        let created = h
            .catalog
            .create_dish(Role::Staff, fixtures::borscht())
            .await?;
        assert_eq!(created.id, DishId::new(1));
        assert_eq!(h.catalog.get_dish(created.id).await?, created);
        assert_eq!(h.store.calls("dish_get"), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_moves_dish_between_category_lists() -> SiriusResult<()> {
        let h = harness();
        let dish = h.store.inner().dish_create(fixtures::borscht()).await?;

        assert_eq!(h.catalog.list_dishes(Some(DishCategory::Soup)).await?.len(), 1);
        assert!(h
            .catalog
            .list_dishes(Some(DishCategory::Salad))
            .await?
            .is_empty());

        let patch = DishPatch {
            category: Some(DishCategory::Salad),
            ..DishPatch::default()
        };
        h.catalog
            .update_dish(Role::Administrator, dish.id, patch)
            .await?;

        assert!(h
            .catalog
            .list_dishes(Some(DishCategory::Soup))
            .await?
            .is_empty());
        let salads = h.catalog.list_dishes(Some(DishCategory::Salad)).await?;
        assert_eq!(salads.len(), 1);
        assert_eq!(salads[0].category, DishCategory::Salad);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_list_cached_with_list_marker() -> SiriusResult<()> {
        let h = harness();
        assert!(h
            .catalog
            .list_dishes(Some(DishCategory::Dessert))
            .await?
            .is_empty());
        assert!(h
            .catalog
            .list_dishes(Some(DishCategory::Dessert))
            .await?
            .is_empty());
        assert_eq!(h.store.calls("dish_list"), 1);

        let key = h
            .catalog
            .cache()
            .keys()
            .dish(DishLookup::ListByCategory(DishCategory::Dessert));
        assert_eq!(
            h.backend.raw(key.as_str()).await.as_deref(),
            Some(EMPTY_LIST_MARKER)
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_forbidden_mutation_touches_nothing() -> SiriusResult<()> {
        let h = harness();
        let dish = h.store.inner().dish_create(fixtures::borscht()).await?;

        assert_forbidden(&h.catalog.create_dish(Role::User, fixtures::tea()).await);
        assert_forbidden(&h.catalog.delete_dish(Role::User, dish.id).await);
        assert_forbidden(
            &h.catalog
                .create_restaurant(Role::Staff, fixtures::new_restaurant("Ромашка", vec![]))
                .await,
        );
        assert_eq!(h.store.total_calls(), 0);
        assert!(h.backend.deleted_keys().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_validation_runs_before_store() {
        let h = harness();
        let result = h
            .catalog
            .create_dish(Role::Staff, fixtures::new_dish(DishCategory::Soup, "Щи", -1.0))
            .await;
        assert_validation(&result);

        let result = h
            .catalog
            .update_dish(Role::Staff, DishId::new(1), DishPatch::default())
            .await;
        assert_validation(&result);
        assert_eq!(h.store.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_restaurant_mutation_never_evicts_dish_keys() -> SiriusResult<()> {
        let h = harness();
        let dish = h.store.inner().dish_create(fixtures::borscht()).await?;
        let restaurant = h
            .catalog
            .create_restaurant(
                Role::Administrator,
                fixtures::new_restaurant("Ромашка", vec![dish.id]),
            )
            .await?;
        h.catalog
            .update_restaurant(
                Role::Administrator,
                restaurant.id,
                RestaurantPatch {
                    menu: Some(vec![]),
                    ..RestaurantPatch::default()
                },
            )
            .await?;
        h.catalog
            .delete_restaurant(Role::Administrator, restaurant.id)
            .await?;

        let dish_prefix = format!("{}:dish", h.catalog.cache().keys().prefix());
        let deleted = h.backend.deleted_keys();
        assert!(!deleted.is_empty());
        assert!(deleted.iter().all(|k| !k.starts_with(&dish_prefix)));
        Ok(())
    }

    #[tokio::test]
    async fn test_dish_delete_refreshes_menu_holders() -> SiriusResult<()> {
        let h = harness();
        let soup = h.store.inner().dish_create(fixtures::borscht()).await?;
        let salad = h.store.inner().dish_create(fixtures::olivier()).await?;
        let restaurant = h
            .store
            .inner()
            .restaurant_create(fixtures::new_restaurant("Ромашка", vec![soup.id, salad.id]))
            .await?;

        assert_eq!(
            h.catalog.get_restaurant(restaurant.id).await?.menu,
            vec![soup.id, salad.id]
        );
        h.catalog.delete_dish(Role::Staff, soup.id).await?;
        assert_eq!(
            h.catalog.get_restaurant(restaurant.id).await?.menu,
            vec![salad.id]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_failing_cache_changes_nothing_but_store_calls() -> SiriusResult<()> {
        let store = Arc::new(CountingStore::new());
        let cache = ReadThroughCache::new(
            Arc::new(FailingCacheBackend::new()),
            CacheKeyBuilder::default(),
            CacheConfig::new(),
        );
        let catalog = CachedCatalog::new(store.clone(), cache);

        let dish = catalog.create_dish(Role::Staff, fixtures::borscht()).await?;
        assert_eq!(catalog.get_dish(dish.id).await?, dish);
        assert_eq!(catalog.get_dish(dish.id).await?, dish);
        assert_eq!(store.calls("dish_get"), 2);
        assert!(!catalog.cache_health().await);
        Ok(())
    }

    #[tokio::test]
    async fn test_memory_backend_round_trip_for_restaurants() -> SiriusResult<()> {
        let store = Arc::new(CountingStore::new());
        let cache = ReadThroughCache::new(
            Arc::new(InMemoryCacheBackend::new()),
            CacheKeyBuilder::new("test"),
            CacheConfig::new(),
        );
        let catalog = CachedCatalog::new(store.clone(), cache);

        assert!(catalog.list_restaurants().await?.is_empty());
        catalog
            .create_restaurant(Role::Administrator, fixtures::new_restaurant("Ромашка", vec![]))
            .await?;
        assert_eq!(catalog.list_restaurants().await?.len(), 1);
        assert_eq!(catalog.list_restaurants().await?.len(), 1);
        assert_eq!(store.calls("restaurant_list"), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_reservation_role_gate() -> SiriusResult<()> {
        let h = harness();
        let user = h.store.inner().insert_user("guest")?;
        let restaurant = h
            .store
            .inner()
            .restaurant_create(fixtures::new_restaurant("Ромашка", vec![]))
            .await?;

        let reservation = h
            .catalog
            .create_reservation(Role::User, user.id, fixtures::new_reservation(restaurant.id))
            .await?;
        assert_eq!(reservation.user_id, user.id);
        assert!(!reservation.status);

        let confirm = ReservationPatch {
            status: Some(true),
            ..ReservationPatch::default()
        };
        assert_forbidden(
            &h.catalog
                .update_reservation(Role::Administrator, reservation.id, confirm.clone())
                .await,
        );
        let confirmed = h
            .catalog
            .update_reservation(Role::Staff, reservation.id, confirm)
            .await?;
        assert!(confirmed.status);

        assert_forbidden(&h.catalog.delete_reservation(Role::User, reservation.id).await);
        h.catalog
            .delete_reservation(Role::Staff, reservation.id)
            .await?;
        assert_not_found(
            &h.catalog.get_reservation(reservation.id).await,
            EntityKind::Reservation,
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_current_user_operations() -> SiriusResult<()> {
        let h = harness();
        let user = h.store.inner().insert_user("guest")?;

        assert_eq!(h.catalog.me(user.id).await?, user);
        let renamed = h
            .catalog
            .update_me(
                user.id,
                UserPatch {
                    username: Some("gourmet".to_string()),
                },
            )
            .await?;
        assert_eq!(renamed.username, "gourmet");

        h.catalog.delete_me(user.id).await?;
        assert_not_found(&h.catalog.me(user.id).await, EntityKind::User);
        Ok(())
    }
}
