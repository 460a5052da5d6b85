//! Sirius Test Utilities
//!
//! Shared test infrastructure for the Sirius workspace:
//! - A call-counting record store with an outage switch
//! - Cache backends that fail, stall or record their traffic
//! - Proptest generators for records, roles and operations
//! - Fixtures and assertions for common scenarios

pub use sirius_core::{
    Dish, DishCategory, DishId, DishPatch, EntityKind, NewDish, NewReservation, NewRestaurant,
    Operation, Reservation, ReservationId, Restaurant, RestaurantId, RestaurantPatch, Role,
    SiriusError, SiriusResult, StorageError, User, UserId, ValidationError,
};
pub use sirius_storage::{InMemoryCacheBackend, InMemoryRecordStore};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use sirius_core::{ReservationPatch, UserPatch};
use sirius_storage::{CacheBackend, CacheError, CacheResult, DeletedDish, RecordStore, Updated};

// ============================================================================
// COUNTING STORE
// ============================================================================

/// Record store wrapper that counts calls per operation and can simulate a
/// store outage.
#[derive(Debug, Default)]
pub struct CountingStore {
    inner: InMemoryRecordStore,
    calls: Mutex<HashMap<&'static str, usize>>,
    down: AtomicBool,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The wrapped store, for seeding without touching the counters.
    pub fn inner(&self) -> &InMemoryRecordStore {
        &self.inner
    }

    /// Number of calls made to `operation` (e.g. `"dish_get"`).
    pub fn calls(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.get(operation).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Total calls across every operation.
    pub fn total_calls(&self) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.values().sum())
            .unwrap_or(0)
    }

    pub fn reset_calls(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    /// While down, every operation fails with a backend error.
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn enter(&self, operation: &'static str) -> SiriusResult<()> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(operation).or_default() += 1;
        }
        if self.down.load(Ordering::SeqCst) {
            return Err(SiriusError::backend(operation, "store unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for CountingStore {
    async fn dish_get(&self, id: DishId) -> SiriusResult<Option<Dish>> {
        self.enter("dish_get")?;
        self.inner.dish_get(id).await
    }

    async fn dish_list(&self, category: Option<DishCategory>) -> SiriusResult<Vec<Dish>> {
        self.enter("dish_list")?;
        self.inner.dish_list(category).await
    }

    async fn dish_create(&self, dish: NewDish) -> SiriusResult<Dish> {
        self.enter("dish_create")?;
        self.inner.dish_create(dish).await
    }

    async fn dish_update(
        &self,
        id: DishId,
        patch: DishPatch,
    ) -> SiriusResult<Option<Updated<Dish>>> {
        self.enter("dish_update")?;
        self.inner.dish_update(id, patch).await
    }

    async fn dish_delete(&self, id: DishId) -> SiriusResult<Option<DeletedDish>> {
        self.enter("dish_delete")?;
        self.inner.dish_delete(id).await
    }

    async fn restaurant_get(&self, id: RestaurantId) -> SiriusResult<Option<Restaurant>> {
        self.enter("restaurant_get")?;
        self.inner.restaurant_get(id).await
    }

    async fn restaurant_list(&self) -> SiriusResult<Vec<Restaurant>> {
        self.enter("restaurant_list")?;
        self.inner.restaurant_list().await
    }

    async fn restaurant_create(&self, restaurant: NewRestaurant) -> SiriusResult<Restaurant> {
        self.enter("restaurant_create")?;
        self.inner.restaurant_create(restaurant).await
    }

    async fn restaurant_update(
        &self,
        id: RestaurantId,
        patch: RestaurantPatch,
    ) -> SiriusResult<Option<Updated<Restaurant>>> {
        self.enter("restaurant_update")?;
        self.inner.restaurant_update(id, patch).await
    }

    async fn restaurant_delete(&self, id: RestaurantId) -> SiriusResult<Option<Restaurant>> {
        self.enter("restaurant_delete")?;
        self.inner.restaurant_delete(id).await
    }

    async fn restaurant_menu(
        &self,
        id: RestaurantId,
        category: Option<DishCategory>,
    ) -> SiriusResult<Option<Vec<Dish>>> {
        self.enter("restaurant_menu")?;
        self.inner.restaurant_menu(id, category).await
    }

    async fn reservation_get(&self, id: ReservationId) -> SiriusResult<Option<Reservation>> {
        self.enter("reservation_get")?;
        self.inner.reservation_get(id).await
    }

    async fn reservation_list(&self) -> SiriusResult<Vec<Reservation>> {
        self.enter("reservation_list")?;
        self.inner.reservation_list().await
    }

    async fn reservation_list_for_user(&self, user_id: UserId) -> SiriusResult<Vec<Reservation>> {
        self.enter("reservation_list_for_user")?;
        self.inner.reservation_list_for_user(user_id).await
    }

    async fn reservation_create(
        &self,
        user_id: UserId,
        reservation: NewReservation,
    ) -> SiriusResult<Reservation> {
        self.enter("reservation_create")?;
        self.inner.reservation_create(user_id, reservation).await
    }

    async fn reservation_update(
        &self,
        id: ReservationId,
        patch: ReservationPatch,
    ) -> SiriusResult<Option<Reservation>> {
        self.enter("reservation_update")?;
        self.inner.reservation_update(id, patch).await
    }

    async fn reservation_delete(&self, id: ReservationId) -> SiriusResult<Option<Reservation>> {
        self.enter("reservation_delete")?;
        self.inner.reservation_delete(id).await
    }

    async fn user_get(&self, id: UserId) -> SiriusResult<Option<User>> {
        self.enter("user_get")?;
        self.inner.user_get(id).await
    }

    async fn user_update(&self, id: UserId, patch: UserPatch) -> SiriusResult<Option<User>> {
        self.enter("user_update")?;
        self.inner.user_update(id, patch).await
    }

    async fn user_delete(&self, id: UserId) -> SiriusResult<Option<User>> {
        self.enter("user_delete")?;
        self.inner.user_delete(id).await
    }

    async fn ping(&self) -> SiriusResult<()> {
        self.enter("ping")?;
        self.inner.ping().await
    }
}

// ============================================================================
// CACHE BACKEND DOUBLES
// ============================================================================

/// Backend whose every call fails with a connection error.
#[derive(Debug, Default)]
pub struct FailingCacheBackend {
    calls: AtomicUsize,
}

impl FailingCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> CacheResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::ConnectionError("connection refused".to_string()))
    }
}

#[async_trait]
impl CacheBackend for FailingCacheBackend {
    async fn get(&self, _key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.fail()
    }

    async fn set(&self, _key: &str, _value: &[u8], _ttl: Duration) -> CacheResult<()> {
        self.fail()
    }

    async fn delete(&self, _key: &str) -> CacheResult<()> {
        self.fail()
    }

    async fn health_check(&self) -> CacheResult<bool> {
        self.fail()
    }

    fn provider_name(&self) -> &'static str {
        "failing"
    }
}

/// Backend that answers correctly but only after `delay`.
#[derive(Debug)]
pub struct SlowCacheBackend {
    inner: InMemoryCacheBackend,
    delay: Duration,
}

impl SlowCacheBackend {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: InMemoryCacheBackend::new(),
            delay,
        }
    }
}

#[async_trait]
impl CacheBackend for SlowCacheBackend {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        tokio::time::sleep(self.delay).await;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.delete(key).await
    }

    async fn health_check(&self) -> CacheResult<bool> {
        tokio::time::sleep(self.delay).await;
        self.inner.health_check().await
    }

    fn provider_name(&self) -> &'static str {
        "slow"
    }
}

/// Working in-memory backend that remembers every deleted key.
#[derive(Debug, Default)]
pub struct RecordingCacheBackend {
    inner: InMemoryCacheBackend,
    deleted: Mutex<Vec<String>>,
}

impl RecordingCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys deleted so far, in call order.
    pub fn deleted_keys(&self) -> Vec<String> {
        self.deleted.lock().map(|d| d.clone()).unwrap_or_default()
    }

    pub fn clear_deleted(&self) {
        if let Ok(mut deleted) = self.deleted.lock() {
            deleted.clear();
        }
    }

    /// Raw stored bytes, bypassing any read-through logic.
    pub async fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.get(key).await.ok().flatten()
    }
}

#[async_trait]
impl CacheBackend for RecordingCacheBackend {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        if let Ok(mut deleted) = self.deleted.lock() {
            deleted.push(key.to_string());
        }
        self.inner.delete(key).await
    }

    async fn health_check(&self) -> CacheResult<bool> {
        self.inner.health_check().await
    }

    fn provider_name(&self) -> &'static str {
        "recording"
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Sirius records and policy inputs.

    use super::*;
    use proptest::prelude::*;

    pub fn arb_dish_category() -> impl Strategy<Value = DishCategory> {
        proptest::sample::select(DishCategory::ALL.to_vec())
    }

    pub fn arb_role() -> impl Strategy<Value = Role> {
        proptest::sample::select(Role::ALL.to_vec())
    }

    pub fn arb_operation() -> impl Strategy<Value = Operation> {
        proptest::sample::select(Operation::ALL.to_vec())
    }

    pub fn arb_dish_id() -> impl Strategy<Value = DishId> {
        (1i64..100_000).prop_map(DishId::new)
    }

    pub fn arb_restaurant_id() -> impl Strategy<Value = RestaurantId> {
        (1i64..100_000).prop_map(RestaurantId::new)
    }

    /// Valid dish payloads.
    pub fn arb_new_dish() -> impl Strategy<Value = NewDish> {
        (
            arb_dish_category(),
            "[A-Za-zА-Яа-я][A-Za-zА-Яа-я ]{0,30}",
            "[a-z ]{0,40}",
            0u32..100_000,
        )
            .prop_map(|(category, name, description, kopecks)| NewDish {
                category,
                name,
                description,
                price: f64::from(kopecks) / 100.0,
            })
    }

    /// Patches touching at least one field.
    pub fn arb_dish_patch() -> impl Strategy<Value = DishPatch> {
        (
            proptest::option::of(arb_dish_category()),
            proptest::option::of("[A-Za-z][A-Za-z ]{0,20}"),
            proptest::option::of(0u32..100_000),
        )
            .prop_filter("patch must change something", |(c, n, p)| {
                c.is_some() || n.is_some() || p.is_some()
            })
            .prop_map(|(category, name, kopecks)| DishPatch {
                category,
                name,
                description: None,
                price: kopecks.map(|k| f64::from(k) / 100.0),
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Ready-made payloads for common scenarios.

    use super::*;
    use chrono::{TimeZone, Utc};

    pub fn new_dish(category: DishCategory, name: &str, price: f64) -> NewDish {
        NewDish {
            category,
            name: name.to_string(),
            description: String::new(),
            price,
        }
    }

    pub fn borscht() -> NewDish {
        new_dish(DishCategory::Soup, "Борщ", 250.0)
    }

    pub fn olivier() -> NewDish {
        new_dish(DishCategory::Salad, "Оливье", 320.0)
    }

    pub fn tea() -> NewDish {
        new_dish(DishCategory::HotDrink, "Чай", 90.0)
    }

    pub fn new_restaurant(name: &str, menu: Vec<DishId>) -> NewRestaurant {
        NewRestaurant {
            name: name.to_string(),
            address: "Сочи, Олимпийский пр., 1".to_string(),
            description: String::new(),
            menu,
        }
    }

    pub fn new_reservation(restaurant_id: RestaurantId) -> NewReservation {
        NewReservation {
            restaurant_id,
            date_reserv: Utc
                .with_ymd_and_hms(2026, 6, 12, 19, 30, 0)
                .single()
                .unwrap_or_else(Utc::now),
            guest_count: 4,
            comment: Some("У окна".to_string()),
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over `SiriusResult` variants.

    use super::*;

    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &SiriusResult<T>, kind: EntityKind) {
        match result {
            Err(SiriusError::Storage(StorageError::NotFound { kind: k, .. })) => {
                assert_eq!(*k, kind, "Wrong entity kind in NotFound error");
            }
            other => panic!("Expected NotFound error for {kind}, got: {other:?}"),
        }
    }

    #[track_caller]
    pub fn assert_forbidden<T: std::fmt::Debug>(result: &SiriusResult<T>) {
        match result {
            Err(SiriusError::Forbidden(_)) => {}
            other => panic!("Expected Forbidden error, got: {other:?}"),
        }
    }

    #[track_caller]
    pub fn assert_validation<T: std::fmt::Debug>(result: &SiriusResult<T>) {
        match result {
            Err(SiriusError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {other:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counting_store_counts_and_fails() {
        let store = CountingStore::new();
        store.dish_create(fixtures::borscht()).await.unwrap();
        store.dish_get(DishId::new(1)).await.unwrap();
        store.dish_get(DishId::new(1)).await.unwrap();
        assert_eq!(store.calls("dish_get"), 2);
        assert_eq!(store.total_calls(), 3);

        store.set_down(true);
        assert!(store.dish_get(DishId::new(1)).await.is_err());
        assert_eq!(store.calls("dish_get"), 3);
    }

    #[tokio::test]
    async fn test_recording_backend_tracks_deletes() {
        let backend = RecordingCacheBackend::new();
        backend
            .set("k", b"v", Duration::from_secs(10))
            .await
            .unwrap();
        backend.delete("k").await.unwrap();
        assert_eq!(backend.deleted_keys(), vec!["k".to_string()]);
        assert!(backend.raw("k").await.is_none());
    }

    #[tokio::test]
    async fn test_failing_backend() {
        let backend = FailingCacheBackend::new();
        assert!(backend.get("k").await.is_err());
        assert!(backend.health_check().await.is_err());
        assert_eq!(backend.calls(), 2);
    }
}
