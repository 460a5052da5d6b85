//! Record store abstraction.
//!
//! The store is the source of truth for every record. Mutations that the
//! cache layer must invalidate around return the pre-image they replaced,
//! read inside the same transaction as the write.

mod memory;

pub use memory::InMemoryRecordStore;

use async_trait::async_trait;
use sirius_core::{
    Dish, DishCategory, DishId, DishPatch, NewDish, NewReservation, NewRestaurant, Reservation,
    ReservationId, ReservationPatch, Restaurant, RestaurantId, RestaurantPatch, SiriusResult,
    User, UserId, UserPatch,
};

/// A record before and after an update.
#[derive(Debug, Clone, PartialEq)]
pub struct Updated<T> {
    pub before: T,
    pub after: T,
}

/// Outcome of deleting a dish: the removed record and every restaurant
/// whose menu listed it at the time of deletion.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletedDish {
    pub dish: Dish,
    pub menus: Vec<RestaurantId>,
}

/// Async record store for dishes, restaurants, reservations and users.
///
/// `Ok(None)` from a keyed operation means the record does not exist.
/// Lists are ordered by id.
#[async_trait]
pub trait RecordStore: Send + Sync {
    // ========================================================================
    // DISH OPERATIONS
    // ========================================================================

    async fn dish_get(&self, id: DishId) -> SiriusResult<Option<Dish>>;

    /// List dishes, optionally restricted to one category.
    async fn dish_list(&self, category: Option<DishCategory>) -> SiriusResult<Vec<Dish>>;

    async fn dish_create(&self, dish: NewDish) -> SiriusResult<Dish>;

    async fn dish_update(&self, id: DishId, patch: DishPatch)
        -> SiriusResult<Option<Updated<Dish>>>;

    /// Delete a dish and unlink it from every menu.
    async fn dish_delete(&self, id: DishId) -> SiriusResult<Option<DeletedDish>>;

    // ========================================================================
    // RESTAURANT OPERATIONS
    // ========================================================================

    async fn restaurant_get(&self, id: RestaurantId) -> SiriusResult<Option<Restaurant>>;

    async fn restaurant_list(&self) -> SiriusResult<Vec<Restaurant>>;

    /// Create a restaurant. Every menu entry must name an existing dish.
    async fn restaurant_create(&self, restaurant: NewRestaurant) -> SiriusResult<Restaurant>;

    async fn restaurant_update(
        &self,
        id: RestaurantId,
        patch: RestaurantPatch,
    ) -> SiriusResult<Option<Updated<Restaurant>>>;

    /// Delete a restaurant together with its reservations.
    async fn restaurant_delete(&self, id: RestaurantId) -> SiriusResult<Option<Restaurant>>;

    /// Dishes on a restaurant's menu. `None` when the restaurant is unknown.
    async fn restaurant_menu(
        &self,
        id: RestaurantId,
        category: Option<DishCategory>,
    ) -> SiriusResult<Option<Vec<Dish>>>;

    // ========================================================================
    // RESERVATION OPERATIONS
    // ========================================================================

    async fn reservation_get(&self, id: ReservationId) -> SiriusResult<Option<Reservation>>;

    async fn reservation_list(&self) -> SiriusResult<Vec<Reservation>>;

    async fn reservation_list_for_user(&self, user_id: UserId) -> SiriusResult<Vec<Reservation>>;

    /// Book a table for `user_id`. The restaurant must exist.
    async fn reservation_create(
        &self,
        user_id: UserId,
        reservation: NewReservation,
    ) -> SiriusResult<Reservation>;

    async fn reservation_update(
        &self,
        id: ReservationId,
        patch: ReservationPatch,
    ) -> SiriusResult<Option<Reservation>>;

    async fn reservation_delete(&self, id: ReservationId) -> SiriusResult<Option<Reservation>>;

    // ========================================================================
    // USER OPERATIONS
    // ========================================================================

    async fn user_get(&self, id: UserId) -> SiriusResult<Option<User>>;

    /// Rename a user. Usernames are unique.
    async fn user_update(&self, id: UserId, patch: UserPatch) -> SiriusResult<Option<User>>;

    /// Delete a user together with their reservations.
    async fn user_delete(&self, id: UserId) -> SiriusResult<Option<User>>;

    /// Cheap liveness probe for readiness checks.
    async fn ping(&self) -> SiriusResult<()>;
}
