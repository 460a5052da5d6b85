//! In-memory record store for development and tests.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use sirius_core::{
    Dish, DishCategory, DishId, DishPatch, EntityKind, NewDish, NewReservation, NewRestaurant,
    Reservation, ReservationId, ReservationPatch, Restaurant, RestaurantId, RestaurantPatch,
    SiriusError, SiriusResult, StorageError, User, UserId, UserPatch,
};

use super::{DeletedDish, RecordStore, Updated};

#[derive(Debug, Default)]
struct Tables {
    dishes: BTreeMap<DishId, Dish>,
    restaurants: BTreeMap<RestaurantId, Restaurant>,
    reservations: BTreeMap<ReservationId, Reservation>,
    users: BTreeMap<UserId, User>,
    next_dish: i64,
    next_restaurant: i64,
    next_reservation: i64,
    next_user: i64,
}

impl Tables {
    fn bump(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }

    fn check_menu(&self, menu: &[DishId]) -> SiriusResult<()> {
        match menu.iter().find(|id| !self.dishes.contains_key(id)) {
            Some(missing) => Err(StorageError::ReferenceNotFound {
                kind: EntityKind::Dish,
                id: missing.get(),
            }
            .into()),
            None => Ok(()),
        }
    }

    fn check_restaurant(&self, id: RestaurantId) -> SiriusResult<()> {
        if self.restaurants.contains_key(&id) {
            Ok(())
        } else {
            Err(StorageError::ReferenceNotFound {
                kind: EntityKind::Restaurant,
                id: id.get(),
            }
            .into())
        }
    }
}

/// `RwLock`-guarded tables with ids assigned from per-kind counters
/// starting at 1. Deletes cascade the way the SQL schema does.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    tables: RwLock<Tables>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> SiriusResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| SiriusError::Storage(StorageError::LockPoisoned))
    }

    fn write(&self) -> SiriusResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| SiriusError::Storage(StorageError::LockPoisoned))
    }

    /// Register a user. Accounts are created by the identity service in
    /// production; this is the seeding hook for development and tests.
    pub fn insert_user(&self, username: impl Into<String>) -> SiriusResult<User> {
        let username = username.into();
        let mut tables = self.write()?;
        if tables.users.values().any(|u| u.username == username) {
            return Err(SiriusError::invalid("username", "already taken"));
        }
        let id = UserId::new(Tables::bump(&mut tables.next_user));
        let user = User { id, username };
        tables.users.insert(id, user.clone());
        Ok(user)
    }

    pub fn restaurant_count(&self) -> usize {
        self.read().map(|t| t.restaurants.len()).unwrap_or(0)
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    // === Dish Operations ===

    async fn dish_get(&self, id: DishId) -> SiriusResult<Option<Dish>> {
        Ok(self.read()?.dishes.get(&id).cloned())
    }

    async fn dish_list(&self, category: Option<DishCategory>) -> SiriusResult<Vec<Dish>> {
        let tables = self.read()?;
        Ok(tables
            .dishes
            .values()
            .filter(|d| category.map_or(true, |c| d.category == c))
            .cloned()
            .collect())
    }

    async fn dish_create(&self, dish: NewDish) -> SiriusResult<Dish> {
        let mut tables = self.write()?;
        let id = DishId::new(Tables::bump(&mut tables.next_dish));
        let dish = dish.into_dish(id);
        tables.dishes.insert(id, dish.clone());
        Ok(dish)
    }

    async fn dish_update(
        &self,
        id: DishId,
        patch: DishPatch,
    ) -> SiriusResult<Option<Updated<Dish>>> {
        let mut tables = self.write()?;
        let Some(current) = tables.dishes.get_mut(&id) else {
            return Ok(None);
        };
        let before = current.clone();
        let after = patch.apply(&before);
        *current = after.clone();
        Ok(Some(Updated { before, after }))
    }

    async fn dish_delete(&self, id: DishId) -> SiriusResult<Option<DeletedDish>> {
        let mut tables = self.write()?;
        let Some(dish) = tables.dishes.remove(&id) else {
            return Ok(None);
        };
        let mut menus = Vec::new();
        for restaurant in tables.restaurants.values_mut() {
            let before = restaurant.menu.len();
            restaurant.menu.retain(|d| *d != id);
            if restaurant.menu.len() != before {
                menus.push(restaurant.id);
            }
        }
        Ok(Some(DeletedDish { dish, menus }))
    }

    // === Restaurant Operations ===

    async fn restaurant_get(&self, id: RestaurantId) -> SiriusResult<Option<Restaurant>> {
        Ok(self.read()?.restaurants.get(&id).cloned())
    }

    async fn restaurant_list(&self) -> SiriusResult<Vec<Restaurant>> {
        Ok(self.read()?.restaurants.values().cloned().collect())
    }

    async fn restaurant_create(&self, restaurant: NewRestaurant) -> SiriusResult<Restaurant> {
        let mut tables = self.write()?;
        tables.check_menu(&restaurant.menu)?;
        let id = RestaurantId::new(Tables::bump(&mut tables.next_restaurant));
        let restaurant = restaurant.into_restaurant(id);
        tables.restaurants.insert(id, restaurant.clone());
        Ok(restaurant)
    }

    async fn restaurant_update(
        &self,
        id: RestaurantId,
        patch: RestaurantPatch,
    ) -> SiriusResult<Option<Updated<Restaurant>>> {
        let mut tables = self.write()?;
        if let Some(menu) = &patch.menu {
            if tables.restaurants.contains_key(&id) {
                tables.check_menu(menu)?;
            }
        }
        let Some(current) = tables.restaurants.get_mut(&id) else {
            return Ok(None);
        };
        let before = current.clone();
        let after = patch.apply(&before);
        *current = after.clone();
        Ok(Some(Updated { before, after }))
    }

    async fn restaurant_delete(&self, id: RestaurantId) -> SiriusResult<Option<Restaurant>> {
        let mut tables = self.write()?;
        let removed = tables.restaurants.remove(&id);
        if removed.is_some() {
            tables.reservations.retain(|_, r| r.restaurant_id != id);
        }
        Ok(removed)
    }

    async fn restaurant_menu(
        &self,
        id: RestaurantId,
        category: Option<DishCategory>,
    ) -> SiriusResult<Option<Vec<Dish>>> {
        let tables = self.read()?;
        let Some(restaurant) = tables.restaurants.get(&id) else {
            return Ok(None);
        };
        let mut dishes: Vec<Dish> = restaurant
            .menu
            .iter()
            .filter_map(|dish_id| tables.dishes.get(dish_id))
            .filter(|d| category.map_or(true, |c| d.category == c))
            .cloned()
            .collect();
        dishes.sort_by_key(|d| d.id);
        Ok(Some(dishes))
    }

    // === Reservation Operations ===

    async fn reservation_get(&self, id: ReservationId) -> SiriusResult<Option<Reservation>> {
        Ok(self.read()?.reservations.get(&id).cloned())
    }

    async fn reservation_list(&self) -> SiriusResult<Vec<Reservation>> {
        Ok(self.read()?.reservations.values().cloned().collect())
    }

    async fn reservation_list_for_user(&self, user_id: UserId) -> SiriusResult<Vec<Reservation>> {
        let tables = self.read()?;
        Ok(tables
            .reservations
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn reservation_create(
        &self,
        user_id: UserId,
        reservation: NewReservation,
    ) -> SiriusResult<Reservation> {
        let mut tables = self.write()?;
        tables.check_restaurant(reservation.restaurant_id)?;
        let id = ReservationId::new(Tables::bump(&mut tables.next_reservation));
        let reservation = reservation.into_reservation(id, user_id);
        tables.reservations.insert(id, reservation.clone());
        Ok(reservation)
    }

    async fn reservation_update(
        &self,
        id: ReservationId,
        patch: ReservationPatch,
    ) -> SiriusResult<Option<Reservation>> {
        let mut tables = self.write()?;
        if !tables.reservations.contains_key(&id) {
            return Ok(None);
        }
        if let Some(restaurant_id) = patch.restaurant_id {
            tables.check_restaurant(restaurant_id)?;
        }
        let Some(current) = tables.reservations.get_mut(&id) else {
            return Ok(None);
        };
        *current = patch.apply(current);
        Ok(Some(current.clone()))
    }

    async fn reservation_delete(&self, id: ReservationId) -> SiriusResult<Option<Reservation>> {
        Ok(self.write()?.reservations.remove(&id))
    }

    // === User Operations ===

    async fn user_get(&self, id: UserId) -> SiriusResult<Option<User>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn user_update(&self, id: UserId, patch: UserPatch) -> SiriusResult<Option<User>> {
        let mut tables = self.write()?;
        if let Some(username) = &patch.username {
            let taken = tables
                .users
                .values()
                .any(|u| u.id != id && &u.username == username);
            if taken {
                return Err(SiriusError::invalid("username", "already taken"));
            }
        }
        let Some(current) = tables.users.get_mut(&id) else {
            return Ok(None);
        };
        *current = patch.apply(current);
        Ok(Some(current.clone()))
    }

    async fn user_delete(&self, id: UserId) -> SiriusResult<Option<User>> {
        let mut tables = self.write()?;
        let removed = tables.users.remove(&id);
        if removed.is_some() {
            tables.reservations.retain(|_, r| r.user_id != id);
        }
        Ok(removed)
    }

    async fn ping(&self) -> SiriusResult<()> {
        self.read().map(|_| ())
    }
}
