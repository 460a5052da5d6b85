//! Record types and their create/update payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    DishCategory, DishId, EntityKind, ReservationId, RestaurantId, SiriusError, SiriusResult,
    UserId, ValidationError,
};

fn require_text(field: &str, value: &str) -> SiriusResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: field.to_string(),
        }
        .into());
    }
    Ok(())
}

fn require_price(price: f64) -> SiriusResult<()> {
    if !price.is_finite() || price < 0.0 {
        return Err(SiriusError::invalid(
            "price",
            "must be a finite non-negative number",
        ));
    }
    Ok(())
}

fn require_guests(guest_count: i32) -> SiriusResult<()> {
    if guest_count < 1 {
        return Err(SiriusError::invalid("guest_count", "must be at least 1"));
    }
    Ok(())
}

// ============================================================================
// DISH
// ============================================================================

/// A dish that can appear on restaurant menus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Dish {
    pub id: DishId,
    pub category: DishCategory,
    #[serde(alias = "dish_name")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
}

/// Payload for creating a dish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NewDish {
    pub category: DishCategory,
    #[serde(alias = "dish_name")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
}

impl NewDish {
    pub fn validate(&self) -> SiriusResult<()> {
        require_text("name", &self.name)?;
        require_price(self.price)
    }

    /// Materialize the record once the store has assigned an id.
    pub fn into_dish(self, id: DishId) -> Dish {
        Dish {
            id,
            category: self.category,
            name: self.name,
            description: self.description,
            price: self.price,
        }
    }
}

/// Partial update for a dish. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DishPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<DishCategory>,
    #[serde(default, alias = "dish_name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

impl DishPatch {
    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.name.is_none()
            && self.description.is_none()
            && self.price.is_none()
    }

    pub fn validate(&self) -> SiriusResult<()> {
        if self.is_empty() {
            return Err(ValidationError::EmptyPatch {
                kind: EntityKind::Dish,
            }
            .into());
        }
        if let Some(name) = &self.name {
            require_text("name", name)?;
        }
        if let Some(price) = self.price {
            require_price(price)?;
        }
        Ok(())
    }

    /// Produce the post-update record.
    pub fn apply(&self, dish: &Dish) -> Dish {
        Dish {
            id: dish.id,
            category: self.category.unwrap_or(dish.category),
            name: self.name.clone().unwrap_or_else(|| dish.name.clone()),
            description: self
                .description
                .clone()
                .unwrap_or_else(|| dish.description.clone()),
            price: self.price.unwrap_or(dish.price),
        }
    }
}

// ============================================================================
// RESTAURANT
// ============================================================================

/// A restaurant and the ids of the dishes on its menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Restaurant {
    pub id: RestaurantId,
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub menu: Vec<DishId>,
}

/// Payload for creating a restaurant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NewRestaurant {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub menu: Vec<DishId>,
}

impl NewRestaurant {
    pub fn validate(&self) -> SiriusResult<()> {
        require_text("name", &self.name)?;
        require_text("address", &self.address)
    }

    pub fn into_restaurant(self, id: RestaurantId) -> Restaurant {
        Restaurant {
            id,
            name: self.name,
            address: self.address,
            description: self.description,
            menu: dedup_menu(self.menu),
        }
    }
}

/// Partial update for a restaurant. A present `menu` replaces the whole menu.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RestaurantPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub menu: Option<Vec<DishId>>,
}

impl RestaurantPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.address.is_none()
            && self.description.is_none()
            && self.menu.is_none()
    }

    pub fn validate(&self) -> SiriusResult<()> {
        if self.is_empty() {
            return Err(ValidationError::EmptyPatch {
                kind: EntityKind::Restaurant,
            }
            .into());
        }
        if let Some(name) = &self.name {
            require_text("name", name)?;
        }
        if let Some(address) = &self.address {
            require_text("address", address)?;
        }
        Ok(())
    }

    pub fn apply(&self, restaurant: &Restaurant) -> Restaurant {
        Restaurant {
            id: restaurant.id,
            name: self.name.clone().unwrap_or_else(|| restaurant.name.clone()),
            address: self
                .address
                .clone()
                .unwrap_or_else(|| restaurant.address.clone()),
            description: self
                .description
                .clone()
                .unwrap_or_else(|| restaurant.description.clone()),
            menu: match &self.menu {
                Some(menu) => dedup_menu(menu.clone()),
                None => restaurant.menu.clone(),
            },
        }
    }
}

/// Menus are sets; keep first occurrence order.
pub fn dedup_menu(menu: Vec<DishId>) -> Vec<DishId> {
    let mut seen = std::collections::HashSet::with_capacity(menu.len());
    menu.into_iter().filter(|id| seen.insert(*id)).collect()
}

// ============================================================================
// RESERVATION
// ============================================================================

/// A table reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Reservation {
    pub id: ReservationId,
    pub user_id: UserId,
    pub restaurant_id: RestaurantId,
    pub date_reserv: DateTime<Utc>,
    pub guest_count: i32,
    #[serde(default)]
    pub comment: Option<String>,
    /// Confirmed by staff.
    #[serde(default)]
    pub status: bool,
}

/// Payload for booking a table. The owner is the authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NewReservation {
    pub restaurant_id: RestaurantId,
    pub date_reserv: DateTime<Utc>,
    pub guest_count: i32,
    #[serde(default)]
    pub comment: Option<String>,
}

impl NewReservation {
    pub fn validate(&self) -> SiriusResult<()> {
        require_guests(self.guest_count)
    }

    pub fn into_reservation(self, id: ReservationId, user_id: UserId) -> Reservation {
        Reservation {
            id,
            user_id,
            restaurant_id: self.restaurant_id,
            date_reserv: self.date_reserv,
            guest_count: self.guest_count,
            comment: self.comment,
            status: false,
        }
    }
}

/// Partial update for a reservation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ReservationPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restaurant_id: Option<RestaurantId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_reserv: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_count: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<bool>,
}

impl ReservationPatch {
    pub fn is_empty(&self) -> bool {
        self.restaurant_id.is_none()
            && self.date_reserv.is_none()
            && self.guest_count.is_none()
            && self.comment.is_none()
            && self.status.is_none()
    }

    pub fn validate(&self) -> SiriusResult<()> {
        if self.is_empty() {
            return Err(ValidationError::EmptyPatch {
                kind: EntityKind::Reservation,
            }
            .into());
        }
        if let Some(guest_count) = self.guest_count {
            require_guests(guest_count)?;
        }
        Ok(())
    }

    pub fn apply(&self, reservation: &Reservation) -> Reservation {
        Reservation {
            id: reservation.id,
            user_id: reservation.user_id,
            restaurant_id: self.restaurant_id.unwrap_or(reservation.restaurant_id),
            date_reserv: self.date_reserv.unwrap_or(reservation.date_reserv),
            guest_count: self.guest_count.unwrap_or(reservation.guest_count),
            comment: self.comment.clone().or_else(|| reservation.comment.clone()),
            status: self.status.unwrap_or(reservation.status),
        }
    }
}

// ============================================================================
// USER
// ============================================================================

/// Public profile of a registered user. Credentials never leave the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct User {
    pub id: UserId,
    pub username: String,
}

/// Profile update for the calling user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UserPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl UserPatch {
    pub fn validate(&self) -> SiriusResult<()> {
        match &self.username {
            Some(username) => require_text("username", username),
            None => Err(ValidationError::EmptyPatch {
                kind: EntityKind::User,
            }
            .into()),
        }
    }

    pub fn apply(&self, user: &User) -> User {
        User {
            id: user.id,
            username: self
                .username
                .clone()
                .unwrap_or_else(|| user.username.clone()),
        }
    }
}
