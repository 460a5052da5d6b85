//! Sirius Core - Domain Types
//!
//! Records, closed enums, the role allow-list and the error taxonomy shared
//! by every other crate. Nothing here performs I/O.

pub mod entities;
pub mod enums;
pub mod error;
pub mod identity;
pub mod role;

pub use entities::{
    dedup_menu, Dish, DishPatch, NewDish, NewReservation, NewRestaurant, Reservation,
    ReservationPatch, Restaurant, RestaurantPatch, User, UserPatch,
};
pub use enums::{CategoryParseError, DishCategory, EntityKind};
pub use error::{
    AccessDenied, ConfigError, SiriusError, SiriusResult, StorageError, ValidationError,
};
pub use identity::{DishId, ReservationId, RestaurantId, UserId};
pub use role::{authorize, Operation, Role, RoleParseError, ALLOW_LIST};
