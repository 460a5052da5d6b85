//! Identity types for Sirius records
//!
//! Every record is keyed by a store-assigned integer. Each kind gets its own
//! newtype so a dish id can never be passed where a restaurant id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Defines a transparent `i64` identifier newtype.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wrap a raw store identifier.
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// The raw store identifier.
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<i64>().map(Self)
            }
        }
    };
}

define_id!(
    /// Identifier of a dish.
    DishId
);
define_id!(
    /// Identifier of a restaurant.
    RestaurantId
);
define_id!(
    /// Identifier of a table reservation.
    ReservationId
);
define_id!(
    /// Identifier of a registered user.
    UserId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_serializes_as_bare_integer() -> Result<(), serde_json::Error> {
        let id = DishId::new(42);
        assert_eq!(serde_json::to_string(&id)?, "42");
        let back: DishId = serde_json::from_str("42")?;
        assert_eq!(back, id);
        Ok(())
    }

    #[test]
    fn test_id_parse_and_display() {
        let id: RestaurantId = " 7 ".parse().expect("valid id");
        assert_eq!(id.get(), 7);
        assert_eq!(id.to_string(), "7");
        assert!("seven".parse::<RestaurantId>().is_err());
    }
}
