//! Enum types for Sirius records

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// DISH CATEGORY
// ============================================================================

/// Closed set of menu categories a dish can belong to.
///
/// Three spellings exist for every category:
/// - the display value (`"Суп"`), used on the wire
/// - the database label (`"SOUP"`), used by the `dish_category` Postgres enum
/// - the slug (`"soup"`), used inside cache keys so keys stay ASCII
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum DishCategory {
    #[serde(rename = "Закуска")]
    Appetizer,
    #[serde(rename = "Основное блюдо")]
    MainCourse,
    #[serde(rename = "Десерт")]
    Dessert,
    #[serde(rename = "Суп")]
    Soup,
    #[serde(rename = "Салат")]
    Salad,
    #[serde(rename = "Горячий напиток")]
    HotDrink,
    #[serde(rename = "Холодный напиток")]
    ColdDrink,
}

impl DishCategory {
    /// Every category, in menu order.
    pub const ALL: [DishCategory; 7] = [
        DishCategory::Appetizer,
        DishCategory::MainCourse,
        DishCategory::Dessert,
        DishCategory::Soup,
        DishCategory::Salad,
        DishCategory::HotDrink,
        DishCategory::ColdDrink,
    ];

    /// Display value shown to guests.
    pub fn as_str(&self) -> &'static str {
        match self {
            DishCategory::Appetizer => "Закуска",
            DishCategory::MainCourse => "Основное блюдо",
            DishCategory::Dessert => "Десерт",
            DishCategory::Soup => "Суп",
            DishCategory::Salad => "Салат",
            DishCategory::HotDrink => "Горячий напиток",
            DishCategory::ColdDrink => "Холодный напиток",
        }
    }

    /// Label stored in the `dish_category` database enum.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            DishCategory::Appetizer => "APPETIZER",
            DishCategory::MainCourse => "MAIN_COURSE",
            DishCategory::Dessert => "DESSERT",
            DishCategory::Soup => "SOUP",
            DishCategory::Salad => "SALAD",
            DishCategory::HotDrink => "HOT_DRINK",
            DishCategory::ColdDrink => "COLD_DRINK",
        }
    }

    /// ASCII slug used as the category segment of cache keys.
    pub fn slug(&self) -> &'static str {
        match self {
            DishCategory::Appetizer => "appetizer",
            DishCategory::MainCourse => "main_course",
            DishCategory::Dessert => "dessert",
            DishCategory::Soup => "soup",
            DishCategory::Salad => "salad",
            DishCategory::HotDrink => "hot_drink",
            DishCategory::ColdDrink => "cold_drink",
        }
    }

    /// Parse the database label.
    pub fn from_db_str(s: &str) -> Result<Self, CategoryParseError> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_db_str() == s)
            .ok_or_else(|| CategoryParseError(s.to_string()))
    }
}

impl fmt::Display for DishCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DishCategory {
    type Err = CategoryParseError;

    /// Accepts the display value, the database label or the slug.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| {
                c.as_str() == trimmed
                    || c.as_db_str().eq_ignore_ascii_case(trimmed)
                    || c.slug() == trimmed
            })
            .ok_or_else(|| CategoryParseError(s.to_string()))
    }
}

/// Error when parsing an unknown dish category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryParseError(pub String);

impl fmt::Display for CategoryParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid dish category: {}", self.0)
    }
}

impl std::error::Error for CategoryParseError {}

// ============================================================================
// ENTITY KIND
// ============================================================================

/// Record kind discriminator used in errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum EntityKind {
    Dish,
    Restaurant,
    Reservation,
    User,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Dish => "dish",
            EntityKind::Restaurant => "restaurant",
            EntityKind::Reservation => "reservation",
            EntityKind::User => "user",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
