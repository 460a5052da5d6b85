//! Roles and the mutation allow-list
//!
//! Permission checks are a lookup in [`ALLOW_LIST`], keyed by [`Operation`].
//! Roles are compared by exact match; no role implies another.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::error::AccessDenied;

// ============================================================================
// ROLE
// ============================================================================

/// Role claim carried by an authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum Role {
    #[serde(rename = "Администратор", alias = "administrator")]
    Administrator,
    #[serde(rename = "Сотрудник", alias = "staff")]
    Staff,
    #[serde(rename = "Пользователь", alias = "user")]
    User,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Administrator, Role::Staff, Role::User];

    /// Canonical claim value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Administrator => "Администратор",
            Role::Staff => "Сотрудник",
            Role::User => "Пользователь",
        }
    }

    /// ASCII alias accepted alongside the canonical value.
    pub fn alias(&self) -> &'static str {
        match self {
            Role::Administrator => "administrator",
            Role::Staff => "staff",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == trimmed || r.alias().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| RoleParseError(s.to_string()))
    }
}

/// Error when a role claim is outside the closed role set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown role: {0}")]
pub struct RoleParseError(pub String);

// ============================================================================
// OPERATIONS
// ============================================================================

/// Role-gated mutating operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    CreateDish,
    UpdateDish,
    DeleteDish,
    CreateRestaurant,
    UpdateRestaurant,
    DeleteRestaurant,
    CreateReservation,
    UpdateReservation,
    DeleteReservation,
}

impl Operation {
    pub const ALL: [Operation; 9] = [
        Operation::CreateDish,
        Operation::UpdateDish,
        Operation::DeleteDish,
        Operation::CreateRestaurant,
        Operation::UpdateRestaurant,
        Operation::DeleteRestaurant,
        Operation::CreateReservation,
        Operation::UpdateReservation,
        Operation::DeleteReservation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::CreateDish => "create_dish",
            Operation::UpdateDish => "update_dish",
            Operation::DeleteDish => "delete_dish",
            Operation::CreateRestaurant => "create_restaurant",
            Operation::UpdateRestaurant => "update_restaurant",
            Operation::DeleteRestaurant => "delete_restaurant",
            Operation::CreateReservation => "create_reservation",
            Operation::UpdateReservation => "update_reservation",
            Operation::DeleteReservation => "delete_reservation",
        }
    }

    /// Roles permitted to run this operation.
    pub fn allowed_roles(self) -> &'static [Role] {
        ALLOW_LIST
            .iter()
            .find(|(op, _)| *op == self)
            .map(|(_, roles)| *roles)
            .unwrap_or(&[])
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const MENU_EDITORS: &[Role] = &[Role::Administrator, Role::Staff];
const ADMINISTRATORS: &[Role] = &[Role::Administrator];
const STAFF: &[Role] = &[Role::Staff];
const ANY_ROLE: &[Role] = &[Role::Administrator, Role::Staff, Role::User];

/// Allow-list table. An operation missing from the table is denied to everyone.
pub const ALLOW_LIST: &[(Operation, &[Role])] = &[
    (Operation::CreateDish, MENU_EDITORS),
    (Operation::UpdateDish, MENU_EDITORS),
    (Operation::DeleteDish, MENU_EDITORS),
    (Operation::CreateRestaurant, ADMINISTRATORS),
    (Operation::UpdateRestaurant, ADMINISTRATORS),
    (Operation::DeleteRestaurant, ADMINISTRATORS),
    (Operation::CreateReservation, ANY_ROLE),
    (Operation::UpdateReservation, STAFF),
    (Operation::DeleteReservation, STAFF),
];

/// Check a role claim against the allow-list for `operation`.
pub fn authorize(role: Role, operation: Operation) -> Result<(), AccessDenied> {
    if operation.allowed_roles().contains(&role) {
        Ok(())
    } else {
        Err(AccessDenied { role, operation })
    }
}
