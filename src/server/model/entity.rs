//! Entities owned by the repositories.
//!
//! Each entity is decoded from a row by its repository through [`FromQueryResult`] and
//! serialized to JSON when cached.

use chrono::{DateTime, Utc};
use sea_orm::FromQueryResult;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Login account of a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromQueryResult)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub email: String,
    /// Password hash, never the plain text password
    pub password: String,
    pub role: String,
    /// Account origin, `"swipe"` for sign ups and the provider name for OAuth2 accounts
    pub kind: String,
    pub created_at: DateTime<Utc>,
}

/// Order placed by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromQueryResult)]
pub struct Order {
    pub id: i64,
    pub uuid: Uuid,
    pub user_id: i64,
    pub delivery_id: i64,
    /// Total in the smallest currency unit
    pub total_amount: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Product line of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromQueryResult)]
pub struct ProductInOrder {
    pub id: i64,
    pub order_id: i64,
    pub inventory_id: i64,
    pub quantity: i64,
    pub currency_code: String,
    pub total_amount: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromQueryResult)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: String,
}

/// Delivery address of a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromQueryResult)]
pub struct Address {
    pub id: i64,
    pub user_id: i64,
    pub street: String,
    pub ward: String,
    pub district: String,
    pub city: String,
}

/// Fields of an account row which are not assigned by the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub kind: String,
}

/// Partial update of the account identified by `email`, `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub email: String,
    pub username: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub uuid: Uuid,
    pub user_id: i64,
    pub delivery_id: i64,
    pub total_amount: i64,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProductInOrder {
    pub order_id: i64,
    pub inventory_id: i64,
    pub quantity: i64,
    pub currency_code: String,
    pub total_amount: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAddress {
    pub user_id: i64,
    pub street: String,
    pub ward: String,
    pub district: String,
    pub city: String,
}
