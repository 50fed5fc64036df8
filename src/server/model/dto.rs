//! Request payloads carried by tasks.
//!
//! These types travel through the broker as JSON, a task handler decodes its payload back
//! into the same type the producer serialized.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    /// Password digest, computed by the producer so the plaintext never reaches the broker
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserUpdate {
    pub email: String,
    pub username: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuth2SaveUser {
    pub email: String,
    pub username: String,
    /// Name of the OAuth2 provider, stored as the account kind
    pub provider: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductLine {
    pub inventory_id: i64,
    pub quantity: i64,
    pub currency_code: String,
    pub total_amount: i64,
}

/// Order to create, identified by the producer.
///
/// The uuid is assigned before enqueueing, so executing the same request again resumes the
/// order created by an earlier attempt instead of creating another one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub uuid: Uuid,
    pub user_id: i64,
    pub delivery_id: i64,
    pub products: Vec<ProductLine>,
}

impl CreateOrderRequest {
    pub fn new(user_id: i64, delivery_id: i64, products: Vec<ProductLine>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            user_id,
            delivery_id,
            products,
        }
    }
}

/// Payload of the worker self-check task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckPayload {
    pub token: String,
}
