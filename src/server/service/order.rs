//! Order use cases.

use std::sync::Arc;

use uuid::Uuid;

use crate::server::{
    data::order::OrderRepository,
    error::{data::DataError, Error},
    model::{
        dto::{CreateOrderRequest, ProductLine},
        entity::{NewOrder, NewProductInOrder, Order},
        task::{QueueClass, TaskName},
    },
    worker::client::TaskClient,
};

const PENDING_STATUS: &str = "pending";

/// Executes order operations directly against the repository
#[derive(Clone)]
pub struct OrderService {
    repo: Arc<dyn OrderRepository>,
}

impl OrderService {
    pub fn new(repo: Arc<dyn OrderRepository>) -> Self {
        Self { repo }
    }

    /// Creates a pending order with its product lines.
    ///
    /// The order total is the sum of the line totals. Running the same request again
    /// continues the order stored under its uuid, inserting only the lines an earlier attempt
    /// did not store, so retries and redeliveries never duplicate an order.
    ///
    /// # Returns
    /// - `Ok(Uuid)` - Identifier of the order, taken from the request
    /// - `Err(DataError::InvalidInput)` - The line totals overflow the order total
    /// - `Err(Error)` - The order or one of its lines could not be stored
    pub async fn create_order(&self, req: CreateOrderRequest) -> Result<Uuid, Error> {
        let total_amount = order_total(&req.products)?;

        let order_id = match self.repo.get_by_uuid(req.uuid).await {
            Ok(order) => {
                tracing::debug!("Resuming order {}", req.uuid);
                order.id
            }
            Err(Error::DataError(DataError::NotFound(_))) => {
                self.repo
                    .create(NewOrder {
                        uuid: req.uuid,
                        user_id: req.user_id,
                        delivery_id: req.delivery_id,
                        total_amount,
                        status: PENDING_STATUS.to_string(),
                    })
                    .await?
            }
            Err(e) => return Err(e),
        };

        // Lines are stored in request order, an earlier attempt stored a prefix of them
        let stored = self.repo.get_products_by_order_id(order_id).await?.len();

        for line in req.products.into_iter().skip(stored) {
            self.repo
                .insert_product(NewProductInOrder {
                    order_id,
                    inventory_id: line.inventory_id,
                    quantity: line.quantity,
                    currency_code: line.currency_code,
                    total_amount: line.total_amount,
                })
                .await?;
        }

        tracing::debug!("Created order {} for user {}", req.uuid, req.user_id);

        Ok(req.uuid)
    }

    /// Lists the most recent orders of a user, newest first
    pub async fn get_orders(&self, user_id: i64, limit: i64) -> Result<Vec<Order>, Error> {
        self.repo.get(user_id, limit).await
    }
}

fn order_total(lines: &[ProductLine]) -> Result<i64, DataError> {
    lines
        .iter()
        .try_fold(0i64, |total, line| total.checked_add(line.total_amount))
        .ok_or_else(|| DataError::InvalidInput("order total overflows".to_string()))
}

/// Producer side of the order operations
#[derive(Clone)]
pub struct OrderTasks {
    client: TaskClient,
}

impl OrderTasks {
    pub fn new(client: TaskClient) -> Self {
        Self { client }
    }

    /// Enqueues the order on the default queue and returns the uuid it will be stored under
    pub async fn create_order(&self, req: CreateOrderRequest) -> Result<Uuid, Error> {
        self.client
            .enqueue_payload(QueueClass::Default, TaskName::CreateOrder, &req)
            .await?;

        Ok(req.uuid)
    }
}
