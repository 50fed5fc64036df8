//! Orders repository, including the product lines of each order.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::db::{collect_all, collect_one, insert_returning_id, Database};
use crate::server::{
    cache::{CacheAside, Fingerprint},
    error::Error,
    model::entity::{NewOrder, NewProductInOrder, Order, ProductInOrder},
};

const ORDER_COLUMNS: &str = "id, uuid, user_id, delivery_id, total_amount, status, created_at";

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Inserts an order and returns its id
    async fn create(&self, order: NewOrder) -> Result<i64, Error>;

    /// Returns up to `limit` orders of a user, newest first
    async fn get(&self, user_id: i64, limit: i64) -> Result<Vec<Order>, Error>;

    async fn get_by_uuid(&self, uuid: Uuid) -> Result<Order, Error>;

    async fn insert_product(&self, product: NewProductInOrder) -> Result<i64, Error>;

    /// Returns the product lines of an order in insertion order
    async fn get_products_by_order_id(&self, order_id: i64)
        -> Result<Vec<ProductInOrder>, Error>;
}

pub struct SqlOrderRepository {
    db: Arc<dyn Database>,
}

impl SqlOrderRepository {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl OrderRepository for SqlOrderRepository {
    async fn create(&self, order: NewOrder) -> Result<i64, Error> {
        let id = insert_returning_id(
            self.db.as_ref(),
            "INSERT INTO orders (uuid, user_id, delivery_id, total_amount, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
            vec![
                order.uuid.into(),
                order.user_id.into(),
                order.delivery_id.into(),
                order.total_amount.into(),
                order.status.into(),
                Utc::now().into(),
            ],
        )
        .await?;

        Ok(id)
    }

    async fn get(&self, user_id: i64, limit: i64) -> Result<Vec<Order>, Error> {
        let sql = format!(
            "SELECT {} FROM orders WHERE user_id = $1 ORDER BY id DESC LIMIT $2",
            ORDER_COLUMNS
        );
        let rows = self
            .db
            .query(&sql, vec![user_id.into(), limit.into()])
            .await?;

        Ok(collect_all(rows)?)
    }

    async fn get_by_uuid(&self, uuid: Uuid) -> Result<Order, Error> {
        let sql = format!("SELECT {} FROM orders WHERE uuid = $1", ORDER_COLUMNS);
        let rows = self.db.query(&sql, vec![uuid.into()]).await?;

        Ok(collect_one(rows)?)
    }

    async fn insert_product(&self, product: NewProductInOrder) -> Result<i64, Error> {
        let id = insert_returning_id(
            self.db.as_ref(),
            "INSERT INTO products_in_order \
             (order_id, inventory_id, quantity, currency_code, total_amount) \
             VALUES ($1, $2, $3, $4, $5) RETURNING id",
            vec![
                product.order_id.into(),
                product.inventory_id.into(),
                product.quantity.into(),
                product.currency_code.into(),
                product.total_amount.into(),
            ],
        )
        .await?;

        Ok(id)
    }

    async fn get_products_by_order_id(
        &self,
        order_id: i64,
    ) -> Result<Vec<ProductInOrder>, Error> {
        let rows = self
            .db
            .query(
                "SELECT id, order_id, inventory_id, quantity, currency_code, total_amount \
                 FROM products_in_order WHERE order_id = $1 ORDER BY id",
                vec![order_id.into()],
            )
            .await?;

        Ok(collect_all(rows)?)
    }
}

/// Caches order listings per user, single orders and product lines.
///
/// Listings are keyed by `(user_id, limit)` under the user's scope, creating an order bumps
/// the scope so every limit the user was listed with is reloaded.
pub struct CachedOrderRepository<R> {
    inner: R,
    cache: CacheAside,
}

impl<R: OrderRepository> CachedOrderRepository<R> {
    pub fn new(inner: R, cache: CacheAside) -> Self {
        Self { inner, cache }
    }

    fn user_scope(user_id: i64) -> String {
        format!("orders:user:{}", user_id)
    }

    fn products_key(order_id: i64) -> Fingerprint {
        Fingerprint::new("OrderRepository::get_products_by_order_id")
            .arg(&order_id)
            .finish()
    }
}

#[async_trait]
impl<R: OrderRepository> OrderRepository for CachedOrderRepository<R> {
    async fn create(&self, order: NewOrder) -> Result<i64, Error> {
        let user_id = order.user_id;
        let id = self.inner.create(order).await?;

        self.cache.bump_scope(&Self::user_scope(user_id)).await;

        Ok(id)
    }

    async fn get(&self, user_id: i64, limit: i64) -> Result<Vec<Order>, Error> {
        let builder = Fingerprint::new("OrderRepository::get")
            .arg(&user_id)
            .arg(&limit);
        let key = self.cache.scoped(&Self::user_scope(user_id), builder).await;

        self.cache
            .read_many(&key, || self.inner.get(user_id, limit))
            .await
    }

    async fn get_by_uuid(&self, uuid: Uuid) -> Result<Order, Error> {
        let key = Fingerprint::new("OrderRepository::get_by_uuid")
            .arg(&uuid)
            .finish();

        self.cache
            .read_one(&key, || self.inner.get_by_uuid(uuid))
            .await
    }

    async fn insert_product(&self, product: NewProductInOrder) -> Result<i64, Error> {
        let key = Self::products_key(product.order_id);
        let id = self.inner.insert_product(product).await?;

        self.cache.invalidate(&[key]).await;

        Ok(id)
    }

    async fn get_products_by_order_id(
        &self,
        order_id: i64,
    ) -> Result<Vec<ProductInOrder>, Error> {
        self.cache
            .read_many(&Self::products_key(order_id), || {
                self.inner.get_products_by_order_id(order_id)
            })
            .await
    }
}
