//! Categories repository.

use std::sync::Arc;

use async_trait::async_trait;

use super::db::{collect_all, collect_one, insert_returning_id, Database};
use crate::server::{
    cache::{CacheAside, Fingerprint},
    error::{data::DataError, Error},
    model::entity::{Category, NewCategory},
};

/// Scope of every cached category listing
const LISTING_SCOPE: &str = "categories";

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn get_by_id(&self, id: i64) -> Result<Category, Error>;

    /// Returns up to `limit` categories ordered by id
    async fn get_limit(&self, limit: i64) -> Result<Vec<Category>, Error>;

    async fn insert(&self, category: NewCategory) -> Result<i64, Error>;

    /// Replaces the name and description of the category with the same id
    async fn update(&self, category: Category) -> Result<(), Error>;

    async fn delete_by_id(&self, id: i64) -> Result<(), Error>;
}

pub struct SqlCategoryRepository {
    db: Arc<dyn Database>,
}

impl SqlCategoryRepository {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CategoryRepository for SqlCategoryRepository {
    async fn get_by_id(&self, id: i64) -> Result<Category, Error> {
        let rows = self
            .db
            .query(
                "SELECT id, name, description FROM categories WHERE id = $1",
                vec![id.into()],
            )
            .await?;

        Ok(collect_one(rows)?)
    }

    async fn get_limit(&self, limit: i64) -> Result<Vec<Category>, Error> {
        let rows = self
            .db
            .query(
                "SELECT id, name, description FROM categories ORDER BY id LIMIT $1",
                vec![limit.into()],
            )
            .await?;

        Ok(collect_all(rows)?)
    }

    async fn insert(&self, category: NewCategory) -> Result<i64, Error> {
        let id = insert_returning_id(
            self.db.as_ref(),
            "INSERT INTO categories (name, description) VALUES ($1, $2) RETURNING id",
            vec![category.name.into(), category.description.into()],
        )
        .await?;

        Ok(id)
    }

    async fn update(&self, category: Category) -> Result<(), Error> {
        let affected = self
            .db
            .execute(
                "UPDATE categories SET name = $1, description = $2 WHERE id = $3",
                vec![
                    category.name.into(),
                    category.description.into(),
                    category.id.into(),
                ],
            )
            .await?;

        if affected == 0 {
            return Err(DataError::NotFound(format!("category {}", category.id)).into());
        }

        Ok(())
    }

    async fn delete_by_id(&self, id: i64) -> Result<(), Error> {
        let affected = self
            .db
            .execute("DELETE FROM categories WHERE id = $1", vec![id.into()])
            .await?;

        if affected == 0 {
            return Err(DataError::NotFound(format!("category {}", id)).into());
        }

        Ok(())
    }
}

/// Caches single categories and listings; every write bumps the listing scope.
pub struct CachedCategoryRepository<R> {
    inner: R,
    cache: CacheAside,
}

impl<R: CategoryRepository> CachedCategoryRepository<R> {
    pub fn new(inner: R, cache: CacheAside) -> Self {
        Self { inner, cache }
    }

    fn id_key(id: i64) -> Fingerprint {
        Fingerprint::new("CategoryRepository::get_by_id")
            .arg(&id)
            .finish()
    }

    async fn invalidate_category(&self, id: i64) {
        self.cache.invalidate(&[Self::id_key(id)]).await;
        self.cache.bump_scope(LISTING_SCOPE).await;
    }
}

#[async_trait]
impl<R: CategoryRepository> CategoryRepository for CachedCategoryRepository<R> {
    async fn get_by_id(&self, id: i64) -> Result<Category, Error> {
        self.cache
            .read_one(&Self::id_key(id), || self.inner.get_by_id(id))
            .await
    }

    async fn get_limit(&self, limit: i64) -> Result<Vec<Category>, Error> {
        let builder = Fingerprint::new("CategoryRepository::get_limit").arg(&limit);
        let key = self.cache.scoped(LISTING_SCOPE, builder).await;

        self.cache
            .read_many(&key, || self.inner.get_limit(limit))
            .await
    }

    async fn insert(&self, category: NewCategory) -> Result<i64, Error> {
        let id = self.inner.insert(category).await?;

        self.cache.bump_scope(LISTING_SCOPE).await;

        Ok(id)
    }

    async fn update(&self, category: Category) -> Result<(), Error> {
        let id = category.id;
        self.inner.update(category).await?;

        self.invalidate_category(id).await;

        Ok(())
    }

    async fn delete_by_id(&self, id: i64) -> Result<(), Error> {
        self.inner.delete_by_id(id).await?;

        self.invalidate_category(id).await;

        Ok(())
    }
}
