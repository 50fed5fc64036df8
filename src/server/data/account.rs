//! Accounts repository.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::Value;

use super::db::{collect_one, insert_returning_id, Database};
use crate::server::{
    cache::{CacheAside, Fingerprint},
    error::{data::DataError, Error},
    model::entity::{Account, AccountInfo, NewAccount},
};

#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn get_by_email(&self, email: &str) -> Result<Account, Error>;

    /// Inserts an account and returns its id, emails are unique
    async fn insert(&self, account: NewAccount) -> Result<i64, Error>;

    /// Updates the provided fields of the account identified by `info.email`
    async fn save_info(&self, info: AccountInfo) -> Result<(), Error>;
}

pub struct SqlAccountRepository {
    db: Arc<dyn Database>,
}

impl SqlAccountRepository {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AccountRepository for SqlAccountRepository {
    async fn get_by_email(&self, email: &str) -> Result<Account, Error> {
        let rows = self
            .db
            .query(
                "SELECT id, username, email, password, role, kind, created_at \
                 FROM accounts WHERE email = $1",
                vec![email.into()],
            )
            .await?;

        Ok(collect_one(rows)?)
    }

    async fn insert(&self, account: NewAccount) -> Result<i64, Error> {
        let id = insert_returning_id(
            self.db.as_ref(),
            "INSERT INTO accounts (username, email, password, role, kind, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
            vec![
                account.username.into(),
                account.email.into(),
                account.password.into(),
                account.role.into(),
                account.kind.into(),
                Utc::now().into(),
            ],
        )
        .await?;

        Ok(id)
    }

    async fn save_info(&self, info: AccountInfo) -> Result<(), Error> {
        let mut assignments = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        for (column, value) in [("username", info.username), ("role", info.role)] {
            if let Some(value) = value {
                values.push(value.into());
                assignments.push(format!("{} = ${}", column, values.len()));
            }
        }

        // Nothing to change, still report unknown accounts
        if assignments.is_empty() {
            self.get_by_email(&info.email).await?;
            return Ok(());
        }

        values.push(info.email.clone().into());
        let sql = format!(
            "UPDATE accounts SET {} WHERE email = ${}",
            assignments.join(", "),
            values.len()
        );

        let affected = self.db.execute(&sql, values).await?;
        if affected == 0 {
            return Err(DataError::NotFound(format!("account with email {}", info.email)).into());
        }

        Ok(())
    }
}

/// Caches `get_by_email`, writes invalidate the email they touch.
pub struct CachedAccountRepository<R> {
    inner: R,
    cache: CacheAside,
}

impl<R: AccountRepository> CachedAccountRepository<R> {
    pub fn new(inner: R, cache: CacheAside) -> Self {
        Self { inner, cache }
    }

    fn email_key(email: &str) -> Fingerprint {
        Fingerprint::new("AccountRepository::get_by_email")
            .arg(email)
            .finish()
    }
}

#[async_trait]
impl<R: AccountRepository> AccountRepository for CachedAccountRepository<R> {
    async fn get_by_email(&self, email: &str) -> Result<Account, Error> {
        self.cache
            .read_one(&Self::email_key(email), || self.inner.get_by_email(email))
            .await
    }

    async fn insert(&self, account: NewAccount) -> Result<i64, Error> {
        let key = Self::email_key(&account.email);
        let id = self.inner.insert(account).await?;

        self.cache.invalidate(&[key]).await;

        Ok(id)
    }

    async fn save_info(&self, info: AccountInfo) -> Result<(), Error> {
        let key = Self::email_key(&info.email);
        self.inner.save_info(info).await?;

        self.cache.invalidate(&[key]).await;

        Ok(())
    }
}
