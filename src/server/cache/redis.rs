use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use fred::{interfaces::KeysInterface, prelude::*, types::Expiration};

use super::Cache;
use crate::server::error::cache::CacheError;

const DEFAULT_CACHE_PREFIX: &str = "swipex:cache";

/// Redis/Valkey backed cache.
///
/// Keys are namespaced under a prefix so the cache can share a Redis instance with the task
/// queue. The pool is created once at startup and cloned into the cache.
#[derive(Clone)]
pub struct RedisCache {
    pool: Pool,
    prefix: String,
}

impl RedisCache {
    pub fn new(pool: Pool) -> Self {
        Self::with_prefix(pool, DEFAULT_CACHE_PREFIX.to_string())
    }

    /// Create a new RedisCache with a custom key prefix (useful for testing)
    pub fn with_prefix(pool: Pool, prefix: String) -> Self {
        Self { pool, prefix }
    }

    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let value: Option<Vec<u8>> = self.pool.get(self.key(key)).await?;

        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        // PX rejects 0, keep at least one millisecond
        let ttl_ms = (ttl.as_millis() as i64).max(1);

        let _: () = self
            .pool
            .set(
                self.key(key),
                Bytes::from(value),
                Some(Expiration::PX(ttl_ms)),
                None,
                false,
            )
            .await?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let _: i64 = self.pool.del(self.key(key)).await?;

        Ok(())
    }
}
