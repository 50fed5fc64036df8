//! Cache-aside layer for repositories.
//!
//! Repositories are wrapped by decorators implementing the same trait. Reads are looked up by
//! [`Fingerprint`] and populated from the underlying store on a miss, writes always go to the
//! store first and then invalidate the fingerprints they affect. Entries are never written
//! independently of the store and expire after the decorator's TTL.

pub mod aside;
pub mod codec;
pub mod fingerprint;
pub mod memory;
pub mod redis;

pub use aside::CacheAside;
pub use fingerprint::{Fingerprint, FingerprintArg, FingerprintBuilder};
pub use memory::MemoryCache;
pub use redis::RedisCache;

use std::time::Duration;

use async_trait::async_trait;

use crate::server::error::cache::CacheError;

/// Byte-level key/value cache.
///
/// A miss is `Ok(None)`, distinct from a backend error.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}
