use std::{future::Future, sync::Arc, time::Duration};

use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use super::{codec, Cache, Fingerprint, FingerprintBuilder};
use crate::server::error::{cache::CacheError, Error};

const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Generation used while a scope has never been bumped
const INITIAL_GENERATION: &str = "0";

/// Read-through/invalidate-on-write helper shared by the repository decorators.
///
/// Reads are served from the cache when the fingerprint is present; on a miss the loader is
/// called and a successful result is stored with the decorator's TTL. Loader errors are
/// returned unchanged and nothing is cached.
///
/// Cache backend failures never fail a read, the store is used directly and the problem is
/// logged. A cached entry that exists but has the wrong shape or cannot be decoded fails the
/// read with a [`CacheError`].
#[derive(Clone)]
pub struct CacheAside {
    cache: Arc<dyn Cache>,
    ttl: Duration,
}

impl CacheAside {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self::with_ttl(cache, DEFAULT_TTL)
    }

    pub fn with_ttl(cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Reads a single entity through the cache
    pub async fn read_one<T, F, Fut>(&self, key: &Fingerprint, load: F) -> Result<T, Error>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        match self.lookup(key).await {
            Lookup::Hit(bytes) => Ok(codec::decode_one(&bytes)?),
            Lookup::Miss => {
                let value = load().await?;
                self.store(key, codec::encode_one(&value)).await;
                Ok(value)
            }
            Lookup::Unavailable => load().await,
        }
    }

    /// Reads an ordered sequence of entities through the cache
    pub async fn read_many<T, F, Fut>(&self, key: &Fingerprint, load: F) -> Result<Vec<T>, Error>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>, Error>>,
    {
        match self.lookup(key).await {
            Lookup::Hit(bytes) => Ok(codec::decode_many(&bytes)?),
            Lookup::Miss => {
                let values = load().await?;
                self.store(key, codec::encode_many(&values)).await;
                Ok(values)
            }
            Lookup::Unavailable => load().await,
        }
    }

    /// Removes cached entries after a successful write.
    ///
    /// The write has already been committed, so failures are logged rather than returned;
    /// stale entries still expire with the TTL.
    pub async fn invalidate(&self, keys: &[Fingerprint]) {
        for key in keys {
            if let Err(e) = self.cache.delete(key.as_str()).await {
                tracing::warn!("Failed to invalidate cache entry {}: {}", key, e);
            }
        }
    }

    /// Finishes a fingerprint under the current generation of a scope.
    ///
    /// A scope groups keys which cannot be enumerated at write time, such as every `limit`
    /// a user's orders were listed with. Bumping the scope moves all of them to a fresh
    /// generation at once. When the generation cannot be read, a random generation is used so
    /// the call misses instead of risking a stale hit.
    pub async fn scoped(&self, scope: &str, builder: FingerprintBuilder) -> Fingerprint {
        let generation = match self.cache.get(&Self::scope_key(scope)).await {
            Ok(Some(bytes)) => {
                String::from_utf8(bytes).unwrap_or_else(|_| Uuid::new_v4().to_string())
            }
            Ok(None) => INITIAL_GENERATION.to_string(),
            Err(e) => {
                tracing::warn!("Failed to read generation of cache scope {}: {}", scope, e);
                Uuid::new_v4().to_string()
            }
        };

        builder.scope(&generation).finish()
    }

    /// Invalidates every key of a scope by moving it to a new generation.
    ///
    /// The generation outlives twice the entry TTL, so entries written under an older
    /// generation have expired before the scope can fall back to its initial generation.
    pub async fn bump_scope(&self, scope: &str) {
        let generation = Uuid::new_v4().to_string().into_bytes();

        if let Err(e) = self
            .cache
            .set(&Self::scope_key(scope), generation, self.ttl * 2)
            .await
        {
            tracing::warn!("Failed to bump cache scope {}: {}", scope, e);
        }
    }

    fn scope_key(scope: &str) -> String {
        format!("scope:{}", scope)
    }

    async fn lookup(&self, key: &Fingerprint) -> Lookup {
        match self.cache.get(key.as_str()).await {
            Ok(Some(bytes)) => {
                tracing::debug!("Cache hit for {}", key);
                Lookup::Hit(bytes)
            }
            Ok(None) => {
                tracing::debug!("Cache miss for {}", key);
                Lookup::Miss
            }
            Err(e) => {
                tracing::warn!("Cache lookup for {} failed, reading from store: {}", key, e);
                Lookup::Unavailable
            }
        }
    }

    async fn store(&self, key: &Fingerprint, encoded: Result<Vec<u8>, CacheError>) {
        let result = match encoded {
            Ok(bytes) => self.cache.set(key.as_str(), bytes, self.ttl).await,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            tracing::warn!("Failed to populate cache entry {}: {}", key, e);
        }
    }
}

enum Lookup {
    Hit(Vec<u8>),
    Miss,
    Unavailable,
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::server::{cache::MemoryCache, error::data::DataError};

    fn aside() -> (Arc<MemoryCache>, CacheAside) {
        let cache = Arc::new(MemoryCache::new());
        let aside = CacheAside::with_ttl(cache.clone(), Duration::from_secs(60));
        (cache, aside)
    }

    fn key(name: &str) -> Fingerprint {
        Fingerprint::new("Test::read").arg(name).finish()
    }

    /// Cache whose every operation fails
    struct BrokenCache;

    #[async_trait]
    impl Cache for BrokenCache {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
            Err(CacheError::Backend("connection refused".to_string()))
        }

        async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Backend("connection refused".to_string()))
        }

        async fn delete(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::Backend("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn hit_skips_loader() {
        let (_, aside) = aside();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: String = aside
                .read_one(&key("a"), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("value".to_string())
                })
                .await
                .unwrap();
            assert_eq!(value, "value");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn loader_error_is_propagated_and_not_cached() {
        let (cache, aside) = aside();

        let result: Result<String, Error> = aside
            .read_one(&key("a"), || async {
                Err(DataError::NotFound("a".to_string()).into())
            })
            .await;

        assert!(matches!(result, Err(Error::DataError(DataError::NotFound(_)))));
        assert!(cache.is_empty().await, "Failed reads must not be cached");
    }

    #[tokio::test]
    async fn invalidate_forces_reload() {
        let (_, aside) = aside();

        let first: Vec<i64> = aside
            .read_many(&key("a"), || async { Ok(vec![1, 2]) })
            .await
            .unwrap();
        let cached: Vec<i64> = aside
            .read_many(&key("a"), || async { Ok(vec![3]) })
            .await
            .unwrap();

        aside.invalidate(&[key("a")]).await;

        let reloaded: Vec<i64> = aside
            .read_many(&key("a"), || async { Ok(vec![3]) })
            .await
            .unwrap();

        assert_eq!(first, vec![1, 2]);
        assert_eq!(cached, vec![1, 2]);
        assert_eq!(reloaded, vec![3]);
    }

    #[tokio::test]
    async fn shape_mismatch_fails_fast() {
        let (_, aside) = aside();

        let _: Vec<i64> = aside
            .read_many(&key("a"), || async { Ok(vec![1, 2]) })
            .await
            .unwrap();

        let result: Result<i64, Error> = aside.read_one(&key("a"), || async { Ok(1) }).await;

        assert!(matches!(
            result,
            Err(Error::CacheError(CacheError::TypeMismatch { .. }))
        ));
    }

    #[tokio::test]
    async fn broken_cache_falls_back_to_store() {
        let aside = CacheAside::new(Arc::new(BrokenCache));
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let value: i64 = aside
                .read_one(&key("a"), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                })
                .await
                .unwrap();
            assert_eq!(value, 7);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn bump_scope_changes_scoped_fingerprint() {
        let (_, aside) = aside();

        let before = aside
            .scoped("orders:user:42", Fingerprint::new("OrderRepository::get").arg(&42_i64))
            .await;
        let unchanged = aside
            .scoped("orders:user:42", Fingerprint::new("OrderRepository::get").arg(&42_i64))
            .await;

        aside.bump_scope("orders:user:42").await;

        let after = aside
            .scoped("orders:user:42", Fingerprint::new("OrderRepository::get").arg(&42_i64))
            .await;

        assert_eq!(before, unchanged);
        assert_ne!(before, after);
    }

    #[tokio::test]
    async fn broken_cache_scoped_fingerprints_never_repeat() {
        let aside = CacheAside::new(Arc::new(BrokenCache));

        let first = aside.scoped("s", Fingerprint::new("m")).await;
        let second = aside.scoped("s", Fingerprint::new("m")).await;

        assert_ne!(first, second);
    }
}
