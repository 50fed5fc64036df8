//! Addresses repository.

use std::sync::Arc;

use async_trait::async_trait;

use super::db::{collect_all, collect_one, insert_returning_id, Database};
use crate::server::{
    cache::{CacheAside, Fingerprint},
    error::Error,
    model::entity::{Address, NewAddress},
};

#[async_trait]
pub trait AddressRepository: Send + Sync {
    async fn get_by_id(&self, id: i64) -> Result<Address, Error>;

    /// Returns every address of a user ordered by id
    async fn get_by_user_id(&self, user_id: i64) -> Result<Vec<Address>, Error>;

    async fn insert(&self, address: NewAddress) -> Result<i64, Error>;
}

pub struct SqlAddressRepository {
    db: Arc<dyn Database>,
}

impl SqlAddressRepository {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AddressRepository for SqlAddressRepository {
    async fn get_by_id(&self, id: i64) -> Result<Address, Error> {
        let rows = self
            .db
            .query(
                "SELECT id, user_id, street, ward, district, city FROM addresses WHERE id = $1",
                vec![id.into()],
            )
            .await?;

        Ok(collect_one(rows)?)
    }

    async fn get_by_user_id(&self, user_id: i64) -> Result<Vec<Address>, Error> {
        let rows = self
            .db
            .query(
                "SELECT id, user_id, street, ward, district, city FROM addresses \
                 WHERE user_id = $1 ORDER BY id",
                vec![user_id.into()],
            )
            .await?;

        Ok(collect_all(rows)?)
    }

    async fn insert(&self, address: NewAddress) -> Result<i64, Error> {
        let id = insert_returning_id(
            self.db.as_ref(),
            "INSERT INTO addresses (user_id, street, ward, district, city) \
             VALUES ($1, $2, $3, $4, $5) RETURNING id",
            vec![
                address.user_id.into(),
                address.street.into(),
                address.ward.into(),
                address.district.into(),
                address.city.into(),
            ],
        )
        .await?;

        Ok(id)
    }
}

pub struct CachedAddressRepository<R> {
    inner: R,
    cache: CacheAside,
}

impl<R: AddressRepository> CachedAddressRepository<R> {
    pub fn new(inner: R, cache: CacheAside) -> Self {
        Self { inner, cache }
    }

    fn user_key(user_id: i64) -> Fingerprint {
        Fingerprint::new("AddressRepository::get_by_user_id")
            .arg(&user_id)
            .finish()
    }
}

#[async_trait]
impl<R: AddressRepository> AddressRepository for CachedAddressRepository<R> {
    async fn get_by_id(&self, id: i64) -> Result<Address, Error> {
        let key = Fingerprint::new("AddressRepository::get_by_id")
            .arg(&id)
            .finish();

        self.cache
            .read_one(&key, || self.inner.get_by_id(id))
            .await
    }

    async fn get_by_user_id(&self, user_id: i64) -> Result<Vec<Address>, Error> {
        self.cache
            .read_many(&Self::user_key(user_id), || {
                self.inner.get_by_user_id(user_id)
            })
            .await
    }

    async fn insert(&self, address: NewAddress) -> Result<i64, Error> {
        let key = Self::user_key(address.user_id);
        let id = self.inner.insert(address).await?;

        self.cache.invalidate(&[key]).await;

        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use swipex_test_utils::prelude::*;

    use super::*;
    use crate::server::{
        cache::{codec, Cache, MemoryCache},
        error::{cache::CacheError, data::DataError},
    };

    fn new_address(user_id: i64, street: &str) -> NewAddress {
        NewAddress {
            user_id,
            street: street.to_string(),
            ward: "Ben Nghe".to_string(),
            district: "District 1".to_string(),
            city: "Ho Chi Minh City".to_string(),
        }
    }

    struct CountingAddresses {
        inner: SqlAddressRepository,
        reads: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl AddressRepository for CountingAddresses {
        async fn get_by_id(&self, id: i64) -> Result<Address, Error> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.get_by_id(id).await
        }

        async fn get_by_user_id(&self, user_id: i64) -> Result<Vec<Address>, Error> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.get_by_user_id(user_id).await
        }

        async fn insert(&self, address: NewAddress) -> Result<i64, Error> {
            self.inner.insert(address).await
        }
    }

    struct Fixture {
        _test: TestSetup,
        cache: Arc<MemoryCache>,
        reads: Arc<AtomicUsize>,
        repo: CachedAddressRepository<CountingAddresses>,
    }

    async fn fixture() -> Result<Fixture, TestError> {
        let test = TestSetup::new().await?;
        let cache = Arc::new(MemoryCache::new());
        let reads = Arc::new(AtomicUsize::new(0));
        let counting = CountingAddresses {
            inner: SqlAddressRepository::new(Arc::new(test.db.clone())),
            reads: reads.clone(),
        };
        let repo = CachedAddressRepository::new(counting, CacheAside::new(cache.clone()));

        Ok(Fixture {
            _test: test,
            cache,
            reads,
            repo,
        })
    }

    #[tokio::test]
    async fn get_by_id_hit_skips_store() -> Result<(), TestError> {
        let fixture = fixture().await?;
        let id = fixture.repo.insert(new_address(42, "1 Le Loi")).await.unwrap();

        let first = fixture.repo.get_by_id(id).await.unwrap();
        let second = fixture.repo.get_by_id(id).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.street, "1 Le Loi");
        assert_eq!(fixture.reads.load(Ordering::SeqCst), 1);

        Ok(())
    }

    #[tokio::test]
    async fn insert_invalidates_addresses_of_user() -> Result<(), TestError> {
        let fixture = fixture().await?;
        fixture.repo.insert(new_address(42, "1 Le Loi")).await.unwrap();
        assert_eq!(fixture.repo.get_by_user_id(42).await.unwrap().len(), 1);

        fixture.repo.insert(new_address(42, "2 Hai Ba Trung")).await.unwrap();
        let addresses = fixture.repo.get_by_user_id(42).await.unwrap();

        let streets: Vec<&str> = addresses.iter().map(|a| a.street.as_str()).collect();
        assert_eq!(streets, vec!["1 Le Loi", "2 Hai Ba Trung"]);
        assert_eq!(fixture.reads.load(Ordering::SeqCst), 2);

        Ok(())
    }

    #[tokio::test]
    async fn unknown_address_is_not_found() -> Result<(), TestError> {
        let fixture = fixture().await?;

        let result = fixture.repo.get_by_id(404).await;

        assert!(matches!(
            result,
            Err(Error::DataError(DataError::NotFound(_)))
        ));

        Ok(())
    }

    /// Expect Error when a listing entry is found where a single address is expected
    #[tokio::test]
    async fn entry_of_wrong_shape_fails_read() -> Result<(), TestError> {
        let fixture = fixture().await?;
        let key = Fingerprint::new("AddressRepository::get_by_id")
            .arg(&1i64)
            .finish();
        let listing = codec::encode_many::<Address>(&[]).unwrap();
        fixture
            .cache
            .set(key.as_str(), listing, fixture.repo.cache.ttl())
            .await
            .unwrap();

        let result = fixture.repo.get_by_id(1).await;

        assert!(matches!(
            result,
            Err(Error::CacheError(CacheError::TypeMismatch { .. }))
        ));
        assert_eq!(fixture.reads.load(Ordering::SeqCst), 0);

        Ok(())
    }
}
