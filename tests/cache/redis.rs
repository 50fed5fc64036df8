//! Tests for the Redis backed cache and the cache-aside decorators over it

use std::{sync::Arc, time::Duration};

use swipex::server::{
    cache::{Cache, CacheAside, RedisCache},
    data::category::{CachedCategoryRepository, CategoryRepository, SqlCategoryRepository},
    model::entity::NewCategory,
};
use swipex_test_utils::prelude::*;

fn setup_test_cache(redis: &RedisTest) -> RedisCache {
    RedisCache::with_prefix(redis.redis_pool.clone(), format!("{}:cache", redis.prefix()))
}

#[tokio::test]
async fn test_set_then_get() {
    let redis = RedisTest::new().await.expect("Failed to create Redis test");
    let cache = setup_test_cache(&redis);

    assert_eq!(cache.get("key").await.unwrap(), None);

    cache
        .set("key", b"value".to_vec(), Duration::from_secs(60))
        .await
        .expect("Set should succeed");

    assert_eq!(cache.get("key").await.unwrap(), Some(b"value".to_vec()));

    redis.cleanup().await.expect("Failed to cleanup Redis");
}

#[tokio::test]
async fn test_delete_removes_entry() {
    let redis = RedisTest::new().await.expect("Failed to create Redis test");
    let cache = setup_test_cache(&redis);

    cache
        .set("key", b"value".to_vec(), Duration::from_secs(60))
        .await
        .unwrap();
    cache.delete("key").await.expect("Delete should succeed");
    cache.delete("missing").await.expect("Deleting a missing key should succeed");

    assert_eq!(cache.get("key").await.unwrap(), None);

    redis.cleanup().await.expect("Failed to cleanup Redis");
}

#[tokio::test]
async fn test_entries_expire() {
    let redis = RedisTest::new().await.expect("Failed to create Redis test");
    let cache = setup_test_cache(&redis);

    cache
        .set("key", b"value".to_vec(), Duration::from_millis(50))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(cache.get("key").await.unwrap(), None);

    redis.cleanup().await.expect("Failed to cleanup Redis");
}

/// Expect a cached category to be served until an update invalidates it
#[tokio::test]
async fn test_cached_repository_over_redis() -> Result<(), TestError> {
    let redis = RedisTest::new().await.expect("Failed to create Redis test");
    let test = TestSetup::new().await?;
    let cache = CacheAside::with_ttl(Arc::new(setup_test_cache(&redis)), Duration::from_secs(60));
    let repo = CachedCategoryRepository::new(
        SqlCategoryRepository::new(Arc::new(test.db.clone())),
        cache,
    );

    let id = repo
        .insert(NewCategory {
            name: "Phones".to_string(),
            description: "Mobile phones".to_string(),
        })
        .await
        .unwrap();
    let mut category = repo.get_by_id(id).await.unwrap();
    assert_eq!(repo.get_limit(10).await.unwrap().len(), 1);

    category.name = "Smartphones".to_string();
    repo.update(category).await.unwrap();

    assert_eq!(repo.get_by_id(id).await.unwrap().name, "Smartphones");
    assert_eq!(repo.get_limit(10).await.unwrap()[0].name, "Smartphones");

    redis.cleanup().await.expect("Failed to cleanup Redis");

    Ok(())
}
