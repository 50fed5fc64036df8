use fred::{interfaces::LuaInterface, prelude::*};

use crate::TestError;

// Deletes every key under the provided prefix, only used to clean up after tests
static DELETE_PREFIX_SCRIPT: &str = r#"
local keys = redis.call('KEYS', ARGV[1] .. '*')
for _, key in ipairs(keys) do
    redis.call('DEL', key)
end
return #keys
"#;

/// Redis test setup with automatic cleanup
///
/// This struct manages a Redis connection pool and a unique key prefix for testing.
/// Every key written under the prefix is removed when the struct is dropped.
pub struct RedisTest {
    pub redis_pool: Pool,
    prefix: String,
}

impl RedisTest {
    /// Create a new RedisTest instance with a unique key prefix
    pub async fn new() -> Result<Self, TestError> {
        let redis_config = Config::from_url("redis://127.0.0.1:6379")?;
        let redis_pool = Pool::new(redis_config, None, None, None, 5)?;
        redis_pool.init().await?;

        let prefix = Self::generate_unique_prefix();

        Ok(RedisTest { redis_pool, prefix })
    }

    /// Get the unique key prefix for this test instance
    ///
    /// Each test uses its own prefix so queues and cache entries never collide
    /// when tests run in parallel.
    pub fn prefix(&self) -> String {
        self.prefix.clone()
    }

    /// Generate a unique prefix using timestamp and thread ID
    fn generate_unique_prefix() -> String {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};
        use std::time::{SystemTime, UNIX_EPOCH};

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();

        let thread_id = std::thread::current().id();

        let mut hasher = DefaultHasher::new();
        timestamp.hash(&mut hasher);
        thread_id.hash(&mut hasher);
        let hash = hasher.finish();

        format!("test:{}:{:x}", timestamp, hash)
    }

    /// Explicitly clean up Redis data
    ///
    /// Call this at the end of your test to ensure cleanup completes.
    /// If not called, cleanup will be attempted on drop but may not complete.
    pub async fn cleanup(self) -> Result<(), TestError> {
        let _: i64 = self
            .redis_pool
            .eval(DELETE_PREFIX_SCRIPT, Vec::<String>::new(), vec![self.prefix.clone()])
            .await?;
        Ok(())
    }
}

impl Drop for RedisTest {
    fn drop(&mut self) {
        // Spawn instead of blocking to avoid "runtime within runtime" errors
        let pool = self.redis_pool.clone();
        let prefix = self.prefix.clone();

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let _: Result<i64, fred::error::Error> = pool
                    .eval(DELETE_PREFIX_SCRIPT, Vec::<String>::new(), vec![prefix])
                    .await;
            });
        }
    }
}
