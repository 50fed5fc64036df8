use std::sync::Arc;

use fred::prelude::{ClientLike, Config as RedisConfig, Pool};
use sea_orm::DatabaseConnection;

use crate::server::{
    cache::{CacheAside, RedisCache},
    config::Config,
    data::{
        account::{CachedAccountRepository, SqlAccountRepository},
        order::{CachedOrderRepository, SqlOrderRepository},
        Database,
    },
    error::Error,
    service::{account::AccountService, order::OrderService},
    worker::{handler::build_registry, queue::WorkerQueueConfig, Worker, WorkerQueue},
};

/// Connect to the database and run migrations
pub async fn connect_to_database(config: &Config) -> Result<DatabaseConnection, Error> {
    use migration::{Migrator, MigratorTrait};
    use sea_orm::ConnectOptions;

    let mut opt = ConnectOptions::new(&config.database_url);
    opt.sqlx_logging(false);

    let db = sea_orm::Database::connect(opt).await?;
    Migrator::up(&db, None).await?;

    Ok(db)
}

/// Connect to Valkey/Redis, shared by the task queue and the cache
pub async fn connect_to_redis(config: &Config) -> Result<Pool, Error> {
    let redis_config = RedisConfig::from_url(&config.valkey_url)?;
    let pool = Pool::new(redis_config, None, None, None, 6)?;

    pool.connect();
    pool.wait_for_connect().await?;

    Ok(pool)
}

/// Wires the cached repositories, services and task handlers into a worker
pub fn build_worker(config: &Config, db: DatabaseConnection, redis_pool: Pool) -> Worker {
    let db: Arc<dyn Database> = Arc::new(db);
    let cache = CacheAside::with_ttl(
        Arc::new(RedisCache::with_prefix(
            redis_pool.clone(),
            config.cache_prefix.clone(),
        )),
        config.cache_ttl,
    );

    let accounts =
        CachedAccountRepository::new(SqlAccountRepository::new(db.clone()), cache.clone());
    let orders = CachedOrderRepository::new(SqlOrderRepository::new(db), cache);
    let registry = build_registry(
        AccountService::new(Arc::new(accounts)),
        OrderService::new(Arc::new(orders)),
    );

    let queue = WorkerQueue::with_config(
        redis_pool,
        WorkerQueueConfig::with_prefix(config.queue_prefix.clone())
            .worker_id(config.worker_id.clone()),
    );

    Worker::new(Arc::new(queue), registry, config.pool_config())
}
