//! Broker backing the task queues.
//!
//! Every queue class is a FIFO list. Taking a task moves it atomically into a processing list
//! where it stays until the worker acknowledges it or dead-letters it, so a worker crashing
//! mid-task leaves the task behind for [`TaskBroker::requeue_processing`] on the next start
//! instead of losing it.
//!
//! ## Keys
//!
//! With the default prefix `swipex:worker`:
//! - `swipex:worker:queue:{critical|default|low}`: pending tasks, pushed on the left and
//!   taken from the right
//! - `swipex:worker:processing:{worker_id}`: tasks taken by that worker and not yet
//!   acknowledged. Each worker only requeues its own list, so workers sharing the queues
//!   never take back each other's tasks.
//! - `swipex:worker:dead`: [`DeadLetter`] records of tasks which could not be executed
//! - `swipex:worker:health:{token}`: markers recorded by the health check task

mod config;
mod lua;
mod memory;

pub use config::WorkerQueueConfig;
pub use memory::MemoryBroker;

use async_trait::async_trait;
use fred::{
    interfaces::{KeysInterface, ListInterface, LuaInterface},
    prelude::*,
    types::Expiration,
};
use lua::{DEAD_LETTER_SCRIPT, POP_TASK_SCRIPT, REQUEUE_TASK_SCRIPT};

use crate::server::{
    error::worker::WorkerError,
    model::task::{DeadLetter, Delivery, QueueClass, TaskEnvelope},
};

/// Storage and delivery of encoded tasks.
///
/// Implementations must be safe to share between every dispatcher of a worker and every
/// producer of a process.
#[async_trait]
pub trait TaskBroker: Send + Sync {
    /// Appends a raw task to the tail of a queue
    async fn push(&self, queue: QueueClass, raw: String) -> Result<(), WorkerError>;

    /// Takes the oldest task of the first non-empty queue in `order`
    async fn pop(&self, order: &[QueueClass]) -> Result<Option<Delivery>, WorkerError>;

    /// Acknowledges a delivery, removing it from the processing list
    async fn ack(&self, delivery: &Delivery) -> Result<(), WorkerError>;

    /// Replaces a delivery in the processing list by its dead-letter record
    async fn dead_letter(&self, delivery: &Delivery, letter: &DeadLetter)
        -> Result<(), WorkerError>;

    /// Number of pending tasks of a queue
    async fn len(&self, queue: QueueClass) -> Result<usize, WorkerError>;

    /// Dead-letter records, most recent first
    async fn dead_letters(&self) -> Result<Vec<DeadLetter>, WorkerError>;

    /// Number of tasks taken but not yet acknowledged
    async fn processing_len(&self) -> Result<usize, WorkerError>;

    /// Moves every unacknowledged task back to the front of its queue.
    ///
    /// Called when a worker starts, before any dispatcher runs. Tasks whose envelope cannot
    /// be decoded are returned to the default queue and dead-lettered when delivered again.
    ///
    /// # Returns
    /// - `Ok(usize)` - Number of tasks requeued
    async fn requeue_processing(&self) -> Result<usize, WorkerError>;

    /// Records that the health check task carrying `token` was executed
    async fn mark_health(&self, token: &str) -> Result<(), WorkerError>;

    async fn health_seen(&self, token: &str) -> Result<bool, WorkerError>;
}

/// Queue of the task stored in `raw`, falling back to the default queue
fn queue_of(raw: &str) -> QueueClass {
    TaskEnvelope::decode(raw)
        .map(|envelope| envelope.queue)
        .unwrap_or(QueueClass::Default)
}

/// Redis/Valkey backed broker.
#[derive(Clone)]
pub struct WorkerQueue {
    pool: Pool,
    config: WorkerQueueConfig,
}

impl WorkerQueue {
    pub fn new(pool: Pool) -> Self {
        Self::with_config(pool, WorkerQueueConfig::new())
    }

    /// Create a new WorkerQueue with a custom configuration (useful for testing)
    pub fn with_config(pool: Pool, config: WorkerQueueConfig) -> Self {
        Self { pool, config }
    }

    pub fn config(&self) -> &WorkerQueueConfig {
        &self.config
    }
}

#[async_trait]
impl TaskBroker for WorkerQueue {
    async fn push(&self, queue: QueueClass, raw: String) -> Result<(), WorkerError> {
        let _: i64 = self.pool.lpush(self.config.queue_key(queue), raw).await?;

        Ok(())
    }

    async fn pop(&self, order: &[QueueClass]) -> Result<Option<Delivery>, WorkerError> {
        if order.is_empty() {
            return Ok(None);
        }

        let mut keys: Vec<String> = order
            .iter()
            .map(|queue| self.config.queue_key(*queue))
            .collect();
        keys.push(self.config.processing_key());

        let result: Vec<String> = self
            .pool
            .eval(POP_TASK_SCRIPT, keys, Vec::<String>::new())
            .await?;

        let mut parts = result.into_iter();
        let (Some(key), Some(raw)) = (parts.next(), parts.next()) else {
            return Ok(None);
        };

        let queue = order
            .iter()
            .copied()
            .find(|queue| self.config.queue_key(*queue) == key)
            .ok_or_else(|| {
                WorkerError::BrokerUnavailable(format!("pop returned unknown queue key {}", key))
            })?;

        Ok(Some(Delivery { queue, raw }))
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), WorkerError> {
        let removed: i64 = self
            .pool
            .lrem(self.config.processing_key(), 1, delivery.raw.clone())
            .await?;

        if removed == 0 {
            tracing::warn!(
                "Acknowledged task from queue {} was not in the processing list",
                delivery.queue
            );
        }

        Ok(())
    }

    async fn dead_letter(
        &self,
        delivery: &Delivery,
        letter: &DeadLetter,
    ) -> Result<(), WorkerError> {
        let record = serde_json::to_string(letter)?;

        let _: i64 = self
            .pool
            .eval(
                DEAD_LETTER_SCRIPT,
                vec![self.config.processing_key(), self.config.dead_letter_key()],
                vec![delivery.raw.clone(), record],
            )
            .await?;

        Ok(())
    }

    async fn len(&self, queue: QueueClass) -> Result<usize, WorkerError> {
        let len: i64 = self.pool.llen(self.config.queue_key(queue)).await?;

        Ok(len as usize)
    }

    async fn dead_letters(&self) -> Result<Vec<DeadLetter>, WorkerError> {
        let records: Vec<String> = self
            .pool
            .lrange(self.config.dead_letter_key(), 0, -1)
            .await?;

        records
            .iter()
            .map(|record| serde_json::from_str(record).map_err(WorkerError::from))
            .collect()
    }

    async fn processing_len(&self) -> Result<usize, WorkerError> {
        let len: i64 = self.pool.llen(self.config.processing_key()).await?;

        Ok(len as usize)
    }

    async fn requeue_processing(&self) -> Result<usize, WorkerError> {
        let processing: Vec<String> = self
            .pool
            .lrange(self.config.processing_key(), 0, -1)
            .await?;

        let mut requeued = 0;
        // Newest first, so the oldest task ends up on the consuming end
        for raw in processing {
            let queue = queue_of(&raw);
            let moved: i64 = self
                .pool
                .eval(
                    REQUEUE_TASK_SCRIPT,
                    vec![self.config.processing_key(), self.config.queue_key(queue)],
                    vec![raw],
                )
                .await?;

            requeued += moved as usize;
        }

        if requeued > 0 {
            tracing::info!("Requeued {} unacknowledged task(s)", requeued);
        }

        Ok(requeued)
    }

    async fn mark_health(&self, token: &str) -> Result<(), WorkerError> {
        let ttl_ms = (self.config.health_ttl.as_millis() as i64).max(1);

        let _: () = self
            .pool
            .set(
                self.config.health_key(token),
                "1",
                Some(Expiration::PX(ttl_ms)),
                None,
                false,
            )
            .await?;

        Ok(())
    }

    async fn health_seen(&self, token: &str) -> Result<bool, WorkerError> {
        let exists: i64 = self.pool.exists(self.config.health_key(token)).await?;

        Ok(exists > 0)
    }
}
