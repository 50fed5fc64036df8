//! Background task runtime.
//!
//! Producers enqueue tasks through a [`client::TaskClient`], a [`WorkerPool`] takes them from the
//! broker in weighted priority order and executes the handler registered for each task name.
//! [`Worker`] ties both to one broker handle and drives the pool for the lifetime of the
//! worker process.

pub mod client;
pub mod handler;
pub mod health;
pub mod pool;
pub mod queue;
pub mod registry;
pub mod retry;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use tokio::sync::Notify;

pub use pool::{WorkerPool, WorkerPoolConfig};
pub use queue::{MemoryBroker, TaskBroker, WorkerQueue};

use crate::server::{
    error::{worker::WorkerError, Error},
    worker::{client::TaskClient, health::HealthCheck, registry::TaskRegistry},
};

#[derive(Clone)]
pub struct Worker {
    broker: Arc<dyn TaskBroker>,
    pool: WorkerPool,
    shutdown: Arc<Notify>,
}

impl Worker {
    pub fn new(
        broker: Arc<dyn TaskBroker>,
        registry: TaskRegistry,
        config: WorkerPoolConfig,
    ) -> Self {
        let pool = WorkerPool::new(config, Arc::clone(&broker), registry);

        Self {
            broker,
            pool,
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Client enqueueing onto the broker this worker consumes
    pub fn client(&self) -> TaskClient {
        TaskClient::new(Arc::clone(&self.broker))
    }

    pub fn health_check(&self) -> HealthCheck {
        HealthCheck::new(Arc::clone(&self.broker))
    }

    /// Runs the worker until [`Worker::shutdown`] is called or the broker is lost.
    ///
    /// Checks that every task name has a handler and moves tasks left unacknowledged by a
    /// previous run back onto their queues before the pool starts.
    ///
    /// # Returns
    /// - `Ok(())` - Shutdown was requested, the pool stopped gracefully
    /// - `Err(WorkerError::UnregisteredTask)` - A task name has no handler
    /// - `Err(WorkerError::BrokerUnavailable)` - The broker failed beyond the failure budget
    pub async fn run(&self) -> Result<(), Error> {
        self.pool.registry().validate()?;

        let requeued = self.broker.requeue_processing().await?;
        if requeued > 0 {
            tracing::info!(
                "Requeued {} unacknowledged task(s) from a previous run",
                requeued
            );
        }

        self.pool.start().await?;

        tokio::select! {
            _ = self.shutdown.notified() => {
                self.pool.stop().await?;

                Ok(())
            }
            fatal = self.pool.fatal_error() => {
                self.pool.stop().await?;

                let e = fatal.unwrap_or_else(|| {
                    WorkerError::BrokerUnavailable("dispatchers stopped unexpectedly".to_string())
                });
                tracing::error!("Worker stopping: {}", e);

                Err(e.into())
            }
        }
    }

    /// Requests [`Worker::run`] to stop, also when called before the worker started running
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }
}
