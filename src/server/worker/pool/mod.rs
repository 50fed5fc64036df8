//! Worker pool for processing background tasks with concurrency control.
//!
//! This module provides the `WorkerPool` that manages dispatcher tasks, task execution,
//! and concurrency limits using semaphores. Dispatchers poll the broker in weighted
//! priority order and spawn an execution for every task taken, bounded by the number of
//! execution slots.

mod config;

pub use config::WorkerPoolConfig;

use std::{any::Any, panic::AssertUnwindSafe, sync::Arc};

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::{mpsc, Mutex, Notify, RwLock, Semaphore};
use tokio::task::JoinHandle;

use crate::server::{
    error::{worker::WorkerError, Error},
    model::task::{DeadLetter, Delivery, TaskEnvelope},
    worker::{health, queue::TaskBroker, registry::TaskRegistry},
};

/// Worker pool for processing tasks from a [`TaskBroker`].
///
/// Manages multiple dispatcher tasks that poll the broker for tasks and spawn execution
/// tasks with semaphore-based concurrency control. Provides graceful shutdown and monitoring.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<WorkerPoolRef>,
}

/// Internal worker pool reference with configuration and runtime state.
struct WorkerPoolRef {
    config: WorkerPoolConfig,
    broker: Arc<dyn TaskBroker>,
    registry: TaskRegistry,
    semaphore: Arc<Semaphore>,
    shutdown: Notify,
    dispatcher_handles: RwLock<Vec<JoinHandle<()>>>,
    fatal_tx: mpsc::Sender<WorkerError>,
    fatal_rx: Mutex<mpsc::Receiver<WorkerError>>,
}

impl WorkerPool {
    /// Creates a new worker pool.
    ///
    /// The health check handler is added to `registry`. The pool is created in a stopped
    /// state and must be started with `start()`.
    ///
    /// # Arguments
    /// - `config` - Configuration including max concurrent jobs and dispatcher settings
    /// - `broker` - Broker the tasks are taken from
    /// - `registry` - Handlers of every task the pool executes
    ///
    /// # Returns
    /// - `WorkerPool` - New worker pool ready to start
    pub fn new(
        config: WorkerPoolConfig,
        broker: Arc<dyn TaskBroker>,
        mut registry: TaskRegistry,
    ) -> Self {
        health::register_handler(&mut registry, Arc::clone(&broker));

        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (fatal_tx, fatal_rx) = mpsc::channel(1);

        Self {
            inner: Arc::new(WorkerPoolRef {
                config,
                broker,
                registry,
                semaphore,
                shutdown: Notify::new(),
                dispatcher_handles: RwLock::new(Vec::new()),
                fatal_tx,
                fatal_rx: Mutex::new(fatal_rx),
            }),
        }
    }

    pub fn config(&self) -> &WorkerPoolConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.inner.registry
    }

    /// Starts the worker pool.
    ///
    /// Spawns the configured number of dispatcher tasks. This method is non-blocking and
    /// returns immediately after spawning dispatchers. It is idempotent - calling it when
    /// already running logs a warning and returns Ok.
    ///
    /// # Returns
    /// - `Ok(())` - Pool started successfully (or already running)
    /// - `Err(Error::InternalError)` - The pool was stopped, a stopped pool cannot restart
    pub async fn start(&self) -> Result<(), Error> {
        let mut handles = self.inner.dispatcher_handles.write().await;

        if !handles.is_empty() {
            tracing::warn!("Worker pool is already running");
            return Ok(());
        }

        if self.inner.semaphore.is_closed() {
            return Err(Error::InternalError(
                "Attempted to start a worker pool which was stopped".to_string(),
            ));
        }

        tracing::info!(
            "Starting worker pool with {} dispatcher(s) (max {} concurrent jobs)",
            self.inner.config.dispatcher_count,
            self.inner.config.max_concurrent_jobs
        );

        for id in 0..self.inner.config.dispatcher_count {
            let handle = self.spawn_dispatcher(id);
            handles.push(handle);
        }

        Ok(())
    }

    /// Spawns a single dispatcher task.
    ///
    /// The dispatcher polls until shutdown, or until its consecutive broker failures exceed
    /// the failure budget, in which case the error is reported through
    /// [`WorkerPool::fatal_error`].
    fn spawn_dispatcher(&self, id: usize) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);

        tokio::spawn(async move {
            tracing::info!("Dispatcher {} started", id);
            let mut failures: u32 = 0;

            while !inner.semaphore.is_closed() {
                tokio::select! {
                    // Biased select ensures shutdown signal is prioritized
                    // over processing new tasks, enabling faster shutdown.
                    biased;

                    _ = inner.shutdown.notified() => {
                        tracing::debug!("Dispatcher {} received shutdown signal", id);
                        break;
                    }

                    result = Self::process_tasks(id, &inner) => match result {
                        Ok(()) => failures = 0,
                        Err(e) => {
                            failures += 1;

                            if failures > inner.config.broker_failure_budget {
                                tracing::error!(
                                    "Dispatcher {} giving up after {} consecutive broker failures: {}",
                                    id,
                                    failures,
                                    e
                                );
                                if inner.fatal_tx.try_send(e).is_err() {
                                    tracing::debug!("Broker failure already reported");
                                }
                                break;
                            }

                            let backoff = inner.config.broker_backoff(failures);
                            tracing::warn!(
                                "Dispatcher {} broker error (failure {}/{}), retrying in {:?}: {}",
                                id,
                                failures,
                                inner.config.broker_failure_budget,
                                backoff,
                                e
                            );

                            tokio::select! {
                                biased;

                                _ = inner.shutdown.notified() => break,
                                _ = tokio::time::sleep(backoff) => {}
                            }
                        }
                    }
                }
            }

            tracing::info!("Dispatcher {} stopped", id);
        })
    }

    /// Processes the next task from the broker.
    ///
    /// Waits for a free execution slot before polling so a task is never held while the pool
    /// is at capacity, then spawns the execution. Sleeps for the poll interval when every
    /// queue is empty.
    ///
    /// # Returns
    /// - `Ok(())` - A task was spawned, the queues were empty or the pool is shutting down
    /// - `Err(WorkerError)` - The broker could not be polled
    async fn process_tasks(
        dispatcher_id: usize,
        inner: &Arc<WorkerPoolRef>,
    ) -> Result<(), WorkerError> {
        let Ok(permit) = Arc::clone(&inner.semaphore).acquire_owned().await else {
            tracing::debug!("Dispatcher {} semaphore closed", dispatcher_id);
            return Ok(());
        };

        let order = inner.config.dequeue_order(&mut rand::rng());

        match inner.broker.pop(&order).await? {
            Some(delivery) => {
                let inner = Arc::clone(inner);

                tokio::spawn(async move {
                    Self::execute_task(&inner, delivery).await;
                    drop(permit);
                });
            }
            None => {
                drop(permit);
                tokio::time::sleep(inner.config.poll_interval()).await;
            }
        }

        Ok(())
    }

    /// Executes a delivered task with retries.
    ///
    /// Every attempt is bounded by the task timeout, a timed out attempt is dropped and
    /// counts as a retryable failure. A panicking handler fails its attempt with
    /// [`WorkerError::HandlerExecution`]. Successful tasks are acknowledged; malformed tasks,
    /// permanent failures and exhausted retry budgets are dead-lettered.
    async fn execute_task(inner: &WorkerPoolRef, delivery: Delivery) {
        let envelope = match TaskEnvelope::decode(&delivery.raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::error!("Malformed task on queue {}: {}", delivery.queue, e);
                Self::dead_letter(inner, &delivery, e.to_string(), 0).await;
                return;
            }
        };

        let Some(handler) = inner.registry.get(envelope.name) else {
            let e = WorkerError::UnregisteredTask(envelope.name);
            tracing::error!("Cannot execute task {}: {}", envelope, e);
            Self::dead_letter(inner, &delivery, e.to_string(), 0).await;
            return;
        };

        let name = envelope.name;
        let timeout = inner.config.job_timeout();
        let description = envelope.to_string();

        let outcome = inner
            .config
            .retry
            .execute(&description, |_| {
                let handler = Arc::clone(&handler);
                let payload = envelope.payload.clone();

                async move {
                    let attempt = AssertUnwindSafe(handler.handle(payload)).catch_unwind();

                    match tokio::time::timeout(timeout, attempt).await {
                        Ok(Ok(result)) => result,
                        Ok(Err(panic)) => Err(WorkerError::HandlerExecution {
                            name,
                            reason: panic_message(panic.as_ref()),
                        }
                        .into()),
                        Err(_) => Err(WorkerError::Timeout { name, timeout }.into()),
                    }
                }
            })
            .await;

        match outcome.result {
            Ok(()) => {
                tracing::debug!("Task completed: {}", envelope);

                if let Err(e) = inner.broker.ack(&delivery).await {
                    tracing::error!("Failed to acknowledge task {}: {}", envelope, e);
                }
            }
            Err(e) => {
                tracing::error!(
                    "Task {} failed after {} attempt(s), moving to dead-letter queue: {}",
                    envelope,
                    outcome.attempts,
                    e
                );
                Self::dead_letter(inner, &delivery, e.to_string(), outcome.attempts).await;
            }
        }
    }

    async fn dead_letter(
        inner: &WorkerPoolRef,
        delivery: &Delivery,
        reason: String,
        attempts: u32,
    ) {
        let letter = DeadLetter {
            raw: delivery.raw.clone(),
            queue: delivery.queue,
            reason,
            attempts,
            failed_at: Utc::now(),
        };

        if let Err(e) = inner.broker.dead_letter(delivery, &letter).await {
            tracing::error!(
                "Failed to dead-letter task from queue {}: {}",
                delivery.queue,
                e
            );
        }
    }

    /// Waits for a dispatcher to give up on the broker.
    ///
    /// Never completes while the broker stays reachable.
    pub async fn fatal_error(&self) -> Option<WorkerError> {
        self.inner.fatal_rx.lock().await.recv().await
    }

    /// Stops the worker pool gracefully.
    ///
    /// Signals all dispatchers to stop and closes the semaphore to prevent new tasks. Waits
    /// for all dispatchers, then for in-flight tasks, each with the configured shutdown
    /// timeout. Tasks still running after the timeout stay unacknowledged and are delivered
    /// again on the next start.
    ///
    /// This method is idempotent - calling it when already stopped returns immediately.
    pub async fn stop(&self) -> Result<(), Error> {
        if !self.is_running().await {
            tracing::debug!("Worker pool is already stopped");
            return Ok(());
        }

        tracing::info!("Shutting down worker pool...");

        // Close semaphore to prevent new tasks from starting
        self.inner.semaphore.close();

        // Signal all dispatchers to stop
        self.inner.shutdown.notify_waiters();

        let mut handles = self.inner.dispatcher_handles.write().await;
        let dispatcher_count = handles.len();

        for (i, handle) in handles.drain(..).enumerate() {
            let timeout_result =
                tokio::time::timeout(self.inner.config.shutdown_timeout(), handle).await;

            match timeout_result {
                Ok(Ok(())) => {
                    tracing::debug!("Dispatcher {} stopped cleanly", i);
                }
                Ok(Err(e)) => {
                    tracing::error!("Dispatcher {} panicked: {:?}", i, e);
                }
                Err(_) => {
                    tracing::warn!("Dispatcher {} did not stop within timeout", i);
                }
            }
        }

        let deadline = tokio::time::Instant::now() + self.inner.config.shutdown_timeout();
        while self.active_job_count() > 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let remaining = self.active_job_count();
        if remaining > 0 {
            tracing::warn!(
                "Worker pool shut down with {} task(s) still running",
                remaining
            );
        }

        tracing::info!(
            "Worker pool shut down ({} dispatchers stopped)",
            dispatcher_count
        );

        Ok(())
    }

    /// Checks if the worker pool is running.
    ///
    /// # Returns
    /// - `true` - Pool was started and not stopped yet
    /// - `false` - Pool is stopped
    pub async fn is_running(&self) -> bool {
        let handles = self.inner.dispatcher_handles.read().await;
        !handles.is_empty()
    }

    /// Gets the number of active dispatchers.
    pub async fn dispatcher_count(&self) -> usize {
        let handles = self.inner.dispatcher_handles.read().await;
        handles.len()
    }

    /// Gets the number of available semaphore permits.
    ///
    /// This indicates how many more tasks can be spawned before hitting the
    /// concurrency limit. A value of 0 means the system is at capacity.
    pub fn available_permits(&self) -> usize {
        self.inner.semaphore.available_permits()
    }

    pub fn max_concurrent_jobs(&self) -> usize {
        self.inner.config.max_concurrent_jobs
    }

    /// Gets the current number of tasks being processed.
    ///
    /// Dispatchers hold a slot while polling, so this includes up to one slot per idle
    /// dispatcher.
    pub fn active_job_count(&self) -> usize {
        self.inner
            .config
            .max_concurrent_jobs
            .saturating_sub(self.inner.semaphore.available_permits())
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("handler panicked: {}", message)
    } else {
        "handler panicked".to_string()
    }
}
