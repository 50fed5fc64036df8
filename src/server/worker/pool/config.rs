use std::time::Duration;

use rand::Rng;

use crate::server::{model::task::QueueClass, worker::retry::RetryPolicy};

/// Configuration for the worker pool
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Maximum concurrent tasks that can be processed simultaneously.
    ///
    /// Set this to ~80% of your PostgreSQL connection pool size to avoid
    /// connection exhaustion. For example, if your DB pool has 100 connections,
    /// set this to 80.
    pub max_concurrent_jobs: usize,

    /// Number of dispatcher tasks that poll the broker for tasks.
    ///
    /// Automatically calculated as 1 dispatcher per 40 concurrent jobs (minimum 1).
    pub dispatcher_count: usize,

    /// How long to wait between polls when every queue is empty (milliseconds).
    pub poll_interval_ms: u64,

    /// Maximum time a single attempt of a task can run before being cancelled (milliseconds).
    pub job_timeout_ms: u64,

    /// Maximum time the health check waits for its task to be executed (milliseconds).
    ///
    /// Kept shorter than the task timeout so a stuck worker is reported quickly.
    pub health_check_timeout_ms: u64,

    /// Maximum time to wait for dispatchers and in-flight tasks to shutdown (seconds).
    pub shutdown_timeout_seconds: u64,

    /// Retry budget of every task execution.
    pub retry: RetryPolicy,

    /// Consecutive failed polls a dispatcher tolerates before the worker gives up.
    pub broker_failure_budget: u32,

    /// Backoff after the first failed poll, doubled for every further failure (milliseconds).
    pub broker_backoff_ms: u64,

    /// Upper bound of the backoff between failed polls (milliseconds).
    pub broker_max_backoff_ms: u64,

    /// Relative share of dequeues given to each queue.
    ///
    /// Queues missing from this list are never polled.
    pub queue_weights: Vec<(QueueClass, u32)>,
}

impl WorkerPoolConfig {
    /// Create a new configuration with sensible defaults
    ///
    /// # Arguments
    /// * `max_concurrent_jobs` - Maximum concurrent jobs (~80% of DB pool size)
    pub fn new(max_concurrent_jobs: usize) -> Self {
        // Scale dispatchers: 1 per 40 concurrent jobs, minimum 1
        // Use ceiling division to ensure no more than 40 jobs per dispatcher
        let dispatcher_count = max_concurrent_jobs.div_ceil(40).max(1);

        Self {
            max_concurrent_jobs,
            dispatcher_count,
            poll_interval_ms: 50,
            job_timeout_ms: 60 * 1000,
            health_check_timeout_ms: 5 * 1000,
            shutdown_timeout_seconds: 5,
            retry: RetryPolicy::default(),
            broker_failure_budget: 10,
            broker_backoff_ms: 100,
            broker_max_backoff_ms: 5 * 1000,
            queue_weights: QueueClass::ALL
                .iter()
                .map(|queue| (*queue, queue.default_weight()))
                .collect(),
        }
    }

    /// Get job timeout as Duration
    pub fn job_timeout(&self) -> Duration {
        Duration::from_millis(self.job_timeout_ms)
    }

    /// Get health check timeout as Duration
    pub fn health_check_timeout(&self) -> Duration {
        Duration::from_millis(self.health_check_timeout_ms)
    }

    /// Get poll interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }

    /// Backoff after `failures` consecutive failed polls
    pub fn broker_backoff(&self, failures: u32) -> Duration {
        let factor = 2_u64.saturating_pow(failures.saturating_sub(1));

        Duration::from_millis(
            self.broker_backoff_ms
                .saturating_mul(factor)
                .min(self.broker_max_backoff_ms),
        )
    }

    /// Order in which a dispatcher polls the queues for its next task.
    ///
    /// Queues are drawn by weight without replacement, so a queue with weight 6 out of 10
    /// comes first in ~60% of the polls while every queue stays in the order once the ones
    /// ahead of it are empty. Queues with weight 0 always come last.
    pub fn dequeue_order<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<QueueClass> {
        let mut remaining = self.queue_weights.clone();
        let mut order = Vec::with_capacity(remaining.len());

        while !remaining.is_empty() {
            let total: u32 = remaining.iter().map(|(_, weight)| weight).sum();
            if total == 0 {
                order.extend(remaining.iter().map(|(queue, _)| *queue));
                break;
            }

            let mut pick = rng.random_range(0..total);
            let index = remaining
                .iter()
                .position(|(_, weight)| {
                    if pick < *weight {
                        true
                    } else {
                        pick -= weight;
                        false
                    }
                })
                .unwrap_or(0);

            order.push(remaining.remove(index).0);
        }

        order
    }
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self::new(4)
    }
}
