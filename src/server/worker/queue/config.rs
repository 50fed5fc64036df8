//! Worker queue configuration for key naming and health markers.
//!
//! Every key used by the queue lives under a single prefix, which allows several
//! environments (or parallel tests) to share one Redis instance.

use std::time::Duration;

use crate::server::model::task::QueueClass;

const DEFAULT_PREFIX: &str = "swipex:worker";
const DEFAULT_WORKER_ID: &str = "default";

/// How long a health check marker is kept after the worker recorded it
pub(super) const DEFAULT_HEALTH_TTL: Duration = Duration::from_secs(60);

/// Configuration for the worker queue.
#[derive(Debug, Clone)]
pub struct WorkerQueueConfig {
    /// Prefix of every Redis key used by the queue
    pub prefix: String,
    /// Identity of the worker owning the processing list
    pub worker_id: String,
    /// Lifetime of health check markers recorded by the worker
    pub health_ttl: Duration,
}

impl WorkerQueueConfig {
    /// Creates a new queue configuration with the default prefix, the `default` worker id and
    /// a 1-minute health TTL.
    pub fn new() -> Self {
        Self::with_prefix(DEFAULT_PREFIX)
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            worker_id: DEFAULT_WORKER_ID.to_string(),
            health_ttl: DEFAULT_HEALTH_TTL,
        }
    }

    /// Sets the worker id. Workers sharing a prefix must each use a distinct id.
    pub fn worker_id(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = worker_id.into();
        self
    }

    pub(super) fn queue_key(&self, queue: QueueClass) -> String {
        format!("{}:queue:{}", self.prefix, queue.as_str())
    }

    pub(super) fn processing_key(&self) -> String {
        format!("{}:processing:{}", self.prefix, self.worker_id)
    }

    pub(super) fn dead_letter_key(&self) -> String {
        format!("{}:dead", self.prefix)
    }

    pub(super) fn health_key(&self, token: &str) -> String {
        format!("{}:health:{}", self.prefix, token)
    }
}

impl Default for WorkerQueueConfig {
    fn default() -> Self {
        Self::new()
    }
}
