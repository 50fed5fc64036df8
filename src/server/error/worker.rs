//! Worker error types.
//!
//! This module defines errors raised while enqueuing, dequeuing and executing tasks. Only
//! [`WorkerError::BrokerUnavailable`] can terminate the worker process, every other variant
//! is handled per task (retried or dead-lettered).

use std::time::Duration;

use thiserror::Error;

use crate::server::model::task::TaskName;

#[derive(Error, Debug)]
pub enum WorkerError {
    /// The broker could not be reached.
    ///
    /// Producers receive this error synchronously from `enqueue`. Inside the worker, broker
    /// failures are retried with backoff and become fatal once the failure budget is spent.
    #[error("Task broker unavailable: {0}")]
    BrokerUnavailable(String),

    /// Failed to serialize or deserialize a task envelope or payload.
    ///
    /// Tasks failing to decode are never retried, they are moved to the dead-letter queue.
    #[error("Failed to serialize/deserialize task: {0}")]
    SerializationError(String),

    /// A task handler returned an error.
    #[error("Handler for task {name} failed: {reason}")]
    HandlerExecution { name: TaskName, reason: String },

    /// A task handler exceeded the maximum execution time.
    #[error("Task {name} timed out after {timeout:?}")]
    Timeout { name: TaskName, timeout: Duration },

    /// No handler is registered for a task name.
    #[error("No handler registered for task {0}")]
    UnregisteredTask(TaskName),

    /// The health check task was not processed within its timeout.
    #[error("Health check task was not processed within {0:?}")]
    HealthCheckTimeout(Duration),
}

impl From<fred::error::Error> for WorkerError {
    fn from(err: fred::error::Error) -> Self {
        Self::BrokerUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for WorkerError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}
