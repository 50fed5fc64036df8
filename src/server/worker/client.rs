//! Producer side of the task queue.

use std::sync::Arc;

use serde::Serialize;

use super::queue::TaskBroker;
use crate::server::{
    error::Error,
    model::task::{QueueClass, Task, TaskName},
};

/// Client used by request handlers to enqueue tasks.
///
/// Wraps the process-wide broker handle built at startup, cloning the client only clones the
/// handle so it can be shared freely between concurrent requests.
#[derive(Clone)]
pub struct TaskClient {
    broker: Arc<dyn TaskBroker>,
}

impl TaskClient {
    pub fn new(broker: Arc<dyn TaskBroker>) -> Self {
        Self { broker }
    }

    /// Enqueues a task, visible to workers as soon as this returns.
    ///
    /// # Returns
    /// - `Ok(())` - Task stored by the broker
    /// - `Err(WorkerError::SerializationError)` - Envelope could not be encoded
    /// - `Err(WorkerError::BrokerUnavailable)` - Broker could not be reached
    pub async fn enqueue(&self, queue: QueueClass, task: Task) -> Result<(), Error> {
        let envelope = task.into_envelope(queue);
        let raw = envelope.encode()?;

        self.broker.push(queue, raw).await?;
        tracing::debug!("Enqueued task {}", envelope);

        Ok(())
    }

    /// Builds a task from a payload and enqueues it
    pub async fn enqueue_payload<P: Serialize + Sync>(
        &self,
        queue: QueueClass,
        name: TaskName,
        payload: &P,
    ) -> Result<(), Error> {
        let task = Task::new(name, payload)?;

        self.enqueue(queue, task).await
    }
}
