//! Worker self-check.
//!
//! A health check enqueues a [`TaskName::HealthCheck`] task carrying a fresh token on the
//! critical queue and waits for the worker to record that token through the broker. A
//! passing check proves the queue accepts tasks and a worker is dispatching them.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use uuid::Uuid;

use super::{client::TaskClient, queue::TaskBroker, registry::TaskRegistry};
use crate::server::{
    error::{worker::WorkerError, Error},
    model::{
        dto::HealthCheckPayload,
        task::{QueueClass, TaskName},
    },
};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Registers the handler recording health check tokens
pub(super) fn register_handler(registry: &mut TaskRegistry, broker: Arc<dyn TaskBroker>) {
    registry.register::<HealthCheckPayload, _, _>(TaskName::HealthCheck, move |payload| {
        let broker = Arc::clone(&broker);

        async move {
            broker.mark_health(&payload.token).await?;
            Ok::<(), Error>(())
        }
    });
}

#[derive(Clone)]
pub struct HealthCheck {
    client: TaskClient,
    broker: Arc<dyn TaskBroker>,
}

impl HealthCheck {
    pub fn new(broker: Arc<dyn TaskBroker>) -> Self {
        Self {
            client: TaskClient::new(Arc::clone(&broker)),
            broker,
        }
    }

    /// Runs a health check round trip.
    ///
    /// # Arguments
    /// - `timeout` - Maximum time to wait for a worker to execute the check, independent of
    ///   the task timeout
    ///
    /// # Returns
    /// - `Ok(Duration)` - Time between enqueueing the check and observing its execution
    /// - `Err(WorkerError::HealthCheckTimeout)` - No worker executed the check in time
    /// - `Err(WorkerError::BrokerUnavailable)` - The broker could not be reached
    pub async fn check(&self, timeout: Duration) -> Result<Duration, Error> {
        let token = Uuid::new_v4().to_string();
        let started = Instant::now();

        self.client
            .enqueue_payload(
                QueueClass::Critical,
                TaskName::HealthCheck,
                &HealthCheckPayload {
                    token: token.clone(),
                },
            )
            .await?;

        let observed = async {
            loop {
                if self.broker.health_seen(&token).await? {
                    return Ok::<_, WorkerError>(started.elapsed());
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        };

        match tokio::time::timeout(timeout, observed).await {
            Ok(result) => {
                let latency = result?;
                tracing::debug!("Health check passed in {:?}", latency);
                Ok(latency)
            }
            Err(_) => {
                tracing::warn!("Health check not processed within {:?}", timeout);
                Err(WorkerError::HealthCheckTimeout(timeout).into())
            }
        }
    }
}
