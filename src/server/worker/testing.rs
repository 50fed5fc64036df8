//! Broker fakes shared by the worker tests.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::time::Instant;

use super::queue::{MemoryBroker, TaskBroker};
use crate::server::{
    error::worker::WorkerError,
    model::task::{DeadLetter, Delivery, QueueClass},
};

fn refused() -> WorkerError {
    WorkerError::BrokerUnavailable("connection refused".to_string())
}

/// Broker which cannot be reached, counting the polls it rejected
#[derive(Default)]
pub struct OfflineBroker {
    pub pops: Arc<AtomicUsize>,
}

#[async_trait]
impl TaskBroker for OfflineBroker {
    async fn push(&self, _queue: QueueClass, _raw: String) -> Result<(), WorkerError> {
        Err(refused())
    }

    async fn pop(&self, _order: &[QueueClass]) -> Result<Option<Delivery>, WorkerError> {
        self.pops.fetch_add(1, Ordering::SeqCst);
        Err(refused())
    }

    async fn ack(&self, _delivery: &Delivery) -> Result<(), WorkerError> {
        Err(refused())
    }

    async fn dead_letter(
        &self,
        _delivery: &Delivery,
        _letter: &DeadLetter,
    ) -> Result<(), WorkerError> {
        Err(refused())
    }

    async fn len(&self, _queue: QueueClass) -> Result<usize, WorkerError> {
        Err(refused())
    }

    async fn dead_letters(&self) -> Result<Vec<DeadLetter>, WorkerError> {
        Err(refused())
    }

    async fn processing_len(&self) -> Result<usize, WorkerError> {
        Err(refused())
    }

    async fn requeue_processing(&self) -> Result<usize, WorkerError> {
        Err(refused())
    }

    async fn mark_health(&self, _token: &str) -> Result<(), WorkerError> {
        Err(refused())
    }

    async fn health_seen(&self, _token: &str) -> Result<bool, WorkerError> {
        Err(refused())
    }
}

/// In-memory broker whose first `failures` polls fail
pub struct FlakyBroker {
    inner: MemoryBroker,
    failures: AtomicUsize,
}

impl FlakyBroker {
    pub fn new(failures: usize) -> Self {
        Self {
            inner: MemoryBroker::new(),
            failures: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl TaskBroker for FlakyBroker {
    async fn push(&self, queue: QueueClass, raw: String) -> Result<(), WorkerError> {
        self.inner.push(queue, raw).await
    }

    async fn pop(&self, order: &[QueueClass]) -> Result<Option<Delivery>, WorkerError> {
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();

        if failing {
            return Err(refused());
        }

        self.inner.pop(order).await
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), WorkerError> {
        self.inner.ack(delivery).await
    }

    async fn dead_letter(
        &self,
        delivery: &Delivery,
        letter: &DeadLetter,
    ) -> Result<(), WorkerError> {
        self.inner.dead_letter(delivery, letter).await
    }

    async fn len(&self, queue: QueueClass) -> Result<usize, WorkerError> {
        self.inner.len(queue).await
    }

    async fn dead_letters(&self) -> Result<Vec<DeadLetter>, WorkerError> {
        self.inner.dead_letters().await
    }

    async fn processing_len(&self) -> Result<usize, WorkerError> {
        self.inner.processing_len().await
    }

    async fn requeue_processing(&self) -> Result<usize, WorkerError> {
        self.inner.requeue_processing().await
    }

    async fn mark_health(&self, token: &str) -> Result<(), WorkerError> {
        self.inner.mark_health(token).await
    }

    async fn health_seen(&self, token: &str) -> Result<bool, WorkerError> {
        self.inner.health_seen(token).await
    }
}

const WAIT: Duration = Duration::from_secs(2);
const POLL: Duration = Duration::from_millis(5);

/// Waits until `counter` reaches `expected`, giving up after two seconds
pub async fn wait_for_count(counter: &AtomicUsize, expected: usize) -> bool {
    let deadline = Instant::now() + WAIT;

    while counter.load(Ordering::SeqCst) < expected {
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(POLL).await;
    }

    true
}

/// Waits until the broker holds `expected` dead letters, giving up after two seconds
pub async fn wait_for_dead_letters(broker: &dyn TaskBroker, expected: usize) -> bool {
    let deadline = Instant::now() + WAIT;

    loop {
        if broker.dead_letters().await.map_or(0, |letters| letters.len()) >= expected {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(POLL).await;
    }
}

/// Waits until every delivered task was acknowledged or dead-lettered
pub async fn wait_for_idle(broker: &dyn TaskBroker) -> bool {
    let deadline = Instant::now() + WAIT;

    loop {
        if broker.processing_len().await.map_or(false, |len| len == 0) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(POLL).await;
    }
}
