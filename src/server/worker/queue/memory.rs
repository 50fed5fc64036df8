//! In-process broker.

use std::{
    collections::{HashMap, VecDeque},
    time::{Duration, Instant},
};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{config::DEFAULT_HEALTH_TTL, queue_of, TaskBroker};
use crate::server::{
    error::worker::WorkerError,
    model::task::{DeadLetter, Delivery, QueueClass},
};

#[derive(Default)]
struct State {
    /// Pending tasks, pushed on the front and taken from the back
    queues: HashMap<QueueClass, VecDeque<String>>,
    processing: Vec<String>,
    /// Most recent first
    dead: VecDeque<DeadLetter>,
    /// Expiry of every recorded health marker
    health: HashMap<String, Instant>,
}

impl State {
    fn remove_processing(&mut self, raw: &str) -> bool {
        match self.processing.iter().position(|entry| entry == raw) {
            Some(index) => {
                self.processing.remove(index);
                true
            }
            None => false,
        }
    }
}

/// Broker keeping every queue in memory.
///
/// Behaves like [`super::WorkerQueue`] within a single process, producers and the worker
/// must share the same instance. Health markers expire after `health_ttl` and expired
/// markers are dropped whenever a new one is recorded.
pub struct MemoryBroker {
    state: Mutex<State>,
    health_ttl: Duration,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::with_health_ttl(DEFAULT_HEALTH_TTL)
    }

    pub fn with_health_ttl(health_ttl: Duration) -> Self {
        Self {
            state: Mutex::new(State::default()),
            health_ttl,
        }
    }

    #[cfg(test)]
    async fn health_markers(&self) -> usize {
        self.state.lock().await.health.len()
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskBroker for MemoryBroker {
    async fn push(&self, queue: QueueClass, raw: String) -> Result<(), WorkerError> {
        let mut state = self.state.lock().await;
        state.queues.entry(queue).or_default().push_front(raw);

        Ok(())
    }

    async fn pop(&self, order: &[QueueClass]) -> Result<Option<Delivery>, WorkerError> {
        let mut state = self.state.lock().await;

        for queue in order {
            let raw = state
                .queues
                .get_mut(queue)
                .and_then(|pending| pending.pop_back());

            if let Some(raw) = raw {
                state.processing.push(raw.clone());
                return Ok(Some(Delivery { queue: *queue, raw }));
            }
        }

        Ok(None)
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), WorkerError> {
        let mut state = self.state.lock().await;

        if !state.remove_processing(&delivery.raw) {
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
        let mut state = self.state.lock().await;
        state.remove_processing(&delivery.raw);
        state.dead.push_front(letter.clone());

        Ok(())
    }

    async fn len(&self, queue: QueueClass) -> Result<usize, WorkerError> {
        let state = self.state.lock().await;

        Ok(state.queues.get(&queue).map_or(0, VecDeque::len))
    }

    async fn dead_letters(&self) -> Result<Vec<DeadLetter>, WorkerError> {
        let state = self.state.lock().await;

        Ok(state.dead.iter().cloned().collect())
    }

    async fn processing_len(&self) -> Result<usize, WorkerError> {
        Ok(self.state.lock().await.processing.len())
    }

    async fn requeue_processing(&self) -> Result<usize, WorkerError> {
        let mut state = self.state.lock().await;
        let processing = std::mem::take(&mut state.processing);
        let requeued = processing.len();

        // Processing holds the oldest first, the oldest must end up on the consuming end
        for raw in processing.into_iter().rev() {
            let queue = queue_of(&raw);
            state.queues.entry(queue).or_default().push_back(raw);
        }

        Ok(requeued)
    }

    async fn mark_health(&self, token: &str) -> Result<(), WorkerError> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        state.health.retain(|_, expires_at| *expires_at > now);
        state.health.insert(token.to_string(), now + self.health_ttl);

        Ok(())
    }

    async fn health_seen(&self, token: &str) -> Result<bool, WorkerError> {
        let state = self.state.lock().await;

        Ok(state
            .health
            .get(token)
            .is_some_and(|expires_at| *expires_at > Instant::now()))
    }
}
