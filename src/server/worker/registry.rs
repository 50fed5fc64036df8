//! Handlers registered by task name.

use std::{collections::HashMap, future::Future, marker::PhantomData, sync::Arc};

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::server::{
    error::{worker::WorkerError, Error},
    model::task::TaskName,
};

/// Executes the payload of one kind of task.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, payload: serde_json::Value) -> Result<(), Error>;
}

/// Handler decoding the payload into `P` before calling `f`
struct TypedHandler<P, F> {
    f: F,
    _payload: PhantomData<fn() -> P>,
}

#[async_trait]
impl<P, F, Fut> TaskHandler for TypedHandler<P, F>
where
    P: DeserializeOwned + Send + 'static,
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
    async fn handle(&self, payload: serde_json::Value) -> Result<(), Error> {
        let request: P = serde_json::from_value(payload).map_err(WorkerError::from)?;

        (self.f)(request).await
    }
}

/// Map of task names to their handlers.
///
/// Registration happens once at startup; [`TaskRegistry::validate`] then guarantees every
/// task name can be dispatched, so a missing handler is never discovered while a task waits.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    handlers: HashMap<TaskName, Arc<dyn TaskHandler>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a typed handler, replacing any handler already registered for `name`.
    ///
    /// The payload is decoded into `P` before `f` runs. A payload which does not decode is a
    /// [`WorkerError::SerializationError`], which is never retried.
    pub fn register<P, F, Fut>(&mut self, name: TaskName, f: F) -> &mut Self
    where
        P: DeserializeOwned + Send + 'static,
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        self.register_handler(
            name,
            Arc::new(TypedHandler {
                f,
                _payload: PhantomData,
            }),
        )
    }

    pub fn register_handler(&mut self, name: TaskName, handler: Arc<dyn TaskHandler>) -> &mut Self {
        if self.handlers.insert(name, handler).is_some() {
            tracing::warn!("Replaced handler registered for task {}", name);
        }

        self
    }

    pub fn get(&self, name: TaskName) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(&name).cloned()
    }

    pub fn contains(&self, name: TaskName) -> bool {
        self.handlers.contains_key(&name)
    }

    /// Checks that every task name has a handler.
    ///
    /// # Returns
    /// - `Ok(())` - Every [`TaskName::ALL`] variant is registered
    /// - `Err(WorkerError::UnregisteredTask)` - First task name without a handler
    pub fn validate(&self) -> Result<(), WorkerError> {
        match TaskName::ALL.into_iter().find(|name| !self.contains(*name)) {
            Some(name) => Err(WorkerError::UnregisteredTask(name)),
            None => Ok(()),
        }
    }
}
