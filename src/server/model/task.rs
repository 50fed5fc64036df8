//! Task definitions for background processing.
//!
//! This module defines the identifiers, queue classes and wire records used by the task queue.
//! A [`Task`] is built by a producer at request time, wrapped in a [`TaskEnvelope`] and stored
//! as JSON in the broker. Workers decode the envelope, resolve the handler registered for its
//! [`TaskName`] and decode the payload into the handler's request type.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::server::error::worker::WorkerError;

/// Identifier of every task the worker can execute.
///
/// Names are constants serialized as their variant string (`"SignUp"`, `"CreateOrder"`, ...),
/// so a producer and a worker built from the same code always agree on them. Envelopes carrying
/// any other name fail to decode and are dead-lettered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaskName {
    /// Create an account from a sign up request.
    SignUp,
    /// Update username/role of an existing account.
    UpdateUserInfo,
    /// Persist an account returned by an OAuth2 provider.
    OAuth2SaveUser,
    /// Create an order together with its product lines.
    CreateOrder,
    /// Synthetic task used by the worker self-check.
    HealthCheck,
}

impl TaskName {
    /// Every task name, a worker refuses to start unless each one has a handler.
    pub const ALL: [TaskName; 5] = [
        TaskName::SignUp,
        TaskName::UpdateUserInfo,
        TaskName::OAuth2SaveUser,
        TaskName::CreateOrder,
        TaskName::HealthCheck,
    ];

    /// Stable string used on the wire and in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskName::SignUp => "SignUp",
            TaskName::UpdateUserInfo => "UpdateUserInfo",
            TaskName::OAuth2SaveUser => "OAuth2SaveUser",
            TaskName::CreateOrder => "CreateOrder",
            TaskName::HealthCheck => "HealthCheck",
        }
    }

    /// Queue a producer uses for this task unless told otherwise
    pub fn default_queue(&self) -> QueueClass {
        match self {
            TaskName::SignUp
            | TaskName::UpdateUserInfo
            | TaskName::OAuth2SaveUser
            | TaskName::HealthCheck => QueueClass::Critical,
            TaskName::CreateOrder => QueueClass::Default,
        }
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority class of a queue.
///
/// Dispatchers pick queues by weight, so critical tasks are drained with a larger share of
/// the worker's capacity without starving the lower classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueClass {
    Critical,
    Default,
    Low,
}

impl QueueClass {
    /// Queue classes from highest to lowest priority
    pub const ALL: [QueueClass; 3] = [QueueClass::Critical, QueueClass::Default, QueueClass::Low];

    /// Suffix used to build the broker key of the queue
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueClass::Critical => "critical",
            QueueClass::Default => "default",
            QueueClass::Low => "low",
        }
    }

    /// Default relative share of dequeues given to the queue
    pub fn default_weight(&self) -> u32 {
        match self {
            QueueClass::Critical => 6,
            QueueClass::Default => 3,
            QueueClass::Low => 1,
        }
    }
}

impl fmt::Display for QueueClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable unit of deferred work.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    id: Uuid,
    name: TaskName,
    payload: serde_json::Value,
}

impl Task {
    /// Creates a task, serializing the payload.
    ///
    /// # Arguments
    /// - `name` - Identifier of the handler which will execute the task
    /// - `payload` - Handler arguments, serialized to JSON
    ///
    /// # Returns
    /// - `Ok(Task)` - New task with a random id
    /// - `Err(WorkerError::SerializationError)` - Payload could not be encoded
    pub fn new<P: Serialize>(name: TaskName, payload: &P) -> Result<Self, WorkerError> {
        let payload = serde_json::to_value(payload)?;

        Ok(Self {
            id: Uuid::new_v4(),
            name,
            payload,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> TaskName {
        self.name
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    /// Wraps the task in the envelope stored by the broker
    pub fn into_envelope(self, queue: QueueClass) -> TaskEnvelope {
        TaskEnvelope {
            id: self.id,
            name: self.name,
            queue,
            payload: self.payload,
            enqueued_at: Utc::now(),
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Task record as stored by the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub id: Uuid,
    pub name: TaskName,
    pub queue: QueueClass,
    pub payload: serde_json::Value,
    pub enqueued_at: DateTime<Utc>,
}

impl TaskEnvelope {
    pub fn encode(&self) -> Result<String, WorkerError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(raw: &str) -> Result<Self, WorkerError> {
        Ok(serde_json::from_str(raw)?)
    }
}

impl fmt::Display for TaskEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, queue {})", self.name, self.id, self.queue)
    }
}

/// Task taken off a queue but not yet acknowledged.
///
/// `raw` is the exact text stored by the broker, it identifies the task for acknowledgment
/// and is preserved verbatim when the task is dead-lettered.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub queue: QueueClass,
    pub raw: String,
}

/// Record of a task which could not be executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    /// Original envelope text, kept even when it failed to decode
    pub raw: String,
    pub queue: QueueClass,
    pub reason: String,
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
}
