mod queue;

use serde_json::json;
use swipex::server::{
    model::task::{QueueClass, Task, TaskName},
    worker::{queue::WorkerQueueConfig, WorkerQueue},
};
use swipex_test_utils::RedisTest;

pub fn setup_test_queue(redis: &RedisTest) -> WorkerQueue {
    WorkerQueue::with_config(
        redis.redis_pool.clone(),
        WorkerQueueConfig::with_prefix(redis.prefix()),
    )
}

/// Queue sharing the test prefix under its own worker id
pub fn setup_worker_queue(redis: &RedisTest, worker_id: &str) -> WorkerQueue {
    WorkerQueue::with_config(
        redis.redis_pool.clone(),
        WorkerQueueConfig::with_prefix(redis.prefix()).worker_id(worker_id),
    )
}

/// Encoded sign up envelope, `marker` keeps envelopes of one test apart
pub fn envelope(queue: QueueClass, marker: u32) -> String {
    Task::new(TaskName::SignUp, &json!({ "marker": marker }))
        .expect("Payload should encode")
        .into_envelope(queue)
        .encode()
        .expect("Envelope should encode")
}
