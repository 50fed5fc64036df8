//! Tests for the Redis backed WorkerQueue
//!
//! These tests verify the broker's behavior including:
//! - FIFO delivery within a queue and priority order across queues
//! - Moving delivered tasks to the processing list until acknowledged
//! - Dead-lettering and requeueing unacknowledged tasks
//! - Health check markers

use chrono::Utc;
use swipex::server::{
    model::task::{DeadLetter, QueueClass, TaskEnvelope},
    worker::TaskBroker,
};
use swipex_test_utils::RedisTest;

use super::{envelope, setup_test_queue, setup_worker_queue};

const ALL: [QueueClass; 3] = QueueClass::ALL;

#[tokio::test]
async fn test_pop_empty_queues() {
    let redis = RedisTest::new().await.expect("Failed to create Redis test");
    let queue = setup_test_queue(&redis);

    let delivery = queue.pop(&ALL).await.expect("Pop should succeed");

    assert!(delivery.is_none());
    assert_eq!(queue.processing_len().await.unwrap(), 0);

    redis.cleanup().await.expect("Failed to cleanup Redis");
}

#[tokio::test]
async fn test_push_then_pop_moves_task_to_processing() {
    let redis = RedisTest::new().await.expect("Failed to create Redis test");
    let queue = setup_test_queue(&redis);
    let raw = envelope(QueueClass::Critical, 1);

    queue.push(QueueClass::Critical, raw.clone()).await.unwrap();
    assert_eq!(queue.len(QueueClass::Critical).await.unwrap(), 1);

    let delivery = queue
        .pop(&ALL)
        .await
        .expect("Pop should succeed")
        .expect("Task should be delivered");

    assert_eq!(delivery.queue, QueueClass::Critical);
    assert_eq!(delivery.raw, raw);
    assert_eq!(queue.len(QueueClass::Critical).await.unwrap(), 0);
    assert_eq!(queue.processing_len().await.unwrap(), 1);

    redis.cleanup().await.expect("Failed to cleanup Redis");
}

#[tokio::test]
async fn test_pop_is_fifo_within_queue() {
    let redis = RedisTest::new().await.expect("Failed to create Redis test");
    let queue = setup_test_queue(&redis);

    for marker in 0..3 {
        queue
            .push(QueueClass::Default, envelope(QueueClass::Default, marker))
            .await
            .unwrap();
    }

    for marker in 0..3 {
        let delivery = queue.pop(&ALL).await.unwrap().unwrap();
        let task = TaskEnvelope::decode(&delivery.raw).unwrap();

        assert_eq!(task.payload["marker"], marker);
    }

    redis.cleanup().await.expect("Failed to cleanup Redis");
}

#[tokio::test]
async fn test_pop_follows_given_order() {
    let redis = RedisTest::new().await.expect("Failed to create Redis test");
    let queue = setup_test_queue(&redis);

    queue
        .push(QueueClass::Default, envelope(QueueClass::Default, 1))
        .await
        .unwrap();
    queue
        .push(QueueClass::Critical, envelope(QueueClass::Critical, 2))
        .await
        .unwrap();

    let first = queue
        .pop(&[QueueClass::Critical, QueueClass::Default])
        .await
        .unwrap()
        .unwrap();
    let second = queue
        .pop(&[QueueClass::Critical, QueueClass::Default])
        .await
        .unwrap()
        .unwrap();

    assert_eq!(first.queue, QueueClass::Critical);
    assert_eq!(second.queue, QueueClass::Default);

    redis.cleanup().await.expect("Failed to cleanup Redis");
}

#[tokio::test]
async fn test_pop_skips_queues_outside_order() {
    let redis = RedisTest::new().await.expect("Failed to create Redis test");
    let queue = setup_test_queue(&redis);

    queue
        .push(QueueClass::Low, envelope(QueueClass::Low, 1))
        .await
        .unwrap();

    let delivery = queue.pop(&[QueueClass::Critical]).await.unwrap();

    assert!(delivery.is_none());
    assert_eq!(queue.len(QueueClass::Low).await.unwrap(), 1);

    redis.cleanup().await.expect("Failed to cleanup Redis");
}

#[tokio::test]
async fn test_ack_removes_delivery() {
    let redis = RedisTest::new().await.expect("Failed to create Redis test");
    let queue = setup_test_queue(&redis);

    queue
        .push(QueueClass::Critical, envelope(QueueClass::Critical, 1))
        .await
        .unwrap();
    let delivery = queue.pop(&ALL).await.unwrap().unwrap();

    queue.ack(&delivery).await.expect("Ack should succeed");

    assert_eq!(queue.processing_len().await.unwrap(), 0);
    assert!(queue.pop(&ALL).await.unwrap().is_none());

    redis.cleanup().await.expect("Failed to cleanup Redis");
}

#[tokio::test]
async fn test_dead_letter_replaces_delivery() {
    let redis = RedisTest::new().await.expect("Failed to create Redis test");
    let queue = setup_test_queue(&redis);

    queue
        .push(QueueClass::Critical, "not json".to_string())
        .await
        .unwrap();
    let delivery = queue.pop(&ALL).await.unwrap().unwrap();
    let letter = DeadLetter {
        raw: delivery.raw.clone(),
        queue: delivery.queue,
        reason: "malformed".to_string(),
        attempts: 0,
        failed_at: Utc::now(),
    };

    queue
        .dead_letter(&delivery, &letter)
        .await
        .expect("Dead-lettering should succeed");
    let letters = queue.dead_letters().await.unwrap();

    assert_eq!(queue.processing_len().await.unwrap(), 0);
    assert_eq!(letters.len(), 1);
    assert_eq!(letters[0].raw, "not json");
    assert_eq!(letters[0].queue, QueueClass::Critical);
    assert_eq!(letters[0].reason, "malformed");

    redis.cleanup().await.expect("Failed to cleanup Redis");
}

#[tokio::test]
async fn test_requeue_processing_restores_unacknowledged_tasks() {
    let redis = RedisTest::new().await.expect("Failed to create Redis test");
    let queue = setup_test_queue(&redis);

    queue
        .push(QueueClass::Critical, envelope(QueueClass::Critical, 1))
        .await
        .unwrap();
    queue
        .push(QueueClass::Low, envelope(QueueClass::Low, 2))
        .await
        .unwrap();
    queue.pop(&ALL).await.unwrap().unwrap();
    queue.pop(&ALL).await.unwrap().unwrap();

    let requeued = queue
        .requeue_processing()
        .await
        .expect("Requeue should succeed");

    assert_eq!(requeued, 2);
    assert_eq!(queue.processing_len().await.unwrap(), 0);
    assert_eq!(queue.len(QueueClass::Critical).await.unwrap(), 1);
    assert_eq!(queue.len(QueueClass::Low).await.unwrap(), 1);

    redis.cleanup().await.expect("Failed to cleanup Redis");
}

/// Expect a requeued task to be delivered before tasks pushed after it was taken
#[tokio::test]
async fn test_requeued_task_is_delivered_first() {
    let redis = RedisTest::new().await.expect("Failed to create Redis test");
    let queue = setup_test_queue(&redis);

    queue
        .push(QueueClass::Default, envelope(QueueClass::Default, 1))
        .await
        .unwrap();
    queue.pop(&ALL).await.unwrap().unwrap();
    queue
        .push(QueueClass::Default, envelope(QueueClass::Default, 2))
        .await
        .unwrap();

    queue.requeue_processing().await.unwrap();
    let delivery = queue.pop(&ALL).await.unwrap().unwrap();
    let task = TaskEnvelope::decode(&delivery.raw).unwrap();

    assert_eq!(task.payload["marker"], 1);

    redis.cleanup().await.expect("Failed to cleanup Redis");
}

/// Expect a restarting worker to leave tasks in flight on another worker alone
#[tokio::test]
async fn test_requeue_processing_only_takes_own_tasks() {
    let redis = RedisTest::new().await.expect("Failed to create Redis test");
    let live = setup_worker_queue(&redis, "worker-1");
    let restarted = setup_worker_queue(&redis, "worker-2");

    live.push(QueueClass::Default, envelope(QueueClass::Default, 1))
        .await
        .unwrap();
    restarted
        .push(QueueClass::Default, envelope(QueueClass::Default, 2))
        .await
        .unwrap();
    let in_flight = live.pop(&ALL).await.unwrap().unwrap();
    restarted.pop(&ALL).await.unwrap().unwrap();

    let requeued = restarted.requeue_processing().await.unwrap();

    assert_eq!(requeued, 1);
    assert_eq!(restarted.processing_len().await.unwrap(), 0);
    assert_eq!(live.processing_len().await.unwrap(), 1);
    assert_eq!(live.len(QueueClass::Default).await.unwrap(), 1);
    let redelivered = live.pop(&ALL).await.unwrap().unwrap();
    assert_eq!(TaskEnvelope::decode(&redelivered.raw).unwrap().payload["marker"], 2);

    live.ack(&in_flight).await.unwrap();
    assert_eq!(live.processing_len().await.unwrap(), 1);

    redis.cleanup().await.expect("Failed to cleanup Redis");
}

#[tokio::test]
async fn test_health_markers() {
    let redis = RedisTest::new().await.expect("Failed to create Redis test");
    let queue = setup_test_queue(&redis);

    assert!(!queue.health_seen("token-1").await.unwrap());

    queue.mark_health("token-1").await.unwrap();

    assert!(queue.health_seen("token-1").await.unwrap());
    assert!(!queue.health_seen("token-2").await.unwrap());

    redis.cleanup().await.expect("Failed to cleanup Redis");
}
