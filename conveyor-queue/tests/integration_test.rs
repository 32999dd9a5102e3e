//! Integration tests for conveyor-queue

use conveyor_queue::prelude::*;
use conveyor_queue::keys;
use conveyor_redis::{AsyncCommands, RedisConfig, RedisService};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

#[test]
fn test_job_creation() {
    let job = Job::new("send_email", json!({"to": "user@example.com"}));

    assert_eq!(job.job_type, "send_email");
    assert_eq!(job.status, JobStatus::Pending);
    assert!(!job.is_published());
}

#[test]
fn test_job_round_trip() {
    let mut job = Job::new("send_email", json!({"to": "user@example.com"}));
    job.id = Some(9);
    job.queue = Some("emails".to_string());

    let restored = Job::deserialize(&job.serialize().unwrap()).unwrap();
    assert_eq!(restored, job);
}

#[test]
fn test_settings_builder() {
    let settings = QueueSettings::new()
        .with_queue("emails")
        .with_concurrency(3);

    assert_eq!(settings.queues, vec!["emails"]);
    assert_eq!(settings.concurrency, 3);
    assert!(settings.validate().is_ok());
}

#[test]
fn test_default_concurrency() {
    assert_eq!(DEFAULT_CONCURRENCY, 5);
    assert_eq!(QueueSettings::default().concurrency, 5);
}

#[test]
fn test_queue_error_display() {
    let err = QueueError::JobNotFound(123);
    assert!(format!("{}", err).contains("123"));

    let err = QueueError::AlreadyPublished(7);
    assert!(format!("{}", err).contains("7"));

    let err = QueueError::Config("bad".to_string());
    assert!(format!("{}", err).contains("bad"));
}

// The tests below require Redis at redis://127.0.0.1:6379.
// Run them with: cargo test -- --ignored

static LANE: AtomicU32 = AtomicU32::new(0);

/// A unique lane name per test run, so parallel tests never share lists.
fn lane_name(prefix: &str) -> String {
    format!(
        "test-{}-{}-{}",
        prefix,
        std::process::id(),
        LANE.fetch_add(1, Ordering::SeqCst)
    )
}

async fn test_redis() -> Arc<RedisService> {
    Arc::new(RedisService::new(RedisConfig::default()).await.unwrap())
}

async fn test_queue(prefix: &str, concurrency: usize) -> (Queue, Arc<RedisService>) {
    let redis = test_redis().await;
    let queue = Queue::with_concurrency(lane_name(prefix), Arc::clone(&redis), concurrency)
        .await
        .unwrap();
    (queue, redis)
}

async fn cleanup(redis: &RedisService, name: &str) {
    let mut conn = redis.get().await.unwrap();
    let _: () = conn
        .del(vec![
            keys::pending(name),
            keys::processing(name),
            keys::failed(name),
        ])
        .await
        .unwrap();
}

/// Subscribe a handler that forwards every dispatched job to the returned
/// channel without resolving it.
async fn forward_dispatches(queue: &Queue, job_type: &str) -> mpsc::UnboundedReceiver<Job> {
    let (tx, rx) = mpsc::unbounded_channel();
    queue
        .subscribe(job_type, move |job| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(job);
            }
        })
        .await;
    rx
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_publish_length_and_flush() {
    let (queue, redis) = test_queue("length", 5).await;

    for i in 0..3 {
        let mut job = Job::new("count", json!({"i": i}));
        queue.publish(&mut job).await.unwrap();
        assert!(job.is_published());
    }

    assert_eq!(queue.get_length().await.unwrap(), 3);

    queue.flush().await.unwrap();
    assert_eq!(queue.get_length().await.unwrap(), 0);

    cleanup(&redis, queue.name()).await;
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_publish_then_get_job() {
    let (queue, redis) = test_queue("get", 5).await;

    let mut job = Job::new("send_email", json!({"to": "user@example.com"}));
    let id = queue.publish(&mut job).await.unwrap();

    let stored = queue.get_job(id).await.unwrap();
    assert_eq!(stored.id, Some(id));
    assert_eq!(stored.status, JobStatus::Pending);
    assert_eq!(stored.queue.as_deref(), Some(queue.name()));
    assert_eq!(stored.data, json!({"to": "user@example.com"}));

    cleanup(&redis, queue.name()).await;
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_publish_rejects_published_job() {
    let (queue, redis) = test_queue("republish", 5).await;

    let mut job = Job::new("task", json!({}));
    let id = queue.publish(&mut job).await.unwrap();

    let err = queue.publish(&mut job).await.unwrap_err();
    assert!(matches!(err, QueueError::AlreadyPublished(published) if published == id));

    cleanup(&redis, queue.name()).await;
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_get_job_missing() {
    let (queue, redis) = test_queue("missing", 5).await;

    let err = queue.get_job(u64::MAX).await.unwrap_err();
    assert!(matches!(err, QueueError::JobNotFound(_)));

    cleanup(&redis, queue.name()).await;
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_process_job_status_visibility() {
    let (queue, redis) = test_queue("process", 5).await;

    let mut job = Job::new("task", json!({}));
    let id = queue.publish(&mut job).await.unwrap();

    queue.process_job(&mut job).await.unwrap();

    let stored = queue.get_job(id).await.unwrap();
    assert_eq!(stored.status, JobStatus::Processing);
    assert!(stored.updated.is_some());

    cleanup(&redis, queue.name()).await;
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_dispatch_and_complete() {
    let (queue, redis) = test_queue("complete", 5).await;
    let mut rx = forward_dispatches(&queue, "send_email").await;
    let listener = queue.listen().await.unwrap();

    let mut job = Job::new("send_email", json!({"to": "user@example.com"}));
    let id = queue.publish(&mut job).await.unwrap();

    let mut dispatched = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("job dispatched")
        .unwrap();
    assert_eq!(dispatched.id, Some(id));
    assert_eq!(queue.get_processing_length().await.unwrap(), 1);
    assert_eq!(queue.in_flight(), 1);

    queue.complete_job(&mut dispatched).await.unwrap();
    assert_eq!(dispatched.status, JobStatus::Completed);
    assert_eq!(queue.get_processing_length().await.unwrap(), 0);
    assert_eq!(queue.in_flight(), 0);

    let stored = queue.get_job(id).await.unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert!(stored.updated.is_some());

    listener.stop();
    cleanup(&redis, queue.name()).await;
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_fail_and_repush() {
    let (queue, redis) = test_queue("fail", 5).await;
    let mut rx = forward_dispatches(&queue, "task").await;
    let listener = queue.listen().await.unwrap();

    let mut job = Job::new("task", json!({}));
    let id = queue.publish(&mut job).await.unwrap();

    let mut dispatched = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("job dispatched")
        .unwrap();
    listener.stop();

    queue.fail_job(&mut dispatched).await.unwrap();
    assert_eq!(dispatched.status, JobStatus::Failed);
    assert_eq!(queue.get_job(id).await.unwrap().status, JobStatus::Failed);
    assert_eq!(queue.get_length().await.unwrap(), 0);
    assert_eq!(queue.get_processing_length().await.unwrap(), 0);

    // Single-pop requeue puts the job back on the pending FIFO
    let repushed = queue.repush_failed_jobs().await.unwrap();
    assert_eq!(repushed, Some(id));
    assert_eq!(queue.get_job(id).await.unwrap().status, JobStatus::Pending);
    assert_eq!(queue.get_length().await.unwrap(), 1);

    // Failed list is now empty
    assert_eq!(queue.repush_failed_jobs().await.unwrap(), None);

    cleanup(&redis, queue.name()).await;
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_concurrency_ceiling() {
    let (queue, redis) = test_queue("ceiling", 2).await;
    let mut rx = forward_dispatches(&queue, "slow").await;
    let listener = queue.listen().await.unwrap();

    let mut ids = Vec::new();
    for i in 0..3 {
        let mut job = Job::new("slow", json!({"i": i}));
        ids.push(queue.publish(&mut job).await.unwrap());
    }

    // Exactly two dispatched, in FIFO order; the third stays pending
    let mut first = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("first dispatched")
        .unwrap();
    let second = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("second dispatched")
        .unwrap();
    assert_eq!(first.id, Some(ids[0]));
    assert_eq!(second.id, Some(ids[1]));

    assert!(
        timeout(Duration::from_millis(300), rx.recv()).await.is_err(),
        "third job must stall at the ceiling"
    );
    assert_eq!(queue.in_flight(), 2);
    assert_eq!(queue.get_length().await.unwrap(), 1);

    // Resolving one job frees a slot and the next pending job dispatches
    queue.complete_job(&mut first).await.unwrap();
    let third = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("third dispatched after a slot freed")
        .unwrap();
    assert_eq!(third.id, Some(ids[2]));

    listener.stop();
    cleanup(&redis, queue.name()).await;
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_exclusive_delivery_across_listeners() {
    let redis = test_redis().await;
    let name = lane_name("exclusive");

    let queue_a = Queue::with_concurrency(name.clone(), Arc::clone(&redis), 5)
        .await
        .unwrap();
    let queue_b = Queue::with_concurrency(name.clone(), Arc::clone(&redis), 5)
        .await
        .unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    for queue in [&queue_a, &queue_b] {
        let tx = tx.clone();
        queue
            .subscribe("task", move |job| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(job.id.unwrap());
                }
            })
            .await;
    }

    let listener_a = queue_a.listen().await.unwrap();
    let listener_b = queue_b.listen().await.unwrap();

    let mut published = Vec::new();
    for i in 0..6 {
        let mut job = Job::new("task", json!({"i": i}));
        published.push(queue_a.publish(&mut job).await.unwrap());
    }

    let mut received = Vec::new();
    for _ in 0..6 {
        let id = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("job dispatched")
            .unwrap();
        received.push(id);
    }

    // Every published id delivered exactly once across the fleet
    received.sort_unstable();
    let mut expected = published.clone();
    expected.sort_unstable();
    assert_eq!(received, expected);

    listener_a.stop();
    listener_b.stop();
    cleanup(&redis, &name).await;
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_listen_without_subscriptions() {
    let (queue, redis) = test_queue("idle", 5).await;

    let listener = queue.listen().await.unwrap();
    assert!(!listener.is_active());
    listener.join().await.unwrap();

    cleanup(&redis, queue.name()).await;
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_listen_twice_fails() {
    let (queue, redis) = test_queue("double", 5).await;
    let _rx = forward_dispatches(&queue, "task").await;

    let listener = queue.listen().await.unwrap();
    assert!(matches!(
        queue.listen().await,
        Err(QueueError::AlreadyListening)
    ));

    listener.stop();
    cleanup(&redis, queue.name()).await;
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_manager_lifecycle() {
    let redis = test_redis().await;
    let first = lane_name("mgr-a");
    let second = lane_name("mgr-b");

    let settings = QueueSettings::new()
        .with_queues([first.clone(), second.clone()])
        .with_concurrency(2);
    let manager = QueueManager::initialize(&settings, Arc::clone(&redis))
        .await
        .unwrap();

    assert_eq!(manager.len(), 2);
    assert!(!manager.is_empty());
    assert!(manager.queue(&first).is_some());
    assert!(manager.queue(&second).is_some());
    assert!(manager.queue("not-configured").is_none());

    let queue = manager.queue(&first).unwrap();
    assert_eq!(queue.concurrency(), 2);

    cleanup(&redis, &first).await;
    cleanup(&redis, &second).await;
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_manager_rejects_invalid_settings() {
    let redis = test_redis().await;

    let settings = QueueSettings::new().with_queue("lane").with_concurrency(0);
    let err = QueueManager::initialize(&settings, redis).await.unwrap_err();
    assert!(matches!(err, QueueError::Config(_)));
}
