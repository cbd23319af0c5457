//! Integration coverage for the PTQ literal scenarios from the spec: S1
//! (priority order with abandonment recovery) and S2 (producer
//! backpressure releasing on completion).

use std::sync::Arc;
use std::time::Duration;

use chainsync_core::{CancelToken, PrioritizedTaskQueue, QueueConfig};

#[tokio::test]
async fn s1_priority_order_and_abandonment() {
    let q = PrioritizedTaskQueue::new(QueueConfig { maxsize: 3 }, |t: &i32| *t);
    let token = CancelToken::new();

    q.add(vec![5, 1, 3], &token).await.unwrap();

    let (b0, tasks) = q.get(None, &token).await.unwrap();
    assert_eq!(tasks, vec![1, 3, 5]);

    q.complete(b0, vec![1]).await.unwrap();

    let (b1, tasks) = q.get(None, &token).await.unwrap();
    assert_eq!(tasks, vec![3, 5]);

    // Neither task acknowledged: both abandon back into the open pool.
    q.complete(b1, vec![]).await.unwrap();

    let (_b2, tasks) = q.get(None, &token).await.unwrap();
    assert_eq!(tasks, vec![3, 5]);
}

#[tokio::test]
async fn s2_backpressure_releases_on_completion() {
    let q = Arc::new(PrioritizedTaskQueue::new(QueueConfig { maxsize: 2 }, |t: &i32| *t));
    let token = CancelToken::new();

    q.add(vec![10, 20], &token).await.unwrap();
    assert_eq!(q.len().await, 2);

    let q2 = q.clone();
    let producer_token = CancelToken::new();
    let producer = tokio::spawn(async move { q2.add(vec![30], &producer_token).await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!producer.is_finished(), "add should suspend while the queue is full");

    let (batch, tasks) = q.get(None, &token).await.unwrap();
    assert_eq!(tasks, vec![10, 20]);
    q.complete(batch, tasks).await.unwrap();

    producer.await.unwrap().unwrap();
    assert_eq!(q.len().await, 1);
    assert!(q.contains(&30).await);
}
