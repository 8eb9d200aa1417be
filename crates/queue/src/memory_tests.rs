// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use weft_core::RunStatus;

fn run() -> RunId {
    RunId::from_string("run-q")
}

#[tokio::test]
async fn dispatches_arrive_in_order() {
    let queue = InProcessQueue::new();
    queue
        .enqueue_all(vec![
            Dispatch::new(run(), "a"),
            Dispatch::new(run(), "b"),
        ])
        .await
        .unwrap();

    assert_eq!(queue.next().await.unwrap().unwrap().node, "a");
    assert_eq!(queue.next().await.unwrap().unwrap().node, "b");
}

#[tokio::test]
async fn close_drains_backlog_then_ends() {
    let queue = InProcessQueue::new();
    queue.enqueue(Dispatch::new(run(), "a")).await.unwrap();
    queue.close();

    assert!(matches!(
        queue.enqueue(Dispatch::new(run(), "b")).await,
        Err(QueueError::Closed)
    ));
    assert!(queue.next().await.unwrap().is_some());
    assert!(queue.next().await.unwrap().is_none());
}

#[tokio::test]
async fn clones_share_the_channel() {
    let queue = InProcessQueue::new();
    let consumer = queue.clone();
    queue.enqueue(Dispatch::new(run(), "a")).await.unwrap();
    assert_eq!(consumer.next().await.unwrap().unwrap().node, "a");
}

#[tokio::test]
async fn wait_final_returns_already_published_status() {
    let queue = InProcessQueue::new();
    queue.publish_final(&run(), RunFinal::completed()).await.unwrap();
    let status = queue.wait_final(&run()).await.unwrap();
    assert_eq!(status.status, RunStatus::Completed);
}

#[tokio::test]
async fn wait_final_wakes_on_publish() {
    let queue = InProcessQueue::new();
    let waiter = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.wait_final(&run()).await })
    };
    tokio::task::yield_now().await;
    queue.publish_final(&run(), RunFinal::failed("boom")).await.unwrap();
    let status = waiter.await.unwrap().unwrap();
    assert_eq!(status.status, RunStatus::Failed);
}

#[tokio::test]
async fn finals_are_scoped_by_run() {
    let queue = InProcessQueue::new();
    let other = RunId::from_string("run-other");
    queue.publish_final(&other, RunFinal::cancelled()).await.unwrap();

    let waiter = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.wait_final(&run()).await })
    };
    tokio::task::yield_now().await;
    queue.publish_final(&run(), RunFinal::completed()).await.unwrap();
    assert_eq!(waiter.await.unwrap().unwrap().status, RunStatus::Completed);
}
