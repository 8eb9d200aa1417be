// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::store::RunSeed;
use serde_json::json;
use weft_core::RunStatus;

fn run() -> RunId {
    RunId::from_string("run-mem")
}

async fn seeded() -> MemoryStore {
    let store = MemoryStore::new();
    let mut context = Map::new();
    context.insert("x".into(), json!(1));
    store
        .create_run(
            &run(),
            RunSeed {
                context,
                nodes: vec![("a".into(), 0), ("b".into(), 2)],
            },
        )
        .await
        .unwrap();
    store
}

#[tokio::test]
async fn create_run_rejects_duplicates() {
    let store = seeded().await;
    let err = store.create_run(&run(), RunSeed::default()).await.unwrap_err();
    assert!(matches!(err, StoreError::RunExists(_)));
}

#[tokio::test]
async fn unknown_run_errors() {
    let store = MemoryStore::new();
    let ghost = RunId::from_string("run-ghost");
    assert!(matches!(
        store.status(&ghost, "a").await.unwrap_err(),
        StoreError::RunNotFound(_)
    ));
}

#[tokio::test]
async fn seeding_sets_pending_statuses() {
    let store = seeded().await;
    assert_eq!(store.status(&run(), "a").await.unwrap(), Some(NodeStatus::Pending));
    assert_eq!(store.status(&run(), "b").await.unwrap(), Some(NodeStatus::Pending));
    assert_eq!(store.status(&run(), "ghost").await.unwrap(), None);
}

#[tokio::test]
async fn cas_takes_a_node_exactly_once() {
    let store = seeded().await;
    let first = store
        .cas_status(&run(), "a", NodeStatus::Pending, NodeStatus::Running)
        .await
        .unwrap();
    let second = store
        .cas_status(&run(), "a", NodeStatus::Pending, NodeStatus::Running)
        .await
        .unwrap();
    assert!(first);
    assert!(!second);
    assert_eq!(store.status(&run(), "a").await.unwrap(), Some(NodeStatus::Running));
}

#[tokio::test]
async fn cas_on_unknown_node_errors() {
    let store = seeded().await;
    let err = store
        .cas_status(&run(), "ghost", NodeStatus::Pending, NodeStatus::Running)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::UnknownNode { .. }));
}

#[tokio::test]
async fn results_round_trip() {
    let store = seeded().await;
    let outcome = NodeOutcome::with_action(json!({"n": 7}), "left");
    store.put_result(&run(), "a", &outcome).await.unwrap();
    assert_eq!(store.result(&run(), "a").await.unwrap(), Some(outcome));
    assert_eq!(store.result(&run(), "b").await.unwrap(), None);
}

#[tokio::test]
async fn context_operations() {
    let store = seeded().await;
    assert_eq!(store.context_get(&run(), "x").await.unwrap(), Some(json!(1)));
    store.context_set(&run(), "x", json!(2)).await.unwrap();
    store.context_set(&run(), "y", json!("v")).await.unwrap();
    let snap = store.context_snapshot(&run()).await.unwrap();
    assert_eq!(snap.get("x"), Some(&json!(2)));
    assert_eq!(snap.get("y"), Some(&json!("v")));
    assert!(store.context_delete(&run(), "y").await.unwrap());
    assert!(!store.context_delete(&run(), "y").await.unwrap());
}

#[tokio::test]
async fn decrement_counts_down_and_satisfaction_sticks() {
    let store = seeded().await;
    let p = store.decrement_pending(&run(), "b", false).await.unwrap();
    assert_eq!(p, JoinProgress { remaining: 1, satisfied: false });
    let p = store.decrement_pending(&run(), "b", true).await.unwrap();
    assert_eq!(p, JoinProgress { remaining: 0, satisfied: true });
    // Saturates at zero and satisfaction remains.
    let p = store.decrement_pending(&run(), "b", false).await.unwrap();
    assert_eq!(p, JoinProgress { remaining: 0, satisfied: true });
}

#[tokio::test]
async fn arm_nodes_resets_join_state() {
    let store = seeded().await;
    store.decrement_pending(&run(), "b", true).await.unwrap();
    store.cas_status(&run(), "b", NodeStatus::Pending, NodeStatus::Running).await.unwrap();
    store.set_status(&run(), "b", NodeStatus::Succeeded).await.unwrap();

    store.arm_nodes(&run(), &[("b".into(), 2)]).await.unwrap();
    assert_eq!(store.status(&run(), "b").await.unwrap(), Some(NodeStatus::Pending));
    let p = store.decrement_pending(&run(), "b", false).await.unwrap();
    assert_eq!(p, JoinProgress { remaining: 1, satisfied: false });
}

#[tokio::test]
async fn arm_nodes_creates_dynamic_instances() {
    let store = seeded().await;
    store.arm_nodes(&run(), &[("w#0".into(), 1), ("w#1".into(), 1)]).await.unwrap();
    assert_eq!(store.status(&run(), "w#0").await.unwrap(), Some(NodeStatus::Pending));
    let all = store.statuses(&run()).await.unwrap();
    assert_eq!(all.len(), 4);
}

#[tokio::test]
async fn set_pending_overwrites_dynamic_fan_in() {
    let store = seeded().await;
    store.set_pending(&run(), "b", 5).await.unwrap();
    let p = store.decrement_pending(&run(), "b", true).await.unwrap();
    assert_eq!(p.remaining, 4);
}

#[tokio::test]
async fn cancellation_flag_is_sticky() {
    let store = seeded().await;
    assert!(!store.is_cancelled(&run()).await.unwrap());
    store.set_cancelled(&run()).await.unwrap();
    store.set_cancelled(&run()).await.unwrap();
    assert!(store.is_cancelled(&run()).await.unwrap());
}

#[tokio::test]
async fn final_status_round_trip() {
    let store = seeded().await;
    assert_eq!(store.get_final(&run()).await.unwrap(), None);
    store.put_final(&run(), RunFinal::failed("deadlock")).await.unwrap();
    let f = store.get_final(&run()).await.unwrap().unwrap();
    assert_eq!(f.status, RunStatus::Failed);
    assert_eq!(f.reason.as_deref(), Some("deadlock"));
}

#[tokio::test]
async fn remove_run_drops_tables() {
    let store = seeded().await;
    assert_eq!(store.run_count(), 1);
    store.remove_run(&run()).await.unwrap();
    assert_eq!(store.run_count(), 0);
    assert!(matches!(
        store.status(&run(), "a").await.unwrap_err(),
        StoreError::RunNotFound(_)
    ));
}
