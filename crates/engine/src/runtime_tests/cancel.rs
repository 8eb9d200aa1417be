// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cancellation and run-level timeouts.

use super::*;
use weft_core::RunId;

fn slow_pipeline() -> Blueprint {
    FlowBuilder::new("slow")
        .node("a", "sleepy")
        .node("b", "after")
        .node("c", "after")
        .edge("a", "b")
        .edge("b", "c")
        .build()
        .unwrap()
}

fn slow_registry() -> Registry {
    let mut registry = echo_registry(&["after"]);
    registry.register_fn("sleepy", |_| async {
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        Ok(NodeOutcome::empty())
    });
    registry
}

#[tokio::test(start_paused = true)]
async fn external_cancellation_aborts_the_run() {
    let rig = rig(slow_registry(), vec![slow_pipeline()]);
    let run_id = RunId::from_string("run-cancel-me");

    let canceller = {
        let runtime = rig.runtime.clone();
        let run_id = run_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            runtime.cancel(&run_id).await.unwrap();
        })
    };

    let report = rig
        .runtime
        .run(
            "slow",
            Map::new(),
            RunOptions::default().run_id(run_id.clone()),
        )
        .await
        .unwrap();
    canceller.await.unwrap();

    assert_eq!(report.status, RunStatus::Cancelled);
    // The in-flight node reported the abort; downstream never left pending.
    assert_eq!(report.node_status("a"), Some(NodeStatus::Failed));
    assert_eq!(report.node_status("b"), Some(NodeStatus::Pending));
    assert_eq!(report.node_status("c"), Some(NodeStatus::Pending));
    assert!(node_event_kinds(&report, "a").contains(&"node:error"));
    let abort_error = report.event_stream().find_map(|e| match e {
        Event::NodeError { error, .. } => Some(error.clone()),
        _ => None,
    });
    assert!(abort_error.unwrap_or_default().contains("aborted"));
    assert_eq!(event_kinds(&report).last(), Some(&"workflow:cancelled"));
}

#[tokio::test(start_paused = true)]
async fn run_timeout_cancels_the_run() {
    let rig = rig(slow_registry(), vec![slow_pipeline()]);
    let report = rig
        .runtime
        .run(
            "slow",
            Map::new(),
            RunOptions::default().timeout_ms(200u64),
        )
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Cancelled);
    assert_eq!(
        report.reason.as_deref(),
        Some("run timed out after 200ms")
    );
}

#[tokio::test(start_paused = true)]
async fn cancellation_before_start_leaves_all_nodes_pending() {
    let rig = rig(slow_registry(), vec![slow_pipeline()]);
    let run_id = RunId::from_string("run-pre-cancelled");

    // Cancel the moment the first dispatch decision is pending: flag the
    // run as soon as its state exists.
    let canceller = {
        let runtime = rig.runtime.clone();
        let run_id = run_id.clone();
        tokio::spawn(async move { runtime.cancel(&run_id).await })
    };

    // A seeded-then-immediately-cancelled run may dispatch its start node
    // before observing the flag; either way the run ends cancelled and
    // nothing downstream ever runs.
    let report = rig
        .runtime
        .run("slow", Map::new(), RunOptions::default().run_id(run_id))
        .await
        .unwrap();
    let _ = canceller.await;

    assert_eq!(report.status, RunStatus::Cancelled);
    assert_eq!(report.node_status("b"), Some(NodeStatus::Pending));
    assert_eq!(report.node_status("c"), Some(NodeStatus::Pending));
}
