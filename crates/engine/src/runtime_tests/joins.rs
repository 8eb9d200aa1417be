// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fan-out/fan-in joins.

use super::*;

#[tokio::test]
async fn diamond_all_join_runs_once_and_sees_both_writes() {
    let mut registry = Registry::new();
    registry.register_fn("seed", |_| async { Ok(NodeOutcome::empty()) });
    registry.register_fn("write.left", |call: NodeCall| async move {
        call.ctx.set("left", json!("L")).await.ok();
        Ok(NodeOutcome::empty())
    });
    registry.register_fn("write.right", |call: NodeCall| async move {
        call.ctx.set("right", json!("R")).await.ok();
        Ok(NodeOutcome::empty())
    });
    let joins = counter();
    {
        let joins = joins.clone();
        registry.register_fn("join", move |call: NodeCall| {
            let joins = joins.clone();
            async move {
                joins.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                // Both predecessors committed before this node started.
                let left = call.ctx.get("left").await.unwrap_or(None);
                let right = call.ctx.get("right").await.unwrap_or(None);
                assert_eq!(left, Some(json!("L")));
                assert_eq!(right, Some(json!("R")));
                call.ctx.set("joined", json!(true)).await.ok();
                Ok(NodeOutcome::empty())
            }
        });
    }

    let blueprint = FlowBuilder::new("diamond")
        .node("a", "seed")
        .node("b", "write.left")
        .node("c", "write.right")
        .node("d", "join")
        .edge("a", "b")
        .edge("a", "c")
        .edge("b", "d")
        .edge("c", "d")
        .build()
        .unwrap();

    let rig = rig(registry, vec![blueprint]);
    let report = rig
        .runtime
        .run("diamond", Map::new(), RunOptions::default())
        .await
        .unwrap();

    assert_completed(&report);
    // The traverser was consulted for both b and c, but d started once.
    assert_eq!(count_of(&joins), 1);
    assert_eq!(report.context["joined"], json!(true));
    assert_eq!(
        report
            .event_stream()
            .filter(|e| matches!(e, Event::NodeStart { node, .. } if node == "d"))
            .count(),
        1
    );
}

#[tokio::test]
async fn any_join_runs_exactly_once_even_when_all_predecessors_succeed() {
    let runs = counter();
    let mut registry = echo_registry(&["seed", "side"]);
    {
        let runs = runs.clone();
        registry.register_fn("merge", move |_| {
            let runs = runs.clone();
            async move {
                runs.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(NodeOutcome::empty())
            }
        });
    }

    let blueprint = FlowBuilder::new("any")
        .node("a", "seed")
        .node("b", "side")
        .node("c", "side")
        .node_full(
            "merge",
            "merge",
            Value::Null,
            weft_core::NodeConfig::any_join(),
        )
        .edge("a", "b")
        .edge("a", "c")
        .edge("b", "merge")
        .edge("c", "merge")
        .build()
        .unwrap();

    let rig = rig(registry, vec![blueprint]);
    let report = rig.runtime.run("any", Map::new(), RunOptions::default()).await.unwrap();

    assert_completed(&report);
    assert_eq!(count_of(&runs), 1);
    assert_eq!(report.node_status("merge"), Some(NodeStatus::Succeeded));
}

#[tokio::test]
async fn multiple_starts_run_under_a_synthetic_root() {
    let blueprint = FlowBuilder::new("two-heads")
        .node("left", "seed")
        .node("right", "seed")
        .node("join", "seed")
        .edge("left", "join")
        .edge("right", "join")
        .build()
        .unwrap();

    let rig = rig(echo_registry(&["seed"]), vec![blueprint]);
    let report = rig
        .runtime
        .run("two-heads", Map::new(), RunOptions::default())
        .await
        .unwrap();

    assert_completed(&report);
    assert_eq!(
        report.node_status(weft_core::builtin::PARALLEL_ROOT),
        Some(NodeStatus::Succeeded)
    );
    assert_eq!(report.node_status("join"), Some(NodeStatus::Succeeded));
}

#[tokio::test]
async fn concurrency_limit_caps_in_flight_nodes() {
    use std::sync::atomic::{AtomicI32, Ordering};

    let live = Arc::new(AtomicI32::new(0));
    let peak = Arc::new(AtomicI32::new(0));
    let mut registry = echo_registry(&["seed", "sink"]);
    {
        let live = live.clone();
        let peak = peak.clone();
        registry.register_fn("busy", move |_| {
            let live = live.clone();
            let peak = peak.clone();
            async move {
                let now = live.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                live.fetch_sub(1, Ordering::SeqCst);
                Ok(NodeOutcome::empty())
            }
        });
    }

    let mut builder = FlowBuilder::new("wide").node("a", "seed").node("z", "sink");
    for i in 0..6 {
        let id = format!("w{i}");
        builder = builder
            .node(id.as_str(), "busy")
            .edge("a", id.as_str())
            .edge(id.as_str(), "z");
    }
    let blueprint = builder.build().unwrap();

    let rig = rig(registry, vec![blueprint]);
    let report = rig
        .runtime
        .run("wide", Map::new(), RunOptions::default().concurrency(2))
        .await
        .unwrap();

    assert_completed(&report);
    assert!(
        peak.load(Ordering::SeqCst) <= 2,
        "peak concurrency {} exceeded the limit",
        peak.load(Ordering::SeqCst)
    );
}
