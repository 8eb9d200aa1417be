// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Action routing and conditional edges.

use super::*;

fn router_blueprint() -> Blueprint {
    FlowBuilder::new("routed")
        .node("router", "route")
        .node("left", "handle")
        .node("right", "handle")
        .node_full(
            "merge",
            "merge",
            Value::Null,
            weft_core::NodeConfig::any_join(),
        )
        .edge_on("router", "left", "left")
        .edge_on("router", "right", "right")
        .edge("left", "merge")
        .edge("right", "merge")
        .build()
        .unwrap()
}

#[tokio::test]
async fn router_takes_one_branch_and_skips_the_other() {
    let mut registry = Registry::new();
    registry.register_fn("route", |_| async {
        Ok(NodeOutcome::with_action(json!("choose left"), "left"))
    });
    registry.register_fn("handle", |call: NodeCall| async move {
        Ok(NodeOutcome::new(json!({ "handled": call.input })))
    });
    let merged = counter();
    {
        let merged = merged.clone();
        registry.register_fn("merge", move |call: NodeCall| {
            let merged = merged.clone();
            async move {
                merged.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                // Merge sees the taken branch's output as its input.
                assert_eq!(call.input, json!({ "handled": "choose left" }));
                Ok(NodeOutcome::empty())
            }
        });
    }

    let rig = rig(registry, vec![router_blueprint()]);
    let report = rig
        .runtime
        .run("routed", Map::new(), RunOptions::default())
        .await
        .unwrap();

    assert_completed(&report);
    assert_eq!(count_of(&merged), 1);
    assert_eq!(report.node_status("left"), Some(NodeStatus::Succeeded));
    assert_eq!(report.node_status("right"), Some(NodeStatus::Skipped));
    assert_eq!(report.node_status("merge"), Some(NodeStatus::Succeeded));
}

#[tokio::test]
async fn conditions_gate_edges_on_context() {
    let mut registry = echo_registry(&["start", "work"]);
    registry.register_fn("flagger", |call: NodeCall| async move {
        call.ctx.set("go_high", json!(true)).await.ok();
        Ok(NodeOutcome::empty())
    });

    let blueprint = FlowBuilder::new("guarded")
        .node("start", "flagger")
        .node("high", "work")
        .node("low", "work")
        .edge_when("start", "high", "go_high")
        .edge_when("start", "low", "go_low")
        .build()
        .unwrap();

    let rig = rig(registry, vec![blueprint]);
    let report = rig
        .runtime
        .run("guarded", Map::new(), RunOptions::default())
        .await
        .unwrap();

    assert_completed(&report);
    assert_eq!(report.node_status("high"), Some(NodeStatus::Succeeded));
    assert_eq!(report.node_status("low"), Some(NodeStatus::Skipped));
}

#[tokio::test]
async fn transform_shapes_the_successor_input() {
    let mut registry = Registry::new();
    registry.register_fn("produce", |_| async {
        Ok(NodeOutcome::new(json!({ "wanted": 42, "noise": "xyz" })))
    });
    let observed = counter();
    {
        let observed = observed.clone();
        registry.register_fn("consume", move |call: NodeCall| {
            let observed = observed.clone();
            async move {
                assert_eq!(call.input, json!(42));
                observed.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(NodeOutcome::empty())
            }
        });
    }

    let blueprint = FlowBuilder::new("transformed")
        .node("src", "produce")
        .node("dst", "consume")
        .connect(weft_core::Edge::new("src", "dst").transform("output.wanted"))
        .build()
        .unwrap();

    let rig = rig(registry, vec![blueprint]);
    let report = rig
        .runtime
        .run("transformed", Map::new(), RunOptions::default())
        .await
        .unwrap();
    assert_completed(&report);
    assert_eq!(count_of(&observed), 1);
}
