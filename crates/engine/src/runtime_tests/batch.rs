// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scatter/gather dynamic fan-out.

use super::*;

fn batch_blueprint() -> Blueprint {
    FlowBuilder::new("batched")
        .node("load", "load")
        .batch("fan", "items", "double", Value::Null, "results")
        .node("done", "check")
        .edge("load", "fan")
        .edge("fan.gather", "done")
        .build()
        .unwrap()
}

fn batch_registry(items: Value) -> Registry {
    let mut registry = echo_registry(&["check"]);
    registry.register_fn("load", move |call: NodeCall| {
        let items = items.clone();
        async move {
            call.ctx.set("items", items).await.ok();
            Ok(NodeOutcome::empty())
        }
    });
    registry.register_fn("double", |call: NodeCall| async move {
        let n = call.input.as_i64().unwrap_or(0);
        // Later elements finish earlier, exercising order preservation.
        tokio::time::sleep(std::time::Duration::from_millis(50 - 10 * n as u64)).await;
        Ok(NodeOutcome::new(json!(n * 2)))
    });
    registry
}

#[tokio::test(start_paused = true)]
async fn gather_preserves_scatter_order() {
    let rig = rig(batch_registry(json!([1, 2, 3])), vec![batch_blueprint()]);
    let report = rig
        .runtime
        .run("batched", Map::new(), RunOptions::default())
        .await
        .unwrap();

    assert_completed(&report);
    assert_eq!(report.context["results"], json!([2, 4, 6]));
    // Output length equals input length, in input order.
    assert_eq!(report.node_status("fan"), Some(NodeStatus::Succeeded));
    assert_eq!(report.node_status("fan.gather"), Some(NodeStatus::Succeeded));
    // The template itself never executes.
    assert_eq!(report.node_status("fan.worker"), Some(NodeStatus::Skipped));
    for instance in ["fan.worker#0", "fan.worker#1", "fan.worker#2"] {
        assert_eq!(report.node_status(instance), Some(NodeStatus::Succeeded));
    }
    assert_eq!(report.node_status("done"), Some(NodeStatus::Succeeded));
    // Fan-out bookkeeping is cleaned out of the context.
    assert!(report.context.keys().all(|k| !k.starts_with("_fan:")));
}

#[tokio::test(start_paused = true)]
async fn empty_scatter_gathers_an_empty_array() {
    let rig = rig(batch_registry(json!([])), vec![batch_blueprint()]);
    let report = rig
        .runtime
        .run("batched", Map::new(), RunOptions::default())
        .await
        .unwrap();

    assert_completed(&report);
    assert_eq!(report.context["results"], json!([]));
    assert_eq!(report.node_status("done"), Some(NodeStatus::Succeeded));
}

#[tokio::test(start_paused = true)]
async fn missing_scatter_source_fails_the_scatter() {
    let mut registry = echo_registry(&["check", "double"]);
    registry.register_fn("load", |_| async { Ok(NodeOutcome::empty()) });
    let rig = rig(registry, vec![batch_blueprint()]);
    let report = rig
        .runtime
        .run("batched", Map::new(), RunOptions::default())
        .await
        .unwrap();

    assert_completed(&report);
    assert_eq!(report.node_status("fan"), Some(NodeStatus::Failed));
    assert_eq!(report.node_status("done"), Some(NodeStatus::Skipped));
}

#[tokio::test(start_paused = true)]
async fn failed_worker_instance_fails_the_gather() {
    let mut registry = echo_registry(&["check"]);
    registry.register_fn("load", |call: NodeCall| async move {
        call.ctx.set("items", json!([1, 2, 3])).await.ok();
        Ok(NodeOutcome::empty())
    });
    registry.register_fn("double", |call: NodeCall| async move {
        let n = call.input.as_i64().unwrap_or(0);
        if n == 2 {
            Err(weft_core::NodeError::recoverable("element 2 is cursed"))
        } else {
            Ok(NodeOutcome::new(json!(n * 2)))
        }
    });

    let rig = rig(registry, vec![batch_blueprint()]);
    let report = rig
        .runtime
        .run("batched", Map::new(), RunOptions::default())
        .await
        .unwrap();

    // Fail fast: no sparse results, the gather subtree is abandoned.
    assert_completed(&report);
    assert_eq!(report.node_status("fan.worker#1"), Some(NodeStatus::Failed));
    assert_eq!(report.node_status("fan.gather"), Some(NodeStatus::Failed));
    assert_eq!(report.node_status("done"), Some(NodeStatus::Skipped));
    assert!(!report.context.contains_key("results"));
}
