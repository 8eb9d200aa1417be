// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sub-workflow composition.

use super::*;

fn child_blueprint() -> Blueprint {
    FlowBuilder::new("child")
        .node("work", "child.work")
        .build()
        .unwrap()
}

fn parent_blueprint() -> Blueprint {
    FlowBuilder::new("parent")
        .node("prepare", "prepare")
        .subflow(
            "delegate",
            "child",
            &[("seed", "prepared.value")],
            &[("child_result", "result")],
        )
        .node("consume", "consume")
        .edge("prepare", "delegate")
        .edge("delegate", "consume")
        .build()
        .unwrap()
}

#[tokio::test]
async fn subflow_maps_inputs_and_outputs() {
    let mut registry = Registry::new();
    registry.register_fn("prepare", |call: NodeCall| async move {
        call.ctx.set("prepared", json!({ "value": 21 })).await.ok();
        Ok(NodeOutcome::empty())
    });
    registry.register_fn("child.work", |call: NodeCall| async move {
        // The child sees only the mapped key.
        let seed = call.ctx.get("seed").await.unwrap_or(None).and_then(|v| v.as_i64());
        assert_eq!(seed, Some(21));
        assert_eq!(call.ctx.get("prepared").await.unwrap_or(None), None);
        call.ctx.set("result", json!(seed.unwrap_or(0) * 2)).await.ok();
        Ok(NodeOutcome::empty())
    });
    let consumed = counter();
    {
        let consumed = consumed.clone();
        registry.register_fn("consume", move |call: NodeCall| {
            let consumed = consumed.clone();
            async move {
                let copied = call.ctx.get("child_result").await.unwrap_or(None);
                assert_eq!(copied, Some(json!(42)));
                consumed.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(NodeOutcome::empty())
            }
        });
    }

    let rig = rig(registry, vec![parent_blueprint(), child_blueprint()]);
    let report = rig
        .runtime
        .run("parent", Map::new(), RunOptions::default())
        .await
        .unwrap();

    assert_completed(&report);
    assert_eq!(count_of(&consumed), 1);
    assert_eq!(report.context["child_result"], json!(42));
    // The parent's own keys survived untouched.
    assert_eq!(report.context["prepared"], json!({ "value": 21 }));
}

#[tokio::test]
async fn child_failure_propagates_to_the_parent_node() {
    let mut registry = echo_registry(&["prepare", "consume"]);
    registry.register_fn("child.work", |_| async {
        Err(weft_core::NodeError::fatal("child exploded"))
    });

    let rig = rig(registry, vec![parent_blueprint(), child_blueprint()]);
    let report = rig
        .runtime
        .run("parent", Map::new(), RunOptions::default())
        .await
        .unwrap();

    // The child run failed; the parent's subflow node failed recoverably
    // and its subtree was skipped.
    assert_completed(&report);
    assert_eq!(report.node_status("delegate"), Some(NodeStatus::Failed));
    assert_eq!(report.node_status("consume"), Some(NodeStatus::Skipped));
    let error = report
        .event_stream()
        .find_map(|e| match e {
            Event::NodeError { node, error, .. } if node == "delegate" => Some(error.clone()),
            _ => None,
        })
        .unwrap_or_default();
    assert!(error.contains("child"), "error should name the child: {error}");
}

#[tokio::test]
async fn subflow_child_events_share_the_sink() {
    let mut registry = Registry::new();
    registry.register_fn("prepare", |_| async { Ok(NodeOutcome::empty()) });
    registry.register_fn("child.work", |_| async { Ok(NodeOutcome::empty()) });
    registry.register_fn("consume", |_| async { Ok(NodeOutcome::empty()) });

    let rig = rig(registry, vec![parent_blueprint(), child_blueprint()]);
    let report = rig
        .runtime
        .run("parent", Map::new(), RunOptions::default())
        .await
        .unwrap();
    assert_completed(&report);

    // Two workflow:start records reached the sink: parent and child runs.
    let starts = rig
        .sink
        .events()
        .into_iter()
        .filter(|e| matches!(e, Event::WorkflowStart { .. }))
        .count();
    assert_eq!(starts, 2);
    // The parent report carries only the parent's own stream.
    assert_eq!(
        report
            .event_stream()
            .filter(|e| matches!(e, Event::WorkflowStart { .. }))
            .count(),
        1
    );
}
