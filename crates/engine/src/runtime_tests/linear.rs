// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Linear pipelines: context visibility and event ordering.

use super::*;

fn pipeline() -> Blueprint {
    FlowBuilder::new("pipeline")
        .node("a", "write.x")
        .node("b", "double.x")
        .node("c", "read.y")
        .edge("a", "b")
        .edge("b", "c")
        .build()
        .unwrap()
}

fn pipeline_registry() -> Registry {
    let mut registry = Registry::new();
    registry.register_fn("write.x", |call: NodeCall| async move {
        call.ctx.set("x", json!(1)).await.map_err(|e| {
            weft_core::NodeError::recoverable(e.to_string())
        })?;
        Ok(NodeOutcome::new(json!(1)))
    });
    registry.register_fn("double.x", |call: NodeCall| async move {
        let x = call.ctx.get("x").await.unwrap_or(None).and_then(|v| v.as_i64()).unwrap_or(0);
        call.ctx.set("y", json!(x * 2)).await.ok();
        Ok(NodeOutcome::new(json!(x * 2)))
    });
    registry.register_fn("read.y", |call: NodeCall| async move {
        let y = call.ctx.get("y").await.unwrap_or(None).and_then(|v| v.as_i64()).unwrap_or(0);
        call.ctx.set("c", json!(format!("saw {y}"))).await.ok();
        Ok(NodeOutcome::new(json!(y)))
    });
    registry
}

#[tokio::test]
async fn linear_run_propagates_context_writes() {
    let rig = rig(pipeline_registry(), vec![pipeline()]);
    let report = rig
        .runtime
        .run("pipeline", Map::new(), RunOptions::default())
        .await
        .unwrap();

    assert_completed(&report);
    assert_eq!(report.context["x"], json!(1));
    assert_eq!(report.context["y"], json!(2));
    assert_eq!(report.context["c"], json!("saw 2"));
    for node in ["a", "b", "c"] {
        assert_eq!(report.node_status(node), Some(NodeStatus::Succeeded));
    }
}

#[tokio::test]
async fn linear_run_emits_ordered_events() {
    let rig = rig(pipeline_registry(), vec![pipeline()]);
    let report = rig
        .runtime
        .run("pipeline", Map::new(), RunOptions::default())
        .await
        .unwrap();

    // One start/finish pair per node, in pipeline order.
    let starts_and_finishes: Vec<_> = report
        .event_stream()
        .filter_map(|e| match e {
            Event::NodeStart { node, .. } => Some(("start", node.to_string())),
            Event::NodeFinish { node, .. } => Some(("finish", node.to_string())),
            _ => None,
        })
        .collect();
    assert_eq!(
        starts_and_finishes,
        vec![
            ("start", "a".to_string()),
            ("finish", "a".to_string()),
            ("start", "b".to_string()),
            ("finish", "b".to_string()),
            ("start", "c".to_string()),
            ("finish", "c".to_string()),
        ]
    );

    assert_eq!(event_kinds(&report).first(), Some(&"workflow:start"));
    assert_eq!(event_kinds(&report).last(), Some(&"workflow:finish"));

    // Context writes are attributed to their writers.
    let writers: Vec<_> = report
        .event_stream()
        .filter_map(|e| match e {
            Event::ContextChange { key, node, .. } => {
                Some((key.clone(), node.to_string()))
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        writers,
        vec![
            ("x".to_string(), "a".to_string()),
            ("y".to_string(), "b".to_string()),
            ("c".to_string(), "c".to_string()),
        ]
    );

    // Sequence numbers are dense and ordered; timestamps come from the
    // fake clock.
    let seqs: Vec<u64> = report.events.iter().map(|r| r.seq).collect();
    assert_eq!(seqs, (0..report.events.len() as u64).collect::<Vec<_>>());
    assert!(report.events.iter().all(|r| r.at_ms >= 1_000_000));
}

#[tokio::test]
async fn successor_input_is_predecessor_output() {
    let mut registry = Registry::new();
    registry.register_fn("emit", |_| async { Ok(NodeOutcome::new(json!({ "n": 7 }))) });
    let seen = counter();
    {
        let seen = seen.clone();
        registry.register_fn("expect", move |call: NodeCall| {
            let seen = seen.clone();
            async move {
                assert_eq!(call.input, json!({ "n": 7 }));
                seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(NodeOutcome::empty())
            }
        });
    }
    let blueprint = FlowBuilder::new("io")
        .node("src", "emit")
        .node("dst", "expect")
        .edge("src", "dst")
        .build()
        .unwrap();

    let rig = rig(registry, vec![blueprint]);
    let report = rig.runtime.run("io", Map::new(), RunOptions::default()).await.unwrap();
    assert_completed(&report);
    assert_eq!(count_of(&seen), 1);
}

#[tokio::test]
async fn run_state_is_collected_after_the_run() {
    let rig = rig(pipeline_registry(), vec![pipeline()]);
    rig.runtime.run("pipeline", Map::new(), RunOptions::default()).await.unwrap();
    assert_eq!(rig.store.run_count(), 0);
}
