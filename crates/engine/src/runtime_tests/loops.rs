// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Loop controllers and cyclic bodies.

use super::*;

fn loop_blueprint() -> Blueprint {
    FlowBuilder::new("agentic")
        .node("init", "init")
        .node("search", "search")
        .node("answer", "answer")
        .edge("init", "decide")
        .loop_while("decide", "loop_count < 2", "search", "search")
        .edge_on("decide", "answer", weft_core::builtin::BREAK_ACTION)
        .build()
        .unwrap()
}

fn loop_registry() -> (Registry, Arc<std::sync::atomic::AtomicU32>, Arc<std::sync::atomic::AtomicU32>) {
    let searches = counter();
    let answers = counter();
    let mut registry = echo_registry(&["init"]);
    {
        let searches = searches.clone();
        registry.register_fn("search", move |call: NodeCall| {
            let searches = searches.clone();
            async move {
                let n = searches.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
                call.ctx.set("last_search", json!(n)).await.ok();
                Ok(NodeOutcome::new(json!({ "search": n })))
            }
        });
    }
    {
        let answers = answers.clone();
        registry.register_fn("answer", move |_| {
            let answers = answers.clone();
            async move {
                answers.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(NodeOutcome::new(json!("done")))
            }
        });
    }
    (registry, searches, answers)
}

#[tokio::test]
async fn loop_body_runs_until_the_condition_breaks() {
    let (registry, searches, answers) = loop_registry();
    let rig = rig(registry, vec![loop_blueprint()]);
    let report = rig
        .runtime
        .run(
            "agentic",
            Map::new(),
            RunOptions::default().unsafe_conditions(true),
        )
        .await
        .unwrap();

    assert_completed(&report);
    // loop_count < 2 admits exactly two iterations.
    assert_eq!(count_of(&searches), 2);
    assert_eq!(count_of(&answers), 1);
    assert_eq!(report.context["last_search"], json!(2));
    assert_eq!(report.node_status("answer"), Some(NodeStatus::Succeeded));

    // The controller ran three times: continue, continue, break.
    let decide_starts = report
        .event_stream()
        .filter(|e| matches!(e, Event::NodeStart { node, .. } if node == "decide"))
        .count();
    assert_eq!(decide_starts, 3);
}

#[tokio::test]
async fn loop_condition_without_unsafe_mode_breaks_immediately() {
    let (registry, searches, answers) = loop_registry();
    let rig = rig(registry, vec![loop_blueprint()]);
    let report = rig
        .runtime
        .run("agentic", Map::new(), RunOptions::default())
        .await
        .unwrap();

    // `loop_count < 2` is not a property path, so path mode resolves it
    // falsy and the controller breaks on entry.
    assert_completed(&report);
    assert_eq!(count_of(&searches), 0);
    assert_eq!(count_of(&answers), 1);
    assert_eq!(report.node_status("search"), Some(NodeStatus::Skipped));
}

#[tokio::test]
async fn loop_counters_are_stripped_from_the_report() {
    let (registry, _, _) = loop_registry();
    let rig = rig(registry, vec![loop_blueprint()]);
    let report = rig
        .runtime
        .run(
            "agentic",
            Map::new(),
            RunOptions::default().unsafe_conditions(true),
        )
        .await
        .unwrap();

    assert!(report.context.keys().all(|k| !k.starts_with("_loop:")));
    assert!(!report.context.contains_key("_blueprint"));
}

#[tokio::test]
async fn loop_over_multi_node_body() {
    let hits = counter();
    let mut registry = echo_registry(&["init", "finish"]);
    registry.register_fn("stage", {
        let hits = hits.clone();
        move |call: NodeCall| {
            let hits = hits.clone();
            async move {
                hits.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(NodeOutcome::new(call.input))
            }
        }
    });

    let blueprint = FlowBuilder::new("two-stage-loop")
        .node("init", "init")
        .node("one", "stage")
        .node("two", "stage")
        .node("done", "finish")
        .edge("init", "ctrl")
        .loop_while("ctrl", "loop_count < 3", "one", "two")
        .edge("one", "two")
        .edge_on("ctrl", "done", weft_core::builtin::BREAK_ACTION)
        .build()
        .unwrap();

    let rig = rig(registry, vec![blueprint]);
    let report = rig
        .runtime
        .run(
            "two-stage-loop",
            Map::new(),
            RunOptions::default().unsafe_conditions(true),
        )
        .await
        .unwrap();

    assert_completed(&report);
    // Three iterations over a two-node body.
    assert_eq!(count_of(&hits), 6);
    assert_eq!(report.node_status("done"), Some(NodeStatus::Succeeded));
}
