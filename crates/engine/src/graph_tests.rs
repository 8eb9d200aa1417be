// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use weft_core::FlowBuilder;

fn compile(builder: FlowBuilder) -> CompiledFlow {
    CompiledFlow::compile(builder.build().unwrap()).unwrap()
}

#[test]
fn start_and_terminal_sets() {
    let flow = compile(
        FlowBuilder::new("diamond")
            .node("a", "n")
            .node("b", "n")
            .node("c", "n")
            .node("d", "n")
            .edge("a", "b")
            .edge("a", "c")
            .edge("b", "d")
            .edge("c", "d"),
    );
    assert_eq!(flow.start_nodes(), ["a"]);
    assert_eq!(flow.terminal_nodes(), ["d"]);
    assert!(flow.cycles().is_empty());
}

#[test]
fn initial_pending_counts_incoming_edges() {
    let flow = compile(
        FlowBuilder::new("diamond")
            .node("a", "n")
            .node("b", "n")
            .node("d", "n")
            .edge("a", "b")
            .edge("a", "d")
            .edge("b", "d"),
    );
    let pending: std::collections::HashMap<_, _> =
        flow.initial_pending().into_iter().collect();
    assert_eq!(pending["a"], 0);
    assert_eq!(pending["b"], 1);
    assert_eq!(pending["d"], 2);
}

#[test]
fn multiple_starts_get_a_synthetic_root() {
    let flow = compile(
        FlowBuilder::new("two-heads")
            .node("left", "n")
            .node("right", "n")
            .node("join", "n")
            .edge("left", "join")
            .edge("right", "join"),
    );
    assert_eq!(flow.start_nodes(), [weft_core::builtin::PARALLEL_ROOT]);
    let root = flow.node(weft_core::builtin::PARALLEL_ROOT).unwrap();
    assert_eq!(root.uses, weft_core::builtin::PARALLEL);
    // Root fans out to the former starts in insertion order.
    let targets: Vec<_> = flow
        .outgoing(weft_core::builtin::PARALLEL_ROOT)
        .map(|e| e.target.clone())
        .collect();
    assert_eq!(targets, ["left", "right"]);
    // Former starts now have one pending predecessor.
    let pending: std::collections::HashMap<_, _> =
        flow.initial_pending().into_iter().collect();
    assert_eq!(pending["left"], 1);
}

#[test]
fn unguarded_cycle_is_reported() {
    let flow = compile(
        FlowBuilder::new("cyclic")
            .node("a", "n")
            .node("b", "n")
            .node("c", "n")
            .edge("a", "b")
            .edge("b", "c")
            .edge("c", "b"),
    );
    assert_eq!(flow.cycles().len(), 1);
    assert_eq!(flow.cycles()[0], ["b", "c"]);
}

#[test]
fn loop_controller_back_edge_is_exempt() {
    let flow = compile(
        FlowBuilder::new("looped")
            .node("init", "n")
            .node("search", "n")
            .node("answer", "n")
            .edge("init", "decide")
            .loop_while("decide", "loop_count < 2", "search", "search")
            .edge_on("decide", "answer", weft_core::builtin::BREAK_ACTION),
    );
    assert!(flow.cycles().is_empty(), "guarded cycle must not be reported");
    assert_eq!(flow.loop_body("decide"), ["search"]);
}

#[test]
fn cycle_through_a_loop_controller_break_exit_is_reported() {
    // The guarded body (ctrl -continue-> body -> ctrl) is fine, but the
    // break exit feeds back into the controller's predecessor: that outer
    // cycle has no guard and must be reported.
    let flow = compile(
        FlowBuilder::new("sneaky")
            .node("entry", "n")
            .node("body", "n")
            .node("exit", "n")
            .edge("entry", "ctrl")
            .loop_while("ctrl", "loop_count < 2", "body", "body")
            .edge_on("ctrl", "exit", weft_core::builtin::BREAK_ACTION)
            .edge("exit", "entry"),
    );
    assert_eq!(flow.cycles().len(), 1);
    assert_eq!(flow.cycles()[0], ["entry", "ctrl", "exit"]);
}

#[test]
fn loop_body_spans_chains_and_stops_at_controller() {
    let flow = compile(
        FlowBuilder::new("looped")
            .node("first", "n")
            .node("second", "n")
            .node("out", "n")
            .loop_while("ctrl", "loop_count < 3", "first", "second")
            .edge("first", "second")
            .edge_on("ctrl", "out", weft_core::builtin::BREAK_ACTION),
    );
    assert_eq!(flow.loop_body("ctrl"), ["first", "second"]);

    let rearm: std::collections::HashMap<_, _> =
        flow.loop_rearm("ctrl").into_iter().collect();
    // first: continue edge; second: edge from first; ctrl: tail edge.
    assert_eq!(rearm["first"], 1);
    assert_eq!(rearm["second"], 1);
    assert_eq!(rearm["ctrl"], 1);
}

#[test]
fn edge_order_is_preserved() {
    let flow = compile(
        FlowBuilder::new("ordered")
            .node("a", "n")
            .node("x", "n")
            .node("y", "n")
            .node("z", "n")
            .edge("a", "x")
            .edge("a", "y")
            .edge("a", "z"),
    );
    let targets: Vec<_> = flow.outgoing("a").map(|e| e.target.clone()).collect();
    assert_eq!(targets, ["x", "y", "z"]);
}

#[test]
fn instance_ids_resolve_to_templates() {
    let flow = compile(
        FlowBuilder::new("batched")
            .node("seed", "n")
            .batch("fan", "items", "work", serde_json::Value::Null, "out")
            .edge("seed", "fan"),
    );
    let template = flow.node_or_template("fan.worker#4").unwrap();
    assert_eq!(template.id, "fan.worker");
    assert!(flow.node_or_template("ghost#1").is_none());
    assert!(flow.node("fan.worker#4").is_none());
}
