// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::blueprint::{JoinStrategy, DEFAULT_ACTION};

#[test]
fn builds_linear_flow() {
    let bp = FlowBuilder::new("linear")
        .node("a", "one")
        .node("b", "two")
        .edge("a", "b")
        .build()
        .unwrap();
    assert_eq!(bp.id, "linear");
    assert_eq!(bp.nodes.len(), 2);
    assert_eq!(bp.edges.len(), 1);
    assert_eq!(bp.edges[0].action_label(), DEFAULT_ACTION);
}

#[test]
fn build_validates() {
    let err = FlowBuilder::new("bad").node("a", "one").edge("a", "ghost").build();
    assert!(err.is_err());
}

#[test]
fn edge_on_sets_action() {
    let bp = FlowBuilder::new("routed")
        .node("router", "route")
        .node("left", "l")
        .edge_on("router", "left", "left")
        .build()
        .unwrap();
    assert_eq!(bp.edges[0].action_label(), "left");
}

#[test]
fn edge_when_sets_condition() {
    let bp = FlowBuilder::new("guarded")
        .node("a", "one")
        .node("b", "two")
        .edge_when("a", "b", "flags.enabled")
        .build()
        .unwrap();
    assert_eq!(bp.edges[0].condition.as_deref(), Some("flags.enabled"));
}

#[test]
fn subflow_expands_params() {
    let bp = FlowBuilder::new("outer")
        .subflow("child", "inner", &[("seed", "x")], &[("result", "y")])
        .build()
        .unwrap();
    let node = bp.node("child").unwrap();
    assert_eq!(node.uses, builtin::SUBFLOW);
    assert_eq!(node.params["blueprint"], "inner");
    assert_eq!(node.params["inputs"]["seed"], "x");
    assert_eq!(node.params["outputs"]["result"], "y");
}

#[test]
fn batch_expands_to_scatter_worker_gather() {
    let bp = FlowBuilder::new("batched")
        .node("load", "load")
        .batch("fan", "items", "work.item", serde_json::Value::Null, "results")
        .node("done", "done")
        .edge("load", "fan")
        .edge("fan.gather", "done")
        .build()
        .unwrap();

    assert_eq!(bp.node("fan").unwrap().uses, builtin::SCATTER);
    assert_eq!(bp.node("fan.worker").unwrap().uses, "work.item");
    assert_eq!(bp.node("fan.gather").unwrap().uses, builtin::GATHER);
    assert_eq!(bp.node("fan").unwrap().params["from"], "items");
    assert_eq!(bp.node("fan").unwrap().params["worker"], "fan.worker");
    assert_eq!(bp.node("fan.gather").unwrap().params["to"], "results");

    // scatter → worker → gather chain is wired
    assert!(bp.edges.iter().any(|e| e.source == "fan" && e.target == "fan.worker"));
    assert!(bp.edges.iter().any(|e| e.source == "fan.worker" && e.target == "fan.gather"));
}

#[test]
fn loop_while_synthesizes_controller() {
    let bp = FlowBuilder::new("looped")
        .node("init", "init")
        .node("search", "search")
        .node("answer", "answer")
        .edge("init", "decide")
        .loop_while("decide", "loop_count < 2", "search", "search")
        .edge_on("decide", "answer", builtin::BREAK_ACTION)
        .build()
        .unwrap();

    let controller = bp.node("decide").unwrap();
    assert_eq!(controller.uses, builtin::LOOP);
    assert_eq!(controller.config.join_strategy, JoinStrategy::Any);
    assert_eq!(controller.params["condition"], "loop_count < 2");

    let continue_edge = bp
        .edges
        .iter()
        .find(|e| e.source == "decide" && e.action_label() == builtin::CONTINUE_ACTION)
        .unwrap();
    assert_eq!(continue_edge.target, "search");
    // tail edge re-enters the controller
    assert!(bp.edges.iter().any(|e| e.source == "search" && e.target == "decide"));
}
