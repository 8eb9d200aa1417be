// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use yare::parameterized;

fn linear() -> Blueprint {
    Blueprint::new(
        "linear",
        vec![Node::new("a", "one"), Node::new("b", "two")],
        vec![Edge::new("a", "b")],
    )
}

#[test]
fn valid_blueprint_passes() {
    assert!(linear().validate().is_ok());
}

#[test]
fn empty_blueprint_id_rejected() {
    let bp = Blueprint::new("", vec![Node::new("a", "one")], vec![]);
    assert!(matches!(bp.validate(), Err(BlueprintError::EmptyId)));
}

#[test]
fn duplicate_node_id_rejected() {
    let bp = Blueprint::new(
        "dup",
        vec![Node::new("a", "one"), Node::new("a", "two")],
        vec![],
    );
    assert!(matches!(bp.validate(), Err(BlueprintError::DuplicateNode(id)) if id == "a"));
}

#[test]
fn empty_uses_rejected() {
    let bp = Blueprint::new("x", vec![Node::new("a", "")], vec![]);
    assert!(matches!(bp.validate(), Err(BlueprintError::EmptyUses(id)) if id == "a"));
}

#[parameterized(
    source = { "ghost", "a" },
    target = { "a", "ghost" },
)]
fn dangling_edge_rejected(source: &str, target: &str) {
    let bp = Blueprint::new(
        "dangling",
        vec![Node::new("a", "one")],
        vec![Edge::new(source, target)],
    );
    assert!(matches!(
        bp.validate(),
        Err(BlueprintError::UnknownEndpoint { unknown, .. }) if unknown == "ghost"
    ));
}

#[test]
fn router_convergence_requires_any_join() {
    // Router fans out left/right directly into the same all-join target.
    let bp = Blueprint::new(
        "router",
        vec![Node::new("router", "route"), Node::new("merge", "merge")],
        vec![
            Edge::new("router", "merge").action("left"),
            Edge::new("router", "merge").action("right"),
        ],
    );
    assert!(matches!(
        bp.validate(),
        Err(BlueprintError::RouterConvergence(node, source)) if node == "merge" && source == "router"
    ));

    let bp = Blueprint::new(
        "router",
        vec![
            Node::new("router", "route"),
            Node::new("merge", "merge").config(NodeConfig::any_join()),
        ],
        vec![
            Edge::new("router", "merge").action("left"),
            Edge::new("router", "merge").action("right"),
        ],
    );
    assert!(bp.validate().is_ok());
}

#[test]
fn edge_action_label_defaults() {
    let edge = Edge::new("a", "b");
    assert_eq!(edge.action_label(), DEFAULT_ACTION);
    assert!(edge.is_default_action());

    let edge = Edge::new("a", "b").action("left");
    assert_eq!(edge.action_label(), "left");
    assert!(!edge.is_default_action());
}

#[test]
fn json_round_trip_preserves_structure() {
    let bp = Blueprint::new(
        "wire",
        vec![
            Node::new("a", "one").params(json!({"n": 1})).config(
                NodeConfig::default()
                    .max_retries(2)
                    .retry_delay_ms(10)
                    .timeout_ms(500u64)
                    .fatal_on_error(true),
            ),
            Node::new("b", "two").config(NodeConfig::any_join()),
        ],
        vec![
            Edge::new("a", "b")
                .action("left")
                .condition("flag")
                .transform("output.item"),
        ],
    );
    let json = bp.to_json().unwrap();
    let back = Blueprint::from_json(&json).unwrap();
    assert_eq!(back, bp);
}

#[test]
fn wire_format_uses_camel_case_config_keys() {
    let json = r#"{
        "id": "wire",
        "nodes": [
            { "id": "a", "uses": "one",
              "config": { "joinStrategy": "any", "maxRetries": 3,
                          "retryDelayMs": 25, "timeoutMs": 100,
                          "fatalOnError": true } },
            { "id": "b", "uses": "two" }
        ],
        "edges": [ { "source": "a", "target": "b", "action": "left" } ]
    }"#;
    let bp = Blueprint::from_json(json).unwrap();
    let a = bp.node("a").unwrap();
    assert_eq!(a.config.join_strategy, JoinStrategy::Any);
    assert_eq!(a.config.max_retries, 3);
    assert_eq!(a.config.retry_delay_ms, 25);
    assert_eq!(a.config.timeout_ms, Some(100));
    assert!(a.config.fatal_on_error);
    // Defaults when config is omitted entirely.
    let b = bp.node("b").unwrap();
    assert_eq!(b.config, NodeConfig::default());
}

#[test]
fn default_config_is_omitted_from_json() {
    let json = linear().to_json().unwrap();
    assert!(!json.contains("config"));
    assert!(!json.contains("params"));
}
