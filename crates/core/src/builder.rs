// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Imperative blueprint authoring.
//!
//! The builder is sugar over the declarative form: everything it produces
//! is a plain [`Blueprint`] that validates and serializes like one loaded
//! from storage. Batch, loop, and subflow helpers macro-expand into the
//! corresponding `builtin:` nodes at authoring time.

use crate::blueprint::{Blueprint, BlueprintError, Edge, Node, NodeConfig, NodeId};
use crate::builtin;
use serde_json::{json, Value};
use smol_str::SmolStr;

/// Builds a [`Blueprint`] node by node, edge by edge.
///
/// ```
/// use weft_core::FlowBuilder;
///
/// let blueprint = FlowBuilder::new("pipeline")
///     .node("fetch", "http.get")
///     .node("parse", "json.parse")
///     .edge("fetch", "parse")
///     .build()
///     .unwrap();
/// assert_eq!(blueprint.nodes.len(), 2);
/// ```
pub struct FlowBuilder {
    id: String,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl FlowBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), nodes: Vec::new(), edges: Vec::new() }
    }

    /// Add a node with null params and default config.
    pub fn node(self, id: impl Into<NodeId>, uses: impl Into<String>) -> Self {
        self.add(Node::new(id, uses))
    }

    /// Add a node with params.
    pub fn node_params(
        self,
        id: impl Into<NodeId>,
        uses: impl Into<String>,
        params: Value,
    ) -> Self {
        self.add(Node::new(id, uses).params(params))
    }

    /// Add a node with params and config.
    pub fn node_full(
        self,
        id: impl Into<NodeId>,
        uses: impl Into<String>,
        params: Value,
        config: NodeConfig,
    ) -> Self {
        self.add(Node::new(id, uses).params(params).config(config))
    }

    /// Add a fully-specified node.
    pub fn add(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    /// Connect two nodes on the default action.
    pub fn edge(self, source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        self.connect(Edge::new(source, target))
    }

    /// Connect two nodes on a named action.
    pub fn edge_on(
        self,
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
        action: impl Into<SmolStr>,
    ) -> Self {
        self.connect(Edge::new(source, target).action(action))
    }

    /// Connect two nodes guarded by a condition expression.
    pub fn edge_when(
        self,
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
        condition: impl Into<String>,
    ) -> Self {
        self.connect(Edge::new(source, target).condition(condition))
    }

    /// Add a fully-specified edge.
    pub fn connect(mut self, edge: Edge) -> Self {
        self.edges.push(edge);
        self
    }

    /// Add a subflow node running `blueprint` as a child run.
    ///
    /// `inputs` maps child context keys to property-path expressions over
    /// the parent snapshot; `outputs` maps parent keys to child keys copied
    /// back on completion.
    pub fn subflow(
        self,
        id: impl Into<NodeId>,
        blueprint: impl Into<String>,
        inputs: &[(&str, &str)],
        outputs: &[(&str, &str)],
    ) -> Self {
        let params = json!({
            "blueprint": blueprint.into(),
            "inputs": Value::Object(pairs(inputs)),
            "outputs": Value::Object(pairs(outputs)),
        });
        self.add(Node::new(id, builtin::SUBFLOW).params(params))
    }

    /// Expand a batch over the array at context key `from`.
    ///
    /// Produces `{id}` (scatter) → `{id}.worker` (one instance per array
    /// element, running `worker_uses`) → `{id}.gather`, which writes the
    /// ordered output array to context key `to`. Wire `{id}` and
    /// `{id}.gather` into the surrounding graph.
    pub fn batch(
        mut self,
        id: &str,
        from: impl Into<String>,
        worker_uses: impl Into<String>,
        worker_params: Value,
        to: impl Into<String>,
    ) -> Self {
        let worker_id = format!("{id}.worker");
        let gather_id = format!("{id}.gather");
        let scatter = Node::new(id, builtin::SCATTER)
            .params(json!({ "from": from.into(), "worker": worker_id.clone() }));
        let worker = Node::new(worker_id.as_str(), worker_uses).params(worker_params);
        let gather =
            Node::new(gather_id.as_str(), builtin::GATHER).params(json!({ "to": to.into() }));
        self.nodes.extend([scatter, worker, gather]);
        self.edges.push(Edge::new(id, worker_id.as_str()));
        self.edges.push(Edge::new(worker_id.as_str(), gather_id.as_str()));
        self
    }

    /// Add a loop controller guarding the body `body_start ..= body_end`.
    ///
    /// While `condition` holds the controller routes `continue` to
    /// `body_start`; the tail edge `body_end → {id}` re-enters the
    /// controller. Route the exit with an `edge_on(id, .., "break")`.
    /// Controllers always join on `any` — the initial entry and the tail
    /// edge converge on them.
    pub fn loop_while(
        mut self,
        id: impl Into<NodeId>,
        condition: impl Into<String>,
        body_start: impl Into<NodeId>,
        body_end: impl Into<NodeId>,
    ) -> Self {
        let id = id.into();
        let controller = Node::new(id.clone(), builtin::LOOP)
            .params(json!({ "condition": condition.into() }))
            .config(NodeConfig::any_join());
        self.nodes.push(controller);
        self.edges
            .push(Edge::new(id.clone(), body_start).action(builtin::CONTINUE_ACTION));
        self.edges.push(Edge::new(body_end, id));
        self
    }

    /// Validate and produce the blueprint.
    pub fn build(self) -> Result<Blueprint, BlueprintError> {
        let blueprint = Blueprint::new(self.id, self.nodes, self.edges);
        blueprint.validate()?;
        Ok(blueprint)
    }
}

fn pairs(entries: &[(&str, &str)]) -> serde_json::Map<String, Value> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect()
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod tests;
