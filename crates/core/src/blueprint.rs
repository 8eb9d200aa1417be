// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Blueprint data model: the immutable, serializable graph description.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use smol_str::SmolStr;
use std::collections::HashSet;
use thiserror::Error;

/// Node ids are author-chosen strings, unique within a blueprint.
pub type NodeId = SmolStr;

/// Action discriminator used when a node result declares none.
pub const DEFAULT_ACTION: &str = "default";

/// Action discriminator matched against the outgoing edges of a *failed*
/// node. A failed node with no `fallback` edges skips its whole subtree.
pub const FALLBACK_ACTION: &str = "fallback";

/// Errors raised while parsing or validating a blueprint.
#[derive(Debug, Error)]
pub enum BlueprintError {
    #[error("blueprint id is empty")]
    EmptyId,
    #[error("node id is empty")]
    EmptyNodeId,
    #[error("duplicate node id: {0}")]
    DuplicateNode(NodeId),
    #[error("node {0}: uses selector is empty")]
    EmptyUses(NodeId),
    #[error("edge {edge_source} -> {target}: unknown node {unknown}")]
    UnknownEndpoint {
        edge_source: NodeId,
        target: NodeId,
        unknown: NodeId,
    },
    #[error(
        "node {0} converges multiple actions from {1} and must declare joinStrategy \"any\""
    )]
    RouterConvergence(NodeId, NodeId),
    #[error("invalid blueprint json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Rule for when a multi-predecessor node becomes ready.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinStrategy {
    /// Ready once every connected predecessor has resolved and at least one
    /// satisfied its edge.
    #[default]
    All,
    /// Ready on the first satisfying predecessor; later completions are
    /// discarded for this run.
    Any,
}

crate::simple_display! {
    JoinStrategy {
        All => "all",
        Any => "any",
    }
}

/// Per-node execution configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeConfig {
    pub join_strategy: JoinStrategy,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub fatal_on_error: bool,
}

impl NodeConfig {
    crate::setters! {
        set {
            join_strategy: JoinStrategy,
            max_retries: u32,
            retry_delay_ms: u64,
            fatal_on_error: bool,
        }
        option {
            timeout_ms: u64,
        }
    }

    /// Shorthand for `joinStrategy = "any"`.
    pub fn any_join() -> Self {
        Self::default().join_strategy(JoinStrategy::Any)
    }

    fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// A unit of work referencing an implementation by `uses`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub uses: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
    #[serde(default, skip_serializing_if = "NodeConfig::is_default")]
    pub config: NodeConfig,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, uses: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            uses: uses.into(),
            params: Value::Null,
            config: NodeConfig::default(),
        }
    }

    crate::setters! {
        set {
            params: Value,
            config: NodeConfig,
        }
    }
}

/// Directed connection between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    /// Discriminator matched against the producing node's result action.
    /// Absent means the default action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<SmolStr>,
    /// Property-path expression over the run context; the edge is taken
    /// only when it resolves truthy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Expression producing the successor's input payload, resolved over
    /// the context snapshot with the producing node's `output` bound in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<String>,
}

impl Edge {
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            action: None,
            condition: None,
            transform: None,
        }
    }

    crate::setters! {
        option {
            action: SmolStr,
            condition: String,
            transform: String,
        }
    }

    /// The discriminator this edge matches, defaulting to [`DEFAULT_ACTION`].
    pub fn action_label(&self) -> &str {
        self.action.as_deref().unwrap_or(DEFAULT_ACTION)
    }

    pub fn is_default_action(&self) -> bool {
        self.action_label() == DEFAULT_ACTION
    }
}

/// Immutable, serializable graph description: nodes, edges, config.
///
/// A blueprint carries no execution state. The same validated blueprint is
/// shared read-only by every run and every worker process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    pub id: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Blueprint {
    pub fn new(id: impl Into<String>, nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { id: id.into(), nodes, edges }
    }

    /// Parse a blueprint from its JSON wire form and validate it.
    pub fn from_json(json: &str) -> Result<Self, BlueprintError> {
        let blueprint: Self = serde_json::from_str(json)?;
        blueprint.validate()?;
        Ok(blueprint)
    }

    pub fn to_json(&self) -> Result<String, BlueprintError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Check the structural invariants: non-empty ids, unique node ids,
    /// edge endpoints resolving to nodes, and `any` join declared on direct
    /// convergence points of a multi-action router.
    pub fn validate(&self) -> Result<(), BlueprintError> {
        if self.id.is_empty() {
            return Err(BlueprintError::EmptyId);
        }

        let mut seen: HashSet<&str> = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if node.id.is_empty() {
                return Err(BlueprintError::EmptyNodeId);
            }
            if node.uses.is_empty() {
                return Err(BlueprintError::EmptyUses(node.id.clone()));
            }
            if !seen.insert(node.id.as_str()) {
                return Err(BlueprintError::DuplicateNode(node.id.clone()));
            }
        }

        for edge in &self.edges {
            for endpoint in [&edge.source, &edge.target] {
                if !seen.contains(endpoint.as_str()) {
                    return Err(BlueprintError::UnknownEndpoint {
                        edge_source: edge.source.clone(),
                        target: edge.target.clone(),
                        unknown: endpoint.clone(),
                    });
                }
            }
        }

        self.check_router_convergence()?;
        Ok(())
    }

    /// A target fed by two or more distinct non-default actions of the same
    /// source can never satisfy an `all` join: only one branch fires per
    /// result. Catch the direct form of that authoring mistake here.
    fn check_router_convergence(&self) -> Result<(), BlueprintError> {
        for node in &self.nodes {
            if node.config.join_strategy == JoinStrategy::Any {
                continue;
            }
            let incoming: Vec<&Edge> =
                self.edges.iter().filter(|e| e.target == node.id).collect();
            for (i, a) in incoming.iter().enumerate() {
                for b in &incoming[i + 1..] {
                    if a.source == b.source
                        && !a.is_default_action()
                        && !b.is_default_action()
                        && a.action_label() != b.action_label()
                    {
                        return Err(BlueprintError::RouterConvergence(
                            node.id.clone(),
                            a.source.clone(),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "blueprint_tests.rs"]
mod tests;
