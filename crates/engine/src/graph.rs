// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Blueprint compilation and graph analysis.
//!
//! A [`CompiledFlow`] is the runnable form of a blueprint: ordered node and
//! edge indexes, adjacency, start/terminal sets, initial pending counts,
//! cycle reports, and precomputed loop bodies. Tie-breaking everywhere
//! follows blueprint insertion order.

use indexmap::IndexMap;
use std::collections::{HashMap, HashSet, VecDeque};
use weft_core::{builtin, Blueprint, BlueprintError, Edge, Node, NodeId};

/// Immutable runnable form of a validated blueprint.
pub struct CompiledFlow {
    id: String,
    nodes: IndexMap<NodeId, Node>,
    edges: Vec<Edge>,
    outgoing: HashMap<NodeId, Vec<usize>>,
    incoming: HashMap<NodeId, Vec<usize>>,
    start: Vec<NodeId>,
    terminal: Vec<NodeId>,
    cycles: Vec<Vec<NodeId>>,
    loop_bodies: HashMap<NodeId, Vec<NodeId>>,
}

impl CompiledFlow {
    /// Validate and compile. A blueprint with more than one start node gets
    /// a synthetic `builtin:parallel` root injected so every run has a
    /// single entry point.
    pub fn compile(blueprint: Blueprint) -> Result<Self, BlueprintError> {
        blueprint.validate()?;
        let Blueprint { id, mut nodes, mut edges } = blueprint;

        let with_incoming: HashSet<NodeId> =
            edges.iter().map(|e| e.target.clone()).collect();
        let raw_starts: Vec<NodeId> = nodes
            .iter()
            .filter(|n| !with_incoming.contains(&n.id))
            .map(|n| n.id.clone())
            .collect();
        if raw_starts.len() > 1 {
            nodes.push(Node::new(builtin::PARALLEL_ROOT, builtin::PARALLEL));
            for start in &raw_starts {
                edges.push(Edge::new(builtin::PARALLEL_ROOT, start.clone()));
            }
        }

        let nodes: IndexMap<NodeId, Node> =
            nodes.into_iter().map(|n| (n.id.clone(), n)).collect();
        let mut outgoing: HashMap<NodeId, Vec<usize>> = HashMap::new();
        let mut incoming: HashMap<NodeId, Vec<usize>> = HashMap::new();
        for (index, edge) in edges.iter().enumerate() {
            outgoing.entry(edge.source.clone()).or_default().push(index);
            incoming.entry(edge.target.clone()).or_default().push(index);
        }

        let start: Vec<NodeId> = nodes
            .keys()
            .filter(|id| !incoming.contains_key(*id))
            .cloned()
            .collect();
        let terminal: Vec<NodeId> = nodes
            .keys()
            .filter(|id| !outgoing.contains_key(*id))
            .cloned()
            .collect();

        let cycles = find_cycles(&nodes, &edges, &outgoing);
        let loop_bodies = find_loop_bodies(&nodes, &edges, &outgoing);

        Ok(Self { id, nodes, edges, outgoing, incoming, start, terminal, cycles, loop_bodies })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Resolve a node id, mapping dynamic `template#i` instance ids back to
    /// their template node.
    pub fn node_or_template(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id).or_else(|| {
            let (template, _) = builtin::split_instance(id)?;
            self.nodes.get(template)
        })
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Outgoing edges of `id` in blueprint insertion order.
    pub fn outgoing(&self, id: &str) -> impl Iterator<Item = &Edge> {
        self.outgoing
            .get(id)
            .into_iter()
            .flatten()
            .map(|&index| &self.edges[index])
    }

    /// Incoming edges of `id` in blueprint insertion order.
    pub fn incoming(&self, id: &str) -> impl Iterator<Item = &Edge> {
        self.incoming
            .get(id)
            .into_iter()
            .flatten()
            .map(|&index| &self.edges[index])
    }

    /// Nodes with no incoming edges (after any synthetic-root injection
    /// this is a single node).
    pub fn start_nodes(&self) -> &[NodeId] {
        &self.start
    }

    /// Nodes with no outgoing edges.
    pub fn terminal_nodes(&self) -> &[NodeId] {
        &self.terminal
    }

    /// Cycles found by depth-first coloring, excluding the expected back
    /// edges into loop controllers. Each entry lists the node ids on the
    /// cycle.
    pub fn cycles(&self) -> &[Vec<NodeId>] {
        &self.cycles
    }

    /// Every node with its incoming-edge count: the seed for the run's
    /// `pendingPredecessors` table.
    pub fn initial_pending(&self) -> Vec<(NodeId, u32)> {
        self.nodes
            .keys()
            .map(|id| {
                let count = self.incoming.get(id).map(|v| v.len() as u32).unwrap_or(0);
                (id.clone(), count)
            })
            .collect()
    }

    /// Nodes inside a loop controller's body (reachable from its
    /// `continue` edges without re-entering the controller).
    pub fn loop_body(&self, controller: &str) -> &[NodeId] {
        self.loop_bodies.get(controller).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Rows to re-arm when a controller emits `continue`: the body nodes
    /// and the controller itself, each with its static pending count.
    pub fn loop_rearm(&self, controller: &str) -> Vec<(NodeId, u32)> {
        let pending = |id: &NodeId| {
            self.incoming.get(id).map(|v| v.len() as u32).unwrap_or(0)
        };
        let mut rows: Vec<(NodeId, u32)> = self
            .loop_body(controller)
            .iter()
            .map(|id| (id.clone(), pending(id)))
            .collect();
        if let Some(node) = self.nodes.get(controller) {
            rows.push((node.id.clone(), pending(&node.id)));
        }
        rows
    }
}

fn is_loop_controller(nodes: &IndexMap<NodeId, Node>, id: &str) -> bool {
    nodes.get(id).map(|n| n.uses == builtin::LOOP).unwrap_or(false)
}

/// Depth-first three-coloring. A back edge closing on a loop controller
/// still open on the DFS path is the expected tail edge of a guarded body
/// and goes unreported; every other edge is traversed normally, so cycles
/// that merely pass through a controller (e.g. re-entering via its `break`
/// exit) are still caught.
fn find_cycles(
    nodes: &IndexMap<NodeId, Node>,
    edges: &[Edge],
    outgoing: &HashMap<NodeId, Vec<usize>>,
) -> Vec<Vec<NodeId>> {
    const WHITE: u8 = 0;
    const GRAY: u8 = 1;
    const BLACK: u8 = 2;

    let mut color: HashMap<&NodeId, u8> = nodes.keys().map(|id| (id, WHITE)).collect();
    let mut cycles = Vec::new();

    for root in nodes.keys() {
        if color[root] != WHITE {
            continue;
        }
        // Iterative DFS: (node, next child index to visit).
        let mut stack: Vec<(&NodeId, usize)> = vec![(root, 0)];
        let mut path: Vec<&NodeId> = vec![root];
        color.insert(root, GRAY);

        while let Some(top) = stack.last_mut() {
            let node = top.0;
            let child = top.1;
            top.1 += 1;
            let successors = outgoing.get(node).map(Vec::as_slice).unwrap_or(&[]);
            match successors.get(child).copied() {
                Some(edge_index) => {
                    let target = &edges[edge_index].target;
                    match color[target] {
                        WHITE => {
                            color.insert(target, GRAY);
                            stack.push((target, 0));
                            path.push(target);
                        }
                        GRAY => {
                            // Gray means on the current path: this edge
                            // closes a cycle. Exempt only the tail edge
                            // back into an open loop controller.
                            if is_loop_controller(nodes, target) {
                                continue;
                            }
                            if let Some(pos) = path.iter().position(|id| *id == target) {
                                cycles.push(path[pos..].iter().map(|id| (*id).clone()).collect());
                            }
                        }
                        _ => {}
                    }
                }
                None => {
                    color.insert(node, BLACK);
                    stack.pop();
                    path.pop();
                }
            }
        }
    }
    cycles
}

/// Breadth-first walk from each controller's `continue` targets, stopping
/// at the controller.
fn find_loop_bodies(
    nodes: &IndexMap<NodeId, Node>,
    edges: &[Edge],
    outgoing: &HashMap<NodeId, Vec<usize>>,
) -> HashMap<NodeId, Vec<NodeId>> {
    let mut bodies = HashMap::new();
    for (id, node) in nodes {
        if node.uses != builtin::LOOP {
            continue;
        }
        let mut body: Vec<NodeId> = Vec::new();
        let mut seen: HashSet<&NodeId> = HashSet::new();
        let mut queue: VecDeque<&NodeId> = outgoing
            .get(id)
            .into_iter()
            .flatten()
            .map(|&index| &edges[index])
            .filter(|e| e.action_label() == builtin::CONTINUE_ACTION)
            .map(|e| &e.target)
            .collect();
        while let Some(current) = queue.pop_front() {
            if current == id || !seen.insert(current) {
                continue;
            }
            body.push(current.clone());
            for &edge_index in outgoing.get(current).into_iter().flatten() {
                queue.push_back(&edges[edge_index].target);
            }
        }
        bodies.insert(id.clone(), body);
    }
    bodies
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
