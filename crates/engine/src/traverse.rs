// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Graph traversal and join logic.
//!
//! Given a just-completed node, the traverser selects its eligible outgoing
//! edges, consumes one predecessor signal per edge through the store's
//! atomic decrement, and reports which targets became ready. Untaken
//! branches receive unsatisfying signals so convergence points can resolve
//! without executing them; subgraphs that can never be satisfied are marked
//! skipped transitively. The traverser never executes anything.
//!
//! Readiness dedup is not handled here: duplicate ready proposals (an `any`
//! join hearing from several predecessors, or queue redelivery) are
//! discarded by the dispatcher's `pending → running` status CAS.

use crate::error::EngineError;
use crate::eval;
use crate::graph::CompiledFlow;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use weft_core::{
    builtin, Edge, JoinStrategy, NodeId, NodeOutcome, NodeStatus, RunId, DEFAULT_ACTION,
    FALLBACK_ACTION,
};
use weft_store::CoordinationStore;

/// How the completed node resolved, as seen by join logic.
pub(crate) enum Signal<'s> {
    Succeeded(&'s NodeOutcome),
    /// Recoverable failure after retries: `fallback` edges fire, everything
    /// else is treated as an untaken branch.
    Failed,
    /// The node was skipped; every outgoing edge is untaken.
    Skipped,
}

/// Result of consuming one completion.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Advance {
    /// Targets that became ready, in edge order. May contain nodes that a
    /// concurrent completion also proposed; the dispatch CAS settles it.
    pub ready: Vec<NodeId>,
    /// Nodes newly marked skipped (transitively).
    pub skipped: Vec<NodeId>,
}

pub(crate) struct Traverser<'t> {
    pub flow: &'t CompiledFlow,
    pub store: &'t Arc<dyn CoordinationStore>,
}

impl Traverser<'_> {
    /// Consume the completion of `node_id` and work out what runs next.
    pub(crate) async fn advance(
        &self,
        run: &RunId,
        node_id: &str,
        signal: Signal<'_>,
    ) -> Result<Advance, EngineError> {
        // Dynamic scatter instances traverse through their template's edges.
        let edges_of = builtin::split_instance(node_id)
            .map(|(template, _)| template)
            .unwrap_or(node_id);
        let snapshot = Value::Object(self.store.context_snapshot(run).await?);
        let outgoing: Vec<&Edge> = self.flow.outgoing(edges_of).collect();

        let (eligible, suppress_untaken) = match &signal {
            Signal::Succeeded(outcome) => {
                let is_loop = self
                    .flow
                    .node(edges_of)
                    .map(|n| n.uses == builtin::LOOP)
                    .unwrap_or(false);
                // A loop controller emitting `continue` must leave its
                // `break` exit pending for a later iteration.
                let suppress = is_loop && outcome.action == builtin::CONTINUE_ACTION;
                (eligible_mask(&outgoing, &outcome.action, &snapshot), suppress)
            }
            Signal::Failed => (failure_mask(&outgoing, &snapshot), false),
            Signal::Skipped => (vec![false; outgoing.len()], false),
        };

        let mut advance = Advance::default();
        let mut skip_queue: VecDeque<NodeId> = VecDeque::new();
        for (edge, taken) in outgoing.iter().zip(&eligible) {
            if *taken {
                self.signal_target(run, &edge.target, true, &mut advance, &mut skip_queue)
                    .await?;
            } else if !suppress_untaken {
                self.signal_target(run, &edge.target, false, &mut advance, &mut skip_queue)
                    .await?;
            }
        }

        // Skips propagate until a node with a satisfied join (or an
        // undecided predecessor) is reached.
        while let Some(skipped) = skip_queue.pop_front() {
            let downstream: Vec<NodeId> = self
                .flow
                .outgoing(&skipped)
                .map(|e| e.target.clone())
                .collect();
            for target in downstream {
                self.signal_target(run, &target, false, &mut advance, &mut skip_queue)
                    .await?;
            }
        }

        Ok(advance)
    }

    async fn signal_target(
        &self,
        run: &RunId,
        target: &NodeId,
        satisfied: bool,
        advance: &mut Advance,
        skip_queue: &mut VecDeque<NodeId>,
    ) -> Result<(), EngineError> {
        let strategy = self
            .flow
            .node(target)
            .map(|n| n.config.join_strategy)
            .unwrap_or_default();
        let progress = self.store.decrement_pending(run, target, satisfied).await?;
        match strategy {
            JoinStrategy::Any => {
                if satisfied {
                    // First satisfying predecessor wins at the dispatch CAS;
                    // later proposals are discarded there.
                    advance.ready.push(target.clone());
                } else if progress.remaining == 0 && !progress.satisfied {
                    self.mark_skipped(run, target, advance, skip_queue).await?;
                }
            }
            JoinStrategy::All => {
                if progress.remaining == 0 {
                    if progress.satisfied {
                        advance.ready.push(target.clone());
                    } else {
                        self.mark_skipped(run, target, advance, skip_queue).await?;
                    }
                }
            }
        }
        Ok(())
    }

    async fn mark_skipped(
        &self,
        run: &RunId,
        target: &NodeId,
        advance: &mut Advance,
        skip_queue: &mut VecDeque<NodeId>,
    ) -> Result<(), EngineError> {
        // Only a pending node can become skipped; terminal nodes (prior
        // loop iterations, concurrent completions) stop the propagation.
        if self
            .store
            .cas_status(run, target, NodeStatus::Pending, NodeStatus::Skipped)
            .await?
        {
            tracing::debug!(run = %run, node = %target, "branch skipped");
            advance.skipped.push(target.clone());
            skip_queue.push_back(target.clone());
        }
        Ok(())
    }

    /// Deterministic input for a node about to execute, recomputed from the
    /// store so orchestrator and worker modes agree: the first eligible
    /// incoming edge (blueprint order) from a succeeded predecessor, with
    /// the edge transform applied. Scatter instances receive their element
    /// of the scatter output instead.
    pub(crate) async fn compute_input(
        &self,
        run: &RunId,
        node_id: &str,
    ) -> Result<Value, EngineError> {
        if let Some((template, index)) = builtin::split_instance(node_id) {
            let scatter = self
                .flow
                .incoming(template)
                .find(|e| {
                    self.flow
                        .node(&e.source)
                        .map(|n| n.uses == builtin::SCATTER)
                        .unwrap_or(false)
                })
                .map(|e| e.source.clone());
            if let Some(scatter) = scatter {
                if let Some(result) = self.store.result(run, &scatter).await? {
                    return Ok(result
                        .output
                        .get(index)
                        .cloned()
                        .unwrap_or(Value::Null));
                }
            }
            return Ok(Value::Null);
        }

        let snapshot = Value::Object(self.store.context_snapshot(run).await?);
        let incoming: Vec<Edge> = self.flow.incoming(node_id).cloned().collect();
        for edge in &incoming {
            if self.store.status(run, &edge.source).await? != Some(NodeStatus::Succeeded) {
                continue;
            }
            let Some(result) = self.store.result(run, &edge.source).await? else {
                continue;
            };
            if !self.edge_was_taken(edge, &result.action, &snapshot) {
                continue;
            }
            let input = match &edge.transform {
                Some(expr) => transform_scope(&snapshot, &result.output)
                    .map(|scope| {
                        eval::resolve_path(&scope, expr).cloned().unwrap_or(Value::Null)
                    })
                    .unwrap_or(Value::Null),
                None => result.output.clone(),
            };
            return Ok(input);
        }
        Ok(Value::Null)
    }

    /// Whether `edge` was among its source's eligible edges for the emitted
    /// action, using the same tiering as [`advance`].
    fn edge_was_taken(&self, edge: &Edge, action: &str, snapshot: &Value) -> bool {
        let outgoing: Vec<&Edge> = self.flow.outgoing(&edge.source).collect();
        let mask = eligible_mask(&outgoing, action, snapshot);
        outgoing
            .iter()
            .zip(&mask)
            .any(|(candidate, taken)| *taken && **candidate == *edge)
    }
}

/// Eligibility per outgoing edge, in order.
///
/// Tiering: if any edge is labeled with the emitted (non-default) action,
/// only those edges are considered; otherwise the default-action edges are.
/// Conditions then filter within the tier, in property-path mode.
fn eligible_mask(outgoing: &[&Edge], action: &str, snapshot: &Value) -> Vec<bool> {
    let has_labeled_match = action != DEFAULT_ACTION
        && outgoing.iter().any(|e| e.action_label() == action);
    let tier = if has_labeled_match { action } else { DEFAULT_ACTION };
    outgoing
        .iter()
        .map(|edge| {
            edge.action_label() == tier
                && edge
                    .condition
                    .as_deref()
                    .map(|expr| eval::path_condition(expr, snapshot))
                    .unwrap_or(true)
        })
        .collect()
}

/// A failed node fires only its `fallback`-labeled edges; there is no
/// default tier, so a failure without fallback edges skips the subtree.
fn failure_mask(outgoing: &[&Edge], snapshot: &Value) -> Vec<bool> {
    outgoing
        .iter()
        .map(|edge| {
            edge.action_label() == FALLBACK_ACTION
                && edge
                    .condition
                    .as_deref()
                    .map(|expr| eval::path_condition(expr, snapshot))
                    .unwrap_or(true)
        })
        .collect()
}

fn transform_scope(snapshot: &Value, output: &Value) -> Option<Value> {
    let mut scope = snapshot.as_object()?.clone();
    scope.insert("output".to_string(), output.clone());
    Some(Value::Object(scope))
}

#[cfg(test)]
#[path = "traverse_tests.rs"]
mod tests;
