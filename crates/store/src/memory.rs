// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory coordination store.
//!
//! Every trait method is a single critical section over the per-run tables,
//! which makes each operation atomic exactly the way a remote backend's
//! single-key operations would be.

use crate::store::{CoordinationStore, JoinProgress, RunSeed, StoreError};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use weft_core::{NodeId, NodeOutcome, NodeStatus, RunFinal, RunId};

#[derive(Default)]
struct RunState {
    context: Map<String, Value>,
    status: HashMap<NodeId, NodeStatus>,
    results: HashMap<NodeId, NodeOutcome>,
    pending: HashMap<NodeId, u32>,
    satisfied: HashSet<NodeId>,
    cancelled: bool,
    final_status: Option<RunFinal>,
}

/// Process-local [`CoordinationStore`]. Cloning shares the tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    runs: Arc<Mutex<HashMap<RunId, RunState>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (not yet removed) runs, for GC assertions.
    pub fn run_count(&self) -> usize {
        self.runs.lock().len()
    }

    fn with_run<T>(
        &self,
        run: &RunId,
        f: impl FnOnce(&mut RunState) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut runs = self.runs.lock();
        let state = runs
            .get_mut(run)
            .ok_or_else(|| StoreError::RunNotFound(run.clone()))?;
        f(state)
    }
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn create_run(&self, run: &RunId, seed: RunSeed) -> Result<(), StoreError> {
        let mut runs = self.runs.lock();
        if runs.contains_key(run) {
            return Err(StoreError::RunExists(run.clone()));
        }
        let mut state = RunState {
            context: seed.context,
            ..RunState::default()
        };
        for (node, pending) in seed.nodes {
            state.status.insert(node.clone(), NodeStatus::Pending);
            state.pending.insert(node, pending);
        }
        runs.insert(run.clone(), state);
        Ok(())
    }

    async fn cas_status(
        &self,
        run: &RunId,
        node: &str,
        from: NodeStatus,
        to: NodeStatus,
    ) -> Result<bool, StoreError> {
        self.with_run(run, |state| {
            let current = state.status.get_mut(node).ok_or_else(|| {
                StoreError::UnknownNode { run: run.clone(), node: node.into() }
            })?;
            if *current == from {
                *current = to;
                Ok(true)
            } else {
                Ok(false)
            }
        })
    }

    async fn set_status(
        &self,
        run: &RunId,
        node: &str,
        to: NodeStatus,
    ) -> Result<(), StoreError> {
        self.with_run(run, |state| {
            state.status.insert(node.into(), to);
            Ok(())
        })
    }

    async fn status(&self, run: &RunId, node: &str) -> Result<Option<NodeStatus>, StoreError> {
        self.with_run(run, |state| Ok(state.status.get(node).copied()))
    }

    async fn statuses(&self, run: &RunId) -> Result<Vec<(NodeId, NodeStatus)>, StoreError> {
        self.with_run(run, |state| {
            Ok(state.status.iter().map(|(k, v)| (k.clone(), *v)).collect())
        })
    }

    async fn put_result(
        &self,
        run: &RunId,
        node: &str,
        outcome: &NodeOutcome,
    ) -> Result<(), StoreError> {
        self.with_run(run, |state| {
            state.results.insert(node.into(), outcome.clone());
            Ok(())
        })
    }

    async fn result(&self, run: &RunId, node: &str) -> Result<Option<NodeOutcome>, StoreError> {
        self.with_run(run, |state| Ok(state.results.get(node).cloned()))
    }

    async fn context_get(&self, run: &RunId, key: &str) -> Result<Option<Value>, StoreError> {
        self.with_run(run, |state| Ok(state.context.get(key).cloned()))
    }

    async fn context_set(&self, run: &RunId, key: &str, value: Value) -> Result<(), StoreError> {
        self.with_run(run, |state| {
            state.context.insert(key.to_string(), value);
            Ok(())
        })
    }

    async fn context_delete(&self, run: &RunId, key: &str) -> Result<bool, StoreError> {
        self.with_run(run, |state| Ok(state.context.remove(key).is_some()))
    }

    async fn context_snapshot(&self, run: &RunId) -> Result<Map<String, Value>, StoreError> {
        self.with_run(run, |state| Ok(state.context.clone()))
    }

    async fn set_pending(&self, run: &RunId, node: &str, count: u32) -> Result<(), StoreError> {
        self.with_run(run, |state| {
            state.pending.insert(node.into(), count);
            Ok(())
        })
    }

    async fn decrement_pending(
        &self,
        run: &RunId,
        node: &str,
        satisfied: bool,
    ) -> Result<JoinProgress, StoreError> {
        self.with_run(run, |state| {
            let count = state.pending.entry(node.into()).or_insert(0);
            *count = count.saturating_sub(1);
            let remaining = *count;
            if satisfied {
                state.satisfied.insert(node.into());
            }
            Ok(JoinProgress { remaining, satisfied: state.satisfied.contains(node) })
        })
    }

    async fn arm_nodes(&self, run: &RunId, nodes: &[(NodeId, u32)]) -> Result<(), StoreError> {
        self.with_run(run, |state| {
            for (node, pending) in nodes {
                state.status.insert(node.clone(), NodeStatus::Pending);
                state.pending.insert(node.clone(), *pending);
                state.satisfied.remove(node);
            }
            Ok(())
        })
    }

    async fn set_cancelled(&self, run: &RunId) -> Result<(), StoreError> {
        self.with_run(run, |state| {
            state.cancelled = true;
            Ok(())
        })
    }

    async fn is_cancelled(&self, run: &RunId) -> Result<bool, StoreError> {
        self.with_run(run, |state| Ok(state.cancelled))
    }

    async fn put_final(&self, run: &RunId, final_status: RunFinal) -> Result<(), StoreError> {
        self.with_run(run, |state| {
            state.final_status = Some(final_status);
            Ok(())
        })
    }

    async fn get_final(&self, run: &RunId) -> Result<Option<RunFinal>, StoreError> {
        self.with_run(run, |state| Ok(state.final_status.clone()))
    }

    async fn remove_run(&self, run: &RunId) -> Result<(), StoreError> {
        self.runs.lock().remove(run);
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
