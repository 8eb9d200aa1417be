// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordination store contract.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use weft_core::{NodeId, NodeOutcome, NodeStatus, RunFinal, RunId};

/// Errors surfaced by a coordination store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("run not found: {0}")]
    RunNotFound(RunId),
    #[error("run {run}: unknown node {node}")]
    UnknownNode { run: RunId, node: NodeId },
    #[error("run {0} already exists")]
    RunExists(RunId),
    /// Worth retrying with backoff; see [`crate::Retrying`].
    #[error("transient store error: {0}")]
    Transient(String),
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

/// Initial per-run tables: seeded context plus one `(node, pending)` row per
/// blueprint node, where `pending` is the node's incoming-edge count.
#[derive(Debug, Clone, Default)]
pub struct RunSeed {
    pub context: Map<String, Value>,
    pub nodes: Vec<(NodeId, u32)>,
}

/// Result of one atomic pending decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinProgress {
    /// Predecessor signals still outstanding (saturating at zero).
    pub remaining: u32,
    /// Whether any signal so far was a satisfying one (an eligible edge
    /// from a succeeded predecessor), including this one.
    pub satisfied: bool,
}

/// External owner of all per-run mutable state.
///
/// Every method is one atomic operation against the backend; the kernel
/// never needs multi-call transactions. The `pending → running` status CAS
/// is the basis for at-most-one execution per (run, node) across workers,
/// and doubles as readiness dedup for `any` joins.
///
/// Two operations extend the minimal contract for correctness under
/// concurrency: `decrement_pending` folds the satisfied bit into the atomic
/// decrement (a separate mark would race across workers), and `arm_nodes`
/// creates or resets status rows in one call for loop re-entry and dynamic
/// scatter instances.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Create the run's tables. Fails with [`StoreError::RunExists`] if the
    /// run id is already present.
    async fn create_run(&self, run: &RunId, seed: RunSeed) -> Result<(), StoreError>;

    /// Atomically transition `node` from `from` to `to`; returns whether
    /// the swap happened.
    async fn cas_status(
        &self,
        run: &RunId,
        node: &str,
        from: NodeStatus,
        to: NodeStatus,
    ) -> Result<bool, StoreError>;

    /// Unconditional status write (seeding and bookkeeping paths only).
    async fn set_status(&self, run: &RunId, node: &str, to: NodeStatus)
        -> Result<(), StoreError>;

    async fn status(&self, run: &RunId, node: &str) -> Result<Option<NodeStatus>, StoreError>;

    /// All known `(node, status)` rows for the run.
    async fn statuses(&self, run: &RunId) -> Result<Vec<(NodeId, NodeStatus)>, StoreError>;

    async fn put_result(
        &self,
        run: &RunId,
        node: &str,
        outcome: &NodeOutcome,
    ) -> Result<(), StoreError>;

    async fn result(&self, run: &RunId, node: &str) -> Result<Option<NodeOutcome>, StoreError>;

    async fn context_get(&self, run: &RunId, key: &str) -> Result<Option<Value>, StoreError>;

    /// Last-write-wins single-key merge.
    async fn context_set(&self, run: &RunId, key: &str, value: Value) -> Result<(), StoreError>;

    /// Returns true when the key existed.
    async fn context_delete(&self, run: &RunId, key: &str) -> Result<bool, StoreError>;

    async fn context_snapshot(&self, run: &RunId) -> Result<Map<String, Value>, StoreError>;

    /// Overwrite a node's pending-predecessor count (dynamic fan-in).
    async fn set_pending(&self, run: &RunId, node: &str, count: u32) -> Result<(), StoreError>;

    /// Atomically consume one predecessor signal for `node`.
    async fn decrement_pending(
        &self,
        run: &RunId,
        node: &str,
        satisfied: bool,
    ) -> Result<JoinProgress, StoreError>;

    /// Create or reset rows to `pending` with the given counts, clearing
    /// their join-satisfaction marks.
    async fn arm_nodes(&self, run: &RunId, nodes: &[(NodeId, u32)]) -> Result<(), StoreError>;

    /// Sticky: once set the run can only end `cancelled` (or `failed` when
    /// a fatal error raised the flag).
    async fn set_cancelled(&self, run: &RunId) -> Result<(), StoreError>;

    async fn is_cancelled(&self, run: &RunId) -> Result<bool, StoreError>;

    async fn put_final(&self, run: &RunId, final_status: RunFinal) -> Result<(), StoreError>;

    async fn get_final(&self, run: &RunId) -> Result<Option<RunFinal>, StoreError>;

    /// Drop the run's tables. Called by the coordinator after the terminal
    /// event is observed.
    async fn remove_run(&self, run: &RunId) -> Result<(), StoreError>;
}
