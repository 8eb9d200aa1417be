// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backoff-retry wrapper for transient store failures.
//!
//! Transient failures (network blips, leadership churn) are retried with
//! bounded exponential backoff; anything else bubbles unchanged. Persistent
//! transience is surfaced after the last attempt and treated as fatal by
//! the runtime.

use crate::store::{CoordinationStore, JoinProgress, RunSeed, StoreError};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::future::Future;
use std::time::Duration;
use weft_core::{NodeId, NodeOutcome, NodeStatus, RunFinal, RunId};

/// Store wrapper retrying [`StoreError::Transient`] with backoff.
pub struct Retrying<S> {
    inner: S,
    max_attempts: u32,
    base_delay: Duration,
}

impl<S> Retrying<S> {
    /// Wrap with the default policy: 3 attempts, 25ms doubling backoff.
    pub fn new(inner: S) -> Self {
        Self::with(inner, 3, Duration::from_millis(25))
    }

    pub fn with(inner: S, max_attempts: u32, base_delay: Duration) -> Self {
        Self { inner, max_attempts: max_attempts.max(1), base_delay }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn attempt<T, F, Fut>(&self, op: &'static str, mut f: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, StoreError>> + Send,
    {
        let mut delay = self.base_delay;
        let mut attempt = 1u32;
        loop {
            match f().await {
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    tracing::warn!(
                        op,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient store error, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

#[async_trait]
impl<S: CoordinationStore> CoordinationStore for Retrying<S> {
    async fn create_run(&self, run: &RunId, seed: RunSeed) -> Result<(), StoreError> {
        self.attempt("create_run", || self.inner.create_run(run, seed.clone())).await
    }

    async fn cas_status(
        &self,
        run: &RunId,
        node: &str,
        from: NodeStatus,
        to: NodeStatus,
    ) -> Result<bool, StoreError> {
        self.attempt("cas_status", || self.inner.cas_status(run, node, from, to)).await
    }

    async fn set_status(
        &self,
        run: &RunId,
        node: &str,
        to: NodeStatus,
    ) -> Result<(), StoreError> {
        self.attempt("set_status", || self.inner.set_status(run, node, to)).await
    }

    async fn status(&self, run: &RunId, node: &str) -> Result<Option<NodeStatus>, StoreError> {
        self.attempt("status", || self.inner.status(run, node)).await
    }

    async fn statuses(&self, run: &RunId) -> Result<Vec<(NodeId, NodeStatus)>, StoreError> {
        self.attempt("statuses", || self.inner.statuses(run)).await
    }

    async fn put_result(
        &self,
        run: &RunId,
        node: &str,
        outcome: &NodeOutcome,
    ) -> Result<(), StoreError> {
        self.attempt("put_result", || self.inner.put_result(run, node, outcome)).await
    }

    async fn result(&self, run: &RunId, node: &str) -> Result<Option<NodeOutcome>, StoreError> {
        self.attempt("result", || self.inner.result(run, node)).await
    }

    async fn context_get(&self, run: &RunId, key: &str) -> Result<Option<Value>, StoreError> {
        self.attempt("context_get", || self.inner.context_get(run, key)).await
    }

    async fn context_set(&self, run: &RunId, key: &str, value: Value) -> Result<(), StoreError> {
        self.attempt("context_set", || self.inner.context_set(run, key, value.clone())).await
    }

    async fn context_delete(&self, run: &RunId, key: &str) -> Result<bool, StoreError> {
        self.attempt("context_delete", || self.inner.context_delete(run, key)).await
    }

    async fn context_snapshot(&self, run: &RunId) -> Result<Map<String, Value>, StoreError> {
        self.attempt("context_snapshot", || self.inner.context_snapshot(run)).await
    }

    async fn set_pending(&self, run: &RunId, node: &str, count: u32) -> Result<(), StoreError> {
        self.attempt("set_pending", || self.inner.set_pending(run, node, count)).await
    }

    async fn decrement_pending(
        &self,
        run: &RunId,
        node: &str,
        satisfied: bool,
    ) -> Result<JoinProgress, StoreError> {
        // Not blindly retryable: a decrement that succeeded on the backend
        // but failed to report would double-consume a predecessor signal on
        // retry. Surface transience to the caller instead.
        self.inner.decrement_pending(run, node, satisfied).await
    }

    async fn arm_nodes(&self, run: &RunId, nodes: &[(NodeId, u32)]) -> Result<(), StoreError> {
        self.attempt("arm_nodes", || self.inner.arm_nodes(run, nodes)).await
    }

    async fn set_cancelled(&self, run: &RunId) -> Result<(), StoreError> {
        self.attempt("set_cancelled", || self.inner.set_cancelled(run)).await
    }

    async fn is_cancelled(&self, run: &RunId) -> Result<bool, StoreError> {
        self.attempt("is_cancelled", || self.inner.is_cancelled(run)).await
    }

    async fn put_final(&self, run: &RunId, final_status: RunFinal) -> Result<(), StoreError> {
        self.attempt("put_final", || self.inner.put_final(run, final_status.clone())).await
    }

    async fn get_final(&self, run: &RunId) -> Result<Option<RunFinal>, StoreError> {
        self.attempt("get_final", || self.inner.get_final(run)).await
    }

    async fn remove_run(&self, run: &RunId) -> Result<(), StoreError> {
        self.attempt("remove_run", || self.inner.remove_run(run)).await
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
