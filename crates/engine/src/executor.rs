// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node execution with retry, fallback, timeout, and abort semantics.
//!
//! One attempt loop drives every executor variant: per-attempt timeout,
//! retry with delay on recoverable failure up to `max_retries`, fatal
//! short-circuit, and cancellation honored at entry, around every attempt,
//! and during retry sleeps. Lifecycle nodes add the `prep → exec → post`
//! phasing on top, with `fallback` invoked when every `exec` attempt
//! fails recoverably.
//!
//! The executor owns `node:retry` and `node:error` emission; the runtime
//! never emits those itself.

use crate::emit::Emitter;
use crate::registry::{NodeCall, NodeImpl};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::time::Duration;
use weft_core::{Clock, Event, Node, NodeError, NodeResult};

pub(crate) struct NodeExecutor<'e, C: Clock> {
    pub emitter: &'e Emitter<C>,
}

impl<C: Clock> NodeExecutor<'_, C> {
    /// Execute a registered implementation.
    pub(crate) async fn execute(&self, node: &Node, imp: NodeImpl, call: NodeCall) -> NodeResult {
        match imp {
            NodeImpl::Function(f) => {
                self.execute_with(node, call, move |c| {
                    let f = f.clone();
                    async move { f.call(c).await }.boxed()
                })
                .await
            }
            NodeImpl::Lifecycle(l) => self.execute_lifecycle(node, l, call).await,
        }
    }

    /// Run `f` through the attempt loop and record the terminal error, if
    /// any. Used for function nodes and for engine built-ins.
    pub(crate) async fn execute_with<F>(&self, node: &Node, call: NodeCall, f: F) -> NodeResult
    where
        F: Fn(NodeCall) -> BoxFuture<'static, NodeResult>,
    {
        let result = self.attempts(node, &call, &f).await;
        self.record_error(&call, result).await
    }

    async fn execute_lifecycle(
        &self,
        node: &Node,
        lifecycle: std::sync::Arc<dyn crate::registry::LifecycleNode>,
        call: NodeCall,
    ) -> NodeResult {
        if call.cancel.is_cancelled() {
            return self
                .record_error(&call, Err(NodeError::aborted("run cancelled")))
                .await;
        }

        // prep failures are not retried
        let prepared = match lifecycle.prep(call.clone()).await {
            Ok(prepared) => prepared,
            Err(err) => return self.record_error(&call, Err(err)).await,
        };

        let exec = {
            let lifecycle = lifecycle.clone();
            move |c: NodeCall| {
                let lifecycle = lifecycle.clone();
                let prepared = prepared.clone();
                async move { lifecycle.exec(c, prepared).await }.boxed()
            }
        };
        let outcome = match self.attempts(node, &call, &exec).await {
            Ok(outcome) => outcome,
            Err(err) if err.is_retryable() => {
                // exec exhausted its attempts: record it, then let fallback
                // decide. The default fallback re-raises.
                self.emit_error(&call, &err).await;
                match lifecycle.fallback(call.clone(), err).await {
                    Ok(outcome) => outcome,
                    Err(err) => return Err(err),
                }
            }
            Err(err) => return self.record_error(&call, Err(err)).await,
        };

        // post failures are not retried either
        let result = lifecycle.post(call.clone(), outcome).await;
        self.record_error(&call, result).await
    }

    /// The shared attempt loop.
    async fn attempts<F>(&self, node: &Node, call: &NodeCall, f: &F) -> NodeResult
    where
        F: Fn(NodeCall) -> BoxFuture<'static, NodeResult>,
    {
        let config = &node.config;
        let mut attempt = 1u32;
        loop {
            if call.cancel.is_cancelled() {
                return Err(NodeError::aborted("run cancelled"));
            }
            let result = self.one_attempt(f(call.clone()), config.timeout_ms, call).await;
            match result {
                Err(err) if err.is_retryable() && attempt <= config.max_retries => {
                    tracing::debug!(
                        run = %call.run_id,
                        node = %call.node,
                        attempt,
                        error = %err,
                        "attempt failed, retrying"
                    );
                    self.emitter
                        .emit(Event::NodeRetry {
                            run_id: call.run_id.clone(),
                            node: call.node.clone(),
                            attempt,
                            error: err.to_string(),
                        })
                        .await;
                    if config.retry_delay_ms > 0 {
                        let delay = Duration::from_millis(config.retry_delay_ms);
                        tokio::select! {
                            _ = call.cancel.cancelled() => {
                                return Err(NodeError::aborted("run cancelled"));
                            }
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn one_attempt(
        &self,
        fut: BoxFuture<'static, NodeResult>,
        timeout_ms: Option<u64>,
        call: &NodeCall,
    ) -> NodeResult {
        match timeout_ms {
            Some(ms) => {
                tokio::select! {
                    _ = call.cancel.cancelled() => Err(NodeError::aborted("run cancelled")),
                    result = tokio::time::timeout(Duration::from_millis(ms), fut) => {
                        result.unwrap_or_else(|_| {
                            Err(NodeError::recoverable(format!("attempt timed out after {ms}ms")))
                        })
                    }
                }
            }
            None => {
                tokio::select! {
                    _ = call.cancel.cancelled() => Err(NodeError::aborted("run cancelled")),
                    result = fut => result,
                }
            }
        }
    }

    async fn record_error(&self, call: &NodeCall, result: NodeResult) -> NodeResult {
        if let Err(err) = &result {
            self.emit_error(call, err).await;
        }
        result
    }

    async fn emit_error(&self, call: &NodeCall, err: &NodeError) {
        self.emitter
            .emit(Event::NodeError {
                run_id: call.run_id.clone(),
                node: call.node.clone(),
                error: err.to_string(),
            })
            .await;
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
