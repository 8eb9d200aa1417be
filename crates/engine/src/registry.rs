// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node implementation registry.
//!
//! Dynamic dispatch over node implementations is a flat table keyed by the
//! `uses` selector string, holding tagged variants — no inheritance
//! hierarchy. `builtin:` selectors never resolve here; the runtime handles
//! those itself.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use weft_core::{Context, NodeError, NodeId, NodeOutcome, NodeResult, RunId};

/// Everything one node invocation sees: its params from the blueprint, the
/// input selected by the traverser, the run-scoped context view, and the
/// run's abort signal.
#[derive(Clone)]
pub struct NodeCall {
    pub run_id: RunId,
    pub node: NodeId,
    pub params: Value,
    pub input: Value,
    pub ctx: Arc<dyn Context>,
    pub cancel: CancellationToken,
}

/// Single-invocation node implementation.
#[async_trait]
pub trait FunctionNode: Send + Sync {
    async fn call(&self, call: NodeCall) -> NodeResult;
}

/// Three-phase node implementation: `prep → exec → post`.
///
/// Only `exec` is retried. When every `exec` attempt fails with a
/// recoverable error, `fallback` runs with the last error and its output
/// feeds `post`; the default fallback re-raises.
#[async_trait]
pub trait LifecycleNode: Send + Sync {
    async fn prep(&self, call: NodeCall) -> Result<Value, NodeError> {
        Ok(call.input)
    }

    async fn exec(&self, call: NodeCall, prepared: Value) -> NodeResult;

    async fn post(&self, _call: NodeCall, result: NodeOutcome) -> NodeResult {
        Ok(result)
    }

    async fn fallback(&self, _call: NodeCall, error: NodeError) -> NodeResult {
        Err(error)
    }
}

/// Tagged implementation variants.
#[derive(Clone)]
pub enum NodeImpl {
    Function(Arc<dyn FunctionNode>),
    Lifecycle(Arc<dyn LifecycleNode>),
}

struct FnNode<F>(F);

#[async_trait]
impl<F, Fut> FunctionNode for FnNode<F>
where
    F: Fn(NodeCall) -> Fut + Send + Sync,
    Fut: Future<Output = NodeResult> + Send,
{
    async fn call(&self, call: NodeCall) -> NodeResult {
        (self.0)(call).await
    }
}

/// `uses` selector → implementation table.
#[derive(Clone, Default)]
pub struct Registry {
    impls: HashMap<String, NodeImpl>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an async closure as a function node.
    pub fn register_fn<F, Fut>(&mut self, uses: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(NodeCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = NodeResult> + Send + 'static,
    {
        self.impls
            .insert(uses.into(), NodeImpl::Function(Arc::new(FnNode(f))));
        self
    }

    pub fn register(&mut self, uses: impl Into<String>, node: Arc<dyn FunctionNode>) -> &mut Self {
        self.impls.insert(uses.into(), NodeImpl::Function(node));
        self
    }

    pub fn register_lifecycle(
        &mut self,
        uses: impl Into<String>,
        node: Arc<dyn LifecycleNode>,
    ) -> &mut Self {
        self.impls.insert(uses.into(), NodeImpl::Lifecycle(node));
        self
    }

    pub fn get(&self, uses: &str) -> Option<&NodeImpl> {
        self.impls.get(uses)
    }

    pub fn contains(&self, uses: &str) -> bool {
        self.impls.contains_key(uses)
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
