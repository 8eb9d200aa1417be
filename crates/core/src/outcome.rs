// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node results and the execution error taxonomy.

use crate::blueprint::DEFAULT_ACTION;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smol_str::SmolStr;
use thiserror::Error;

/// Result of a successful node execution.
///
/// `output` flows to successors as their input (subject to edge
/// transforms); `action` selects which outgoing edges are eligible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeOutcome {
    #[serde(default)]
    pub output: Value,
    #[serde(default = "default_action")]
    pub action: SmolStr,
}

fn default_action() -> SmolStr {
    SmolStr::new_static(DEFAULT_ACTION)
}

impl NodeOutcome {
    /// Output with the default action.
    pub fn new(output: Value) -> Self {
        Self { output, action: default_action() }
    }

    /// Null output with the default action.
    pub fn empty() -> Self {
        Self::new(Value::Null)
    }

    /// Output routed through a named action.
    pub fn with_action(output: Value, action: impl Into<SmolStr>) -> Self {
        Self { output, action: action.into() }
    }

    pub fn is_default_action(&self) -> bool {
        self.action == DEFAULT_ACTION
    }
}

impl Default for NodeOutcome {
    fn default() -> Self {
        Self::empty()
    }
}

/// Failure modes of a single node execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeError {
    /// Retried per the node's config; final failure marks the node failed
    /// and lets join logic route `fallback` edges or skip the subtree.
    #[error("{0}")]
    Recoverable(String),

    /// Skips retries and cancels the whole run.
    #[error("fatal: {0}")]
    Fatal(String),

    /// Execution observed the run's cancellation (or a shutdown signal).
    #[error("aborted: {0}")]
    Aborted(String),
}

impl NodeError {
    pub fn recoverable(msg: impl Into<String>) -> Self {
        Self::Recoverable(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }

    pub fn aborted(msg: impl Into<String>) -> Self {
        Self::Aborted(msg.into())
    }

    /// Only recoverable failures participate in retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Recoverable(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted(_))
    }
}

/// Uniform return type of every executor variant.
pub type NodeResult = Result<NodeOutcome, NodeError>;

#[cfg(test)]
#[path = "outcome_tests.rs"]
mod tests;
