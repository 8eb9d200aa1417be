// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node and run status state machines.

use serde::{Deserialize, Serialize};

/// Per-node execution status, owned by the coordination store.
///
/// Transitions: `Pending → Running → (Succeeded | Failed)`, or
/// `Pending → Skipped` when the node's subtree is never taken. The
/// pending→running transition is a compare-and-swap in the store and is the
/// basis for at-most-one execution per (run, node) across workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl NodeStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, NodeStatus::Pending | NodeStatus::Running)
    }
}

crate::simple_display! {
    NodeStatus {
        Pending => "pending",
        Running => "running",
        Succeeded => "succeeded",
        Failed => "failed",
        Skipped => "skipped",
    }
}

/// Terminal disposition of a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

crate::simple_display! {
    RunStatus {
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

/// Final status record published through the coordination store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFinal {
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl RunFinal {
    pub fn completed() -> Self {
        Self { status: RunStatus::Completed, reason: None }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self { status: RunStatus::Failed, reason: Some(reason.into()) }
    }

    pub fn cancelled() -> Self {
        Self { status: RunStatus::Cancelled, reason: None }
    }

    pub fn cancelled_because(reason: impl Into<String>) -> Self {
        Self { status: RunStatus::Cancelled, reason: Some(reason.into()) }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
