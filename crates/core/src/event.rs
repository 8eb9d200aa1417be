// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle events and the append-only sink contract.

use crate::blueprint::NodeId;
use crate::id::RunId;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smol_str::SmolStr;
use std::sync::Arc;

/// Events emitted in the order the scheduler observes transitions.
///
/// Serializes with `{"type": "node:start", ...fields}` format. The stream
/// is ordered but not a causal log; consumers needing causality should join
/// on node ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "workflow:start")]
    WorkflowStart { run_id: RunId, blueprint: String },

    #[serde(rename = "node:start")]
    NodeStart { run_id: RunId, node: NodeId },

    #[serde(rename = "node:retry")]
    NodeRetry {
        run_id: RunId,
        node: NodeId,
        /// The attempt that failed and is being retried.
        attempt: u32,
        error: String,
    },

    #[serde(rename = "node:finish")]
    NodeFinish {
        run_id: RunId,
        node: NodeId,
        action: SmolStr,
        output: Value,
    },

    #[serde(rename = "node:error")]
    NodeError {
        run_id: RunId,
        node: NodeId,
        error: String,
    },

    #[serde(rename = "context:change")]
    ContextChange {
        run_id: RunId,
        key: String,
        value: Value,
        /// Node whose execution wrote the key.
        node: NodeId,
    },

    #[serde(rename = "workflow:finish")]
    WorkflowFinish { run_id: RunId },

    #[serde(rename = "workflow:failed")]
    WorkflowFailed { run_id: RunId, reason: String },

    #[serde(rename = "workflow:cancelled")]
    WorkflowCancelled { run_id: RunId },
}

/// One appended event with its per-run sequence number and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub seq: u64,
    pub at_ms: u64,
    #[serde(flatten)]
    pub event: Event,
}

/// Append-only sink for lifecycle events.
///
/// Appends are best-effort observability: implementations log and swallow
/// their own IO failures rather than failing the run.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn append(&self, record: EventRecord);
}

/// Sink retaining every record in memory, for tests and run reports.
#[derive(Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<EventRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<EventRecord> {
        self.records.lock().clone()
    }

    pub fn events(&self) -> Vec<Event> {
        self.records.lock().iter().map(|r| r.event.clone()).collect()
    }
}

#[async_trait]
impl EventSink for MemorySink {
    async fn append(&self, record: EventRecord) {
        self.records.lock().push(record);
    }
}

/// Sink that drops everything.
#[derive(Clone, Default)]
pub struct NullSink;

#[async_trait]
impl EventSink for NullSink {
    async fn append(&self, _record: EventRecord) {}
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
