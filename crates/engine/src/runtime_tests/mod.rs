// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end runtime scenarios, both operating modes.

mod batch;
mod cancel;
mod distributed;
mod joins;
mod linear;
mod loops;
mod resilience;
mod routing;
mod subflow;
mod validation;

use crate::registry::{NodeCall, Registry};
use crate::runtime::{RunOptions, RunReport, Runtime};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use weft_core::{
    Blueprint, Event, FakeClock, FlowBuilder, MemorySink, NodeOutcome, NodeStatus, RunStatus,
};
use weft_store::MemoryStore;

pub(crate) struct Rig {
    pub store: MemoryStore,
    pub sink: MemorySink,
    pub runtime: Arc<Runtime<FakeClock>>,
}

pub(crate) fn rig(registry: Registry, blueprints: Vec<Blueprint>) -> Rig {
    let store = MemoryStore::new();
    let sink = MemorySink::new();
    let mut runtime = Runtime::new(Arc::new(store.clone()), registry)
        .sink(Arc::new(sink.clone()))
        .clock(FakeClock::new());
    for blueprint in blueprints {
        runtime = runtime.blueprint(blueprint).unwrap();
    }
    Rig { store, sink, runtime: Arc::new(runtime) }
}

/// Registry where every listed `uses` simply succeeds, echoing its input.
pub(crate) fn echo_registry(uses: &[&str]) -> Registry {
    let mut registry = Registry::new();
    for name in uses {
        registry.register_fn(*name, |call: NodeCall| async move {
            Ok(NodeOutcome::new(call.input))
        });
    }
    registry
}

/// Shorthand for a counter a node closure can bump.
pub(crate) fn counter() -> Arc<AtomicU32> {
    Arc::new(AtomicU32::new(0))
}

pub(crate) fn count_of(counter: &Arc<AtomicU32>) -> u32 {
    counter.load(Ordering::SeqCst)
}

/// The event tag names of a report's stream, in order.
pub(crate) fn event_kinds(report: &RunReport) -> Vec<&'static str> {
    report.event_stream().map(kind).collect()
}

/// Tag names of the events touching one node, in order.
pub(crate) fn node_event_kinds(report: &RunReport, node: &str) -> Vec<&'static str> {
    report
        .event_stream()
        .filter(|event| event_node(event).is_some_and(|n| n == node))
        .map(kind)
        .collect()
}

pub(crate) fn kind(event: &Event) -> &'static str {
    match event {
        Event::WorkflowStart { .. } => "workflow:start",
        Event::NodeStart { .. } => "node:start",
        Event::NodeRetry { .. } => "node:retry",
        Event::NodeFinish { .. } => "node:finish",
        Event::NodeError { .. } => "node:error",
        Event::ContextChange { .. } => "context:change",
        Event::WorkflowFinish { .. } => "workflow:finish",
        Event::WorkflowFailed { .. } => "workflow:failed",
        Event::WorkflowCancelled { .. } => "workflow:cancelled",
    }
}

fn event_node(event: &Event) -> Option<&str> {
    match event {
        Event::NodeStart { node, .. }
        | Event::NodeRetry { node, .. }
        | Event::NodeFinish { node, .. }
        | Event::NodeError { node, .. }
        | Event::ContextChange { node, .. } => Some(node),
        _ => None,
    }
}

pub(crate) fn assert_completed(report: &RunReport) {
    assert_eq!(
        report.status,
        RunStatus::Completed,
        "run should complete, got {:?}: {:?}",
        report.status,
        report.reason
    );
}
