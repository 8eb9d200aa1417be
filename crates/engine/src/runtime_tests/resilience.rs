// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry, fallback, timeout, and fatal-error containment.

use super::*;
use crate::registry::LifecycleNode;
use weft_core::{NodeConfig, NodeError, NodeResult};

fn flaky_registry(fail_first: u32) -> (Registry, Arc<std::sync::atomic::AtomicU32>) {
    let attempts = counter();
    let mut registry = Registry::new();
    {
        let attempts = attempts.clone();
        registry.register_fn("flaky", move |_| {
            let attempts = attempts.clone();
            async move {
                let attempt =
                    attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
                if attempt <= fail_first {
                    Err(NodeError::recoverable(format!("attempt {attempt} failed")))
                } else {
                    Ok(NodeOutcome::new(json!({ "attempt": attempt })))
                }
            }
        });
    }
    (registry, attempts)
}

#[tokio::test(start_paused = true)]
async fn retry_until_success_produces_start_retry_retry_finish() {
    let (registry, attempts) = flaky_registry(2);
    let blueprint = FlowBuilder::new("retrying")
        .node_full(
            "work",
            "flaky",
            Value::Null,
            NodeConfig::default().max_retries(2).retry_delay_ms(10),
        )
        .build()
        .unwrap();

    let rig = rig(registry, vec![blueprint]);
    let report = rig
        .runtime
        .run("retrying", Map::new(), RunOptions::default())
        .await
        .unwrap();

    assert_completed(&report);
    assert_eq!(count_of(&attempts), 3);
    assert_eq!(
        node_event_kinds(&report, "work"),
        vec!["node:start", "node:retry", "node:retry", "node:finish"]
    );
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_fail_the_node_and_skip_downstream() {
    let (registry, attempts) = flaky_registry(10);
    let mut registry = registry;
    registry.register_fn("after", |_| async { Ok(NodeOutcome::empty()) });
    let blueprint = FlowBuilder::new("exhausted")
        .node_full(
            "work",
            "flaky",
            Value::Null,
            NodeConfig::default().max_retries(1),
        )
        .node("after", "after")
        .edge("work", "after")
        .build()
        .unwrap();

    let rig = rig(registry, vec![blueprint]);
    let report = rig
        .runtime
        .run("exhausted", Map::new(), RunOptions::default())
        .await
        .unwrap();

    // Non-fatal failure: the run completes with per-node outcomes.
    assert_completed(&report);
    assert_eq!(count_of(&attempts), 2);
    assert_eq!(report.node_status("work"), Some(NodeStatus::Failed));
    assert_eq!(report.node_status("after"), Some(NodeStatus::Skipped));
    assert_eq!(
        node_event_kinds(&report, "work"),
        vec!["node:start", "node:retry", "node:error"]
    );
}

#[tokio::test(start_paused = true)]
async fn failed_node_routes_its_fallback_edge() {
    let (registry, _) = flaky_registry(10);
    let mut registry = registry;
    let recovered = counter();
    {
        let recovered = recovered.clone();
        registry.register_fn("recover", move |_| {
            let recovered = recovered.clone();
            async move {
                recovered.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(NodeOutcome::empty())
            }
        });
    }
    registry.register_fn("happy", |_| async { Ok(NodeOutcome::empty()) });

    let blueprint = FlowBuilder::new("fallback-route")
        .node("work", "flaky")
        .node("happy", "happy")
        .node("recover", "recover")
        .edge("work", "happy")
        .edge_on("work", "recover", weft_core::FALLBACK_ACTION)
        .build()
        .unwrap();

    let rig = rig(registry, vec![blueprint]);
    let report = rig
        .runtime
        .run("fallback-route", Map::new(), RunOptions::default())
        .await
        .unwrap();

    assert_completed(&report);
    assert_eq!(count_of(&recovered), 1);
    assert_eq!(report.node_status("happy"), Some(NodeStatus::Skipped));
    assert_eq!(report.node_status("recover"), Some(NodeStatus::Succeeded));
}

struct FallbackNode;

#[async_trait::async_trait]
impl LifecycleNode for FallbackNode {
    async fn exec(&self, _call: NodeCall, _prepared: Value) -> NodeResult {
        Err(NodeError::recoverable("exec always fails"))
    }

    async fn fallback(&self, _call: NodeCall, error: NodeError) -> NodeResult {
        Ok(NodeOutcome::new(json!({ "fallback": error.to_string() })))
    }
}

#[tokio::test(start_paused = true)]
async fn lifecycle_fallback_produces_start_retry_error_finish() {
    let mut registry = Registry::new();
    registry.register_lifecycle("guarded", Arc::new(FallbackNode));
    let blueprint = FlowBuilder::new("lifecycle-fallback")
        .node_full(
            "work",
            "guarded",
            Value::Null,
            NodeConfig::default().max_retries(1),
        )
        .build()
        .unwrap();

    let rig = rig(registry, vec![blueprint]);
    let report = rig
        .runtime
        .run("lifecycle-fallback", Map::new(), RunOptions::default())
        .await
        .unwrap();

    assert_completed(&report);
    assert_eq!(report.node_status("work"), Some(NodeStatus::Succeeded));
    assert_eq!(
        node_event_kinds(&report, "work"),
        vec!["node:start", "node:retry", "node:error", "node:finish"]
    );
    // The finish carries the fallback output.
    let finish_output = report
        .event_stream()
        .find_map(|e| match e {
            Event::NodeFinish { node, output, .. } if node == "work" => Some(output.clone()),
            _ => None,
        })
        .unwrap_or_default();
    assert_eq!(finish_output["fallback"], "exec always fails");
}

#[tokio::test(start_paused = true)]
async fn fatal_errors_cancel_the_rest_of_the_run() {
    let mut registry = echo_registry(&["first", "last"]);
    registry.register_fn("explode", |_| async {
        Err(NodeError::fatal("data corruption"))
    });

    let blueprint = FlowBuilder::new("fatal")
        .node("a", "first")
        .node("b", "explode")
        .node("c", "last")
        .edge("a", "b")
        .edge("b", "c")
        .build()
        .unwrap();

    let rig = rig(registry, vec![blueprint]);
    let report = rig
        .runtime
        .run("fatal", Map::new(), RunOptions::default())
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.reason.as_deref(), Some("data corruption"));
    assert_eq!(report.node_status("b"), Some(NodeStatus::Failed));
    // Downstream work was never dispatched.
    assert_eq!(report.node_status("c"), Some(NodeStatus::Pending));
    assert_eq!(event_kinds(&report).last(), Some(&"workflow:failed"));
}

#[tokio::test(start_paused = true)]
async fn fatal_on_error_promotes_recoverable_failures() {
    let (registry, attempts) = flaky_registry(10);
    let blueprint = FlowBuilder::new("promoted")
        .node_full(
            "work",
            "flaky",
            Value::Null,
            NodeConfig::default().max_retries(1).fatal_on_error(true),
        )
        .build()
        .unwrap();

    let rig = rig(registry, vec![blueprint]);
    let report = rig
        .runtime
        .run("promoted", Map::new(), RunOptions::default())
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(count_of(&attempts), 2);
}

#[tokio::test(start_paused = true)]
async fn per_node_timeout_participates_in_retry() {
    let attempts = counter();
    let mut registry = Registry::new();
    {
        let attempts = attempts.clone();
        registry.register_fn("slow", move |_| {
            let attempts = attempts.clone();
            async move {
                attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_secs(60)).await;
                Ok(NodeOutcome::empty())
            }
        });
    }

    let blueprint = FlowBuilder::new("timeouts")
        .node_full(
            "work",
            "slow",
            Value::Null,
            NodeConfig::default().max_retries(1).timeout_ms(20u64),
        )
        .build()
        .unwrap();

    let rig = rig(registry, vec![blueprint]);
    let report = rig
        .runtime
        .run("timeouts", Map::new(), RunOptions::default())
        .await
        .unwrap();

    // Both attempts timed out; the node failed, the run completed.
    assert_completed(&report);
    assert_eq!(count_of(&attempts), 2);
    assert_eq!(report.node_status("work"), Some(NodeStatus::Failed));
    assert_eq!(
        node_event_kinds(&report, "work"),
        vec!["node:start", "node:retry", "node:error"]
    );
}
