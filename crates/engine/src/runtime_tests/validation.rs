// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run-start validation, cycle policy, and deadlock reporting.

use super::*;
use crate::error::EngineError;
use weft_core::RunId;

#[tokio::test]
async fn unknown_blueprint_is_rejected() {
    let rig = rig(Registry::new(), vec![]);
    let err = rig
        .runtime
        .run("ghost", Map::new(), RunOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownBlueprint(id) if id == "ghost"));
}

#[tokio::test]
async fn unknown_uses_fails_before_any_run_state_exists() {
    let blueprint = FlowBuilder::new("bad")
        .node("a", "not.registered")
        .build()
        .unwrap();
    let rig = rig(Registry::new(), vec![blueprint]);

    let err = rig
        .runtime
        .run("bad", Map::new(), RunOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::UnknownUses { uses, .. } if uses == "not.registered"));
    // Fatal at start: no run was created, nothing was emitted.
    assert_eq!(rig.store.run_count(), 0);
    assert!(rig.sink.events().is_empty());
}

#[tokio::test]
async fn strict_mode_rejects_unguarded_cycles() {
    let blueprint = FlowBuilder::new("cyclic")
        .node("a", "echo")
        .node("b", "echo")
        .edge("a", "b")
        .edge("b", "a")
        .build()
        .unwrap();
    let rig = rig(echo_registry(&["echo"]), vec![blueprint]);

    let err = rig
        .runtime
        .run("cyclic", Map::new(), RunOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::CyclicBlueprint { .. }));
    assert_eq!(rig.store.run_count(), 0);
}

#[tokio::test]
async fn loose_mode_runs_cyclic_blueprints_into_a_deadlock_report() {
    // a feeds the cycle, but b's second predecessor (c) can only be
    // signaled from inside the cycle: the run must report the stuck pair.
    let blueprint = FlowBuilder::new("cyclic")
        .node("a", "echo")
        .node("b", "echo")
        .node("c", "echo")
        .edge("a", "b")
        .edge("b", "c")
        .edge("c", "b")
        .build()
        .unwrap();
    let rig = rig(echo_registry(&["echo"]), vec![blueprint]);

    let report = rig
        .runtime
        .run(
            "cyclic",
            Map::new(),
            RunOptions::default().strict_cycles(false),
        )
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Failed);
    let reason = report.reason.clone().unwrap_or_default();
    assert!(reason.contains("deadlock"), "unexpected reason: {reason}");
    assert!(reason.contains('b') && reason.contains('c'));
    assert_eq!(event_kinds(&report).last(), Some(&"workflow:failed"));
}

#[tokio::test]
async fn scatter_params_are_validated() {
    let blueprint = FlowBuilder::new("bad-batch")
        .node_params(
            "fan",
            weft_core::builtin::SCATTER,
            json!({ "from": "items", "worker": "ghost" }),
        )
        .build()
        .unwrap();
    let rig = rig(Registry::new(), vec![blueprint]);

    let err = rig
        .runtime
        .run("bad-batch", Map::new(), RunOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidParams { .. }));
}

#[tokio::test]
async fn subflow_must_reference_a_known_blueprint() {
    let blueprint = FlowBuilder::new("orphan")
        .subflow("child", "missing-child", &[], &[])
        .build()
        .unwrap();
    let rig = rig(Registry::new(), vec![blueprint]);

    let err = rig
        .runtime
        .run("orphan", Map::new(), RunOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownBlueprint(id) if id == "missing-child"));
}

#[tokio::test]
async fn pinned_run_ids_cannot_be_reused() {
    let blueprint = FlowBuilder::new("once")
        .node("a", "echo")
        .build()
        .unwrap();
    let rig = rig(echo_registry(&["echo"]), vec![blueprint]);
    let opts = || RunOptions::default().run_id(RunId::from_string("run-pinned"));

    rig.runtime.run("once", Map::new(), opts()).await.unwrap();
    // The first run was collected, so the id is free again...
    rig.runtime.run("once", Map::new(), opts()).await.unwrap();

    // ...but two concurrent submissions with one id collide.
    let queue: Arc<dyn weft_queue::QueueAdapter> =
        Arc::new(weft_queue::InProcessQueue::new());
    rig.runtime
        .submit("once", Map::new(), opts(), &queue)
        .await
        .unwrap();
    let err = rig
        .runtime
        .submit("once", Map::new(), opts(), &queue)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Store(weft_store::StoreError::RunExists(_))
    ));
}
