// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use weft_core::MemoryContext;

fn call(input: Value) -> NodeCall {
    NodeCall {
        run_id: RunId::from_string("run-reg"),
        node: "n".into(),
        params: Value::Null,
        input,
        ctx: Arc::new(MemoryContext::new()),
        cancel: CancellationToken::new(),
    }
}

#[tokio::test]
async fn registered_closure_is_callable() {
    let mut registry = Registry::new();
    registry.register_fn("double", |call: NodeCall| async move {
        let n = call.input.as_i64().unwrap_or(0);
        Ok(NodeOutcome::new(json!(n * 2)))
    });

    let Some(NodeImpl::Function(f)) = registry.get("double") else {
        panic!("expected a function impl");
    };
    let outcome = f.call(call(json!(21))).await.unwrap();
    assert_eq!(outcome.output, json!(42));
}

#[tokio::test]
async fn lookup_misses_return_none() {
    let registry = Registry::new();
    assert!(registry.get("ghost").is_none());
    assert!(!registry.contains("ghost"));
}

#[tokio::test]
async fn later_registration_wins() {
    let mut registry = Registry::new();
    registry.register_fn("x", |_| async { Ok(NodeOutcome::new(json!(1))) });
    registry.register_fn("x", |_| async { Ok(NodeOutcome::new(json!(2))) });
    let Some(NodeImpl::Function(f)) = registry.get("x") else {
        panic!("expected a function impl");
    };
    assert_eq!(f.call(call(Value::Null)).await.unwrap().output, json!(2));
}

struct Doubler;

#[async_trait]
impl LifecycleNode for Doubler {
    async fn exec(&self, _call: NodeCall, prepared: Value) -> NodeResult {
        let n = prepared.as_i64().unwrap_or(0);
        Ok(NodeOutcome::new(json!(n * 2)))
    }
}

#[tokio::test]
async fn lifecycle_defaults_pass_through() {
    let node = Doubler;
    // Default prep hands the input through.
    let prepared = node.prep(call(json!(5))).await.unwrap();
    assert_eq!(prepared, json!(5));
    let outcome = node.exec(call(Value::Null), prepared).await.unwrap();
    // Default post returns the exec outcome unchanged.
    let outcome = node.post(call(Value::Null), outcome).await.unwrap();
    assert_eq!(outcome.output, json!(10));
    // Default fallback re-raises.
    let err = node
        .fallback(call(Value::Null), NodeError::recoverable("boom"))
        .await
        .unwrap_err();
    assert_eq!(err, NodeError::recoverable("boom"));
}

#[tokio::test]
async fn lifecycle_registration_is_tagged() {
    let mut registry = Registry::new();
    registry.register_lifecycle("double", Arc::new(Doubler));
    assert!(matches!(registry.get("double"), Some(NodeImpl::Lifecycle(_))));
}
