// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn new_outcome_uses_default_action() {
    let outcome = NodeOutcome::new(json!({"x": 1}));
    assert!(outcome.is_default_action());
    assert_eq!(outcome.action, DEFAULT_ACTION);
}

#[test]
fn with_action_routes() {
    let outcome = NodeOutcome::with_action(json!(null), "left");
    assert!(!outcome.is_default_action());
    assert_eq!(outcome.action, "left");
}

#[test]
fn deserialize_fills_action_default() {
    let outcome: NodeOutcome = serde_json::from_str(r#"{"output": 42}"#).unwrap();
    assert_eq!(outcome.output, json!(42));
    assert!(outcome.is_default_action());
}

#[test]
fn only_recoverable_errors_retry() {
    assert!(NodeError::recoverable("boom").is_retryable());
    assert!(!NodeError::fatal("boom").is_retryable());
    assert!(!NodeError::aborted("cancelled").is_retryable());
}

#[test]
fn error_display_marks_kind() {
    assert_eq!(NodeError::recoverable("boom").to_string(), "boom");
    assert_eq!(NodeError::fatal("boom").to_string(), "fatal: boom");
    assert_eq!(NodeError::aborted("stop").to_string(), "aborted: stop");
}
