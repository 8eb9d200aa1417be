// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;
use serde_json::json;
use yare::parameterized;

fn scope() -> Value {
    json!({
        "flag": true,
        "count": 3,
        "name": "weft",
        "empty": "",
        "zero": 0,
        "nothing": null,
        "user": { "role": "admin", "tags": ["a", "b"] },
        "loop_count": 1,
    })
}

#[parameterized(
    ident = { "flag" },
    nested = { "user.role" },
    array_index = { "user.tags.1" },
    underscored = { "loop_count" },
)]
fn accepts_legal_paths(path: &str) {
    assert!(is_path(path));
    assert!(resolve_path(&scope(), path).is_some());
}

#[parameterized(
    empty = { "" },
    space = { "user role" },
    operator = { "count+1" },
    call = { "f(x)" },
    leading_dot = { ".user" },
    double_dot = { "user..role" },
    trailing_dot = { "user." },
    quote = { "'x'" },
)]
fn rejects_illegal_paths(path: &str) {
    assert!(!is_path(path));
    assert_eq!(resolve_path(&scope(), path), None);
}

#[test]
fn resolves_values_and_absence() {
    let scope = scope();
    assert_eq!(resolve_path(&scope, "count"), Some(&json!(3)));
    assert_eq!(resolve_path(&scope, "user.role"), Some(&json!("admin")));
    assert_eq!(resolve_path(&scope, "user.tags.0"), Some(&json!("a")));
    assert_eq!(resolve_path(&scope, "user.missing"), None);
    assert_eq!(resolve_path(&scope, "user.tags.9"), None);
    // Hopping through a scalar fails rather than erroring.
    assert_eq!(resolve_path(&scope, "count.deeper"), None);
}

#[parameterized(
    absent = { "missing", false },
    null = { "nothing", false },
    false_flag = { "zero", false },
    empty_string = { "empty", false },
    truthy_bool = { "flag", true },
    truthy_number = { "count", true },
    truthy_string = { "name", true },
    truthy_object = { "user", true },
)]
fn path_condition_truthiness(expr: &str, expected: bool) {
    assert_eq!(path_condition(expr, &scope()), expected);
}

#[parameterized(
    lt_true = { "loop_count < 2", true },
    lt_false = { "count < 2", false },
    le = { "count <= 3", true },
    gt = { "count > 2", true },
    ge_false = { "loop_count >= 2", false },
    eq_number = { "count == 3", true },
    ne_number = { "count != 3", false },
    eq_string = { "user.role == 'admin'", true },
    string_order = { "name < 'zzz'", true },
    and_short = { "flag && count > 1", true },
    or_short = { "zero > 1 || flag", true },
    not = { "!flag", false },
    parens = { "(count > 1) && (loop_count < 2)", true },
    bool_literal = { "true", true },
    bare_path = { "flag", true },
)]
fn predicates_evaluate(expr: &str, expected: bool) {
    let value = eval_predicate(expr, &scope());
    assert_eq!(truthy(value.as_ref()), expected, "{expr}");
}

#[parameterized(
    unterminated_string = { "name == 'abc" },
    stray_equals = { "count = 3" },
    stray_amp = { "flag & flag" },
    trailing_op = { "count <" },
    unbalanced = { "(flag" },
    garbage = { "@#!$" },
    empty = { "" },
    type_mismatch = { "user < 3" },
    absent_operand = { "missing < 3" },
)]
fn predicate_failures_yield_absent(expr: &str) {
    assert_eq!(eval_predicate(expr, &scope()), None);
    // And absent is falsy, so nothing downstream throws.
    assert!(!truthy(eval_predicate(expr, &scope()).as_ref()));
}

#[test]
fn loop_condition_uses_predicate_only_when_permitted() {
    let scope = scope();
    assert!(loop_condition("loop_count < 2", &scope, true));
    // Path mode: the whole expression is an illegal path, hence falsy.
    assert!(!loop_condition("loop_count < 2", &scope, false));
    // Plain paths work in either mode.
    assert!(loop_condition("flag", &scope, false));
}

proptest! {
    /// The evaluator never panics, whatever the input.
    #[test]
    fn predicate_evaluation_is_total(expr in ".{0,64}") {
        let _ = eval_predicate(&expr, &scope());
    }

    /// Path resolution never panics and respects the charset gate.
    #[test]
    fn path_resolution_is_total(path in ".{0,64}") {
        let scope = scope();
        let resolved = resolve_path(&scope, &path);
        if resolved.is_some() {
            prop_assert!(is_path(&path));
        }
    }

    /// Numeric comparisons agree with f64 ordering.
    #[test]
    fn numeric_comparison_matches_f64(a in -1000i64..1000, b in -1000i64..1000) {
        let bindings = json!({ "a": a, "b": b });
        let lt = eval_predicate("a < b", &bindings);
        prop_assert_eq!(lt, Some(Value::Bool((a as f64) < (b as f64))));
    }
}
