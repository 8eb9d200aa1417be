// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    subflow = { SUBFLOW },
    scatter = { SCATTER },
    gather = { GATHER },
    loop_controller = { LOOP },
    parallel = { PARALLEL },
)]
fn builtin_selectors_are_recognized(uses: &str) {
    assert!(is_builtin(uses));
}

#[test]
fn user_selectors_are_not_builtin() {
    assert!(!is_builtin("http.get"));
    assert!(!is_builtin(""));
}

#[test]
fn instance_ids_round_trip() {
    let id = instance_id("fan.worker", 3);
    assert_eq!(id, "fan.worker#3");
    assert_eq!(split_instance(&id), Some(("fan.worker", 3)));
}

#[test]
fn split_instance_rejects_plain_ids() {
    assert_eq!(split_instance("fan.worker"), None);
    assert_eq!(split_instance("fan#worker"), None);
}

#[test]
fn reserved_keys_are_scoped_by_node() {
    assert_eq!(fan_key("fan.gather"), "_fan:fan.gather");
    assert_eq!(loop_key("decide"), "_loop:decide");
}
