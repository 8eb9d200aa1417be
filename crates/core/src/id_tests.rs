// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashMap;

#[test]
fn new_ids_carry_prefix_and_are_unique() {
    let a = RunId::new();
    let b = RunId::new();
    assert!(a.as_str().starts_with(RunId::PREFIX));
    assert_eq!(a.as_str().len(), RunId::PREFIX.len() + 19);
    assert_ne!(a, b);
}

#[test]
fn suffix_strips_prefix() {
    let id = RunId::from_string("run-abc123");
    assert_eq!(id.suffix(), "abc123");
}

#[test]
fn suffix_of_unprefixed_id_is_identity() {
    let id = RunId::from_string("legacy");
    assert_eq!(id.suffix(), "legacy");
}

#[test]
fn short_truncates_suffix() {
    let id = RunId::from_string("run-abcdefgh");
    assert_eq!(id.short(4), "abcd");
    assert_eq!(id.short(100), "abcdefgh");
}

#[test]
fn compares_with_str() {
    let id = RunId::from_string("run-x");
    assert_eq!(id, "run-x");
    assert_eq!(id.as_str(), "run-x");
}

#[test]
fn borrows_as_str_for_map_lookup() {
    let mut map: HashMap<RunId, u32> = HashMap::new();
    map.insert(RunId::from_string("run-a"), 1);
    assert_eq!(map.get("run-a"), Some(&1));
}

#[test]
fn serializes_transparently() {
    let id = RunId::from_string("run-a");
    assert_eq!(serde_json::to_string(&id).unwrap(), "\"run-a\"");
    let back: RunId = serde_json::from_str("\"run-a\"").unwrap();
    assert_eq!(back, id);
}
