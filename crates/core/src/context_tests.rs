// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[tokio::test]
async fn set_get_round_trip() {
    let ctx = MemoryContext::new();
    ctx.set("x", json!(1)).await.unwrap();
    assert_eq!(ctx.get("x").await.unwrap(), Some(json!(1)));
    assert_eq!(ctx.get("missing").await.unwrap(), None);
}

#[tokio::test]
async fn set_is_last_write_wins() {
    let ctx = MemoryContext::new();
    ctx.set("x", json!(1)).await.unwrap();
    ctx.set("x", json!({"nested": true})).await.unwrap();
    assert_eq!(ctx.get("x").await.unwrap(), Some(json!({"nested": true})));
}

#[tokio::test]
async fn has_and_delete() {
    let ctx = MemoryContext::new();
    ctx.set("x", json!(null)).await.unwrap();
    // Null values still count as present.
    assert!(ctx.has("x").await.unwrap());
    assert!(ctx.delete("x").await.unwrap());
    assert!(!ctx.has("x").await.unwrap());
    assert!(!ctx.delete("x").await.unwrap());
}

#[tokio::test]
async fn snapshot_is_point_in_time() {
    let ctx = MemoryContext::new();
    ctx.set("x", json!(1)).await.unwrap();
    let snap = ctx.snapshot().await.unwrap();
    ctx.set("x", json!(2)).await.unwrap();
    assert_eq!(snap.get("x"), Some(&json!(1)));
}

#[tokio::test]
async fn seeded_context_exposes_initial_entries() {
    let mut seed = serde_json::Map::new();
    seed.insert("k".into(), json!("v"));
    let ctx = MemoryContext::seeded(seed);
    assert_eq!(ctx.get("k").await.unwrap(), Some(json!("v")));
}

#[tokio::test]
async fn clones_share_entries() {
    let a = MemoryContext::new();
    let b = a.clone();
    a.set("x", json!(1)).await.unwrap();
    assert_eq!(b.get("x").await.unwrap(), Some(json!(1)));
}
