// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::memory::MemoryStore;
use crate::store::RunSeed;
use serde_json::json;
use weft_core::Context;

async fn store_context() -> (MemoryStore, StoreContext) {
    let store = MemoryStore::new();
    let run = RunId::from_string("run-ctx");
    store.create_run(&run, RunSeed::default()).await.unwrap();
    let ctx = StoreContext::new(Arc::new(store.clone()), run);
    (store, ctx)
}

#[tokio::test]
async fn round_trips_through_the_store() {
    let (store, ctx) = store_context().await;
    ctx.set("x", json!({"deep": [1, 2]})).await.unwrap();
    assert_eq!(ctx.get("x").await.unwrap(), Some(json!({"deep": [1, 2]})));
    // Visible to direct store reads under the same run id.
    assert_eq!(
        store.context_get(ctx.run_id(), "x").await.unwrap(),
        Some(json!({"deep": [1, 2]}))
    );
}

#[tokio::test]
async fn has_delete_snapshot() {
    let (_store, ctx) = store_context().await;
    ctx.set("a", json!(1)).await.unwrap();
    ctx.set("b", json!(2)).await.unwrap();
    assert!(ctx.has("a").await.unwrap());
    assert!(ctx.delete("a").await.unwrap());
    assert!(!ctx.has("a").await.unwrap());
    let snap = ctx.snapshot().await.unwrap();
    assert_eq!(snap.len(), 1);
    assert_eq!(snap.get("b"), Some(&json!(2)));
}

#[tokio::test]
async fn store_errors_surface_as_context_errors() {
    let store = MemoryStore::new();
    let ctx = StoreContext::new(Arc::new(store), RunId::from_string("run-missing"));
    let err = ctx.get("x").await.unwrap_err();
    assert!(err.to_string().contains("run not found"));
}
