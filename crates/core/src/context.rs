// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Keyed run state mutated by nodes.
//!
//! Every operation is async so one contract covers both the in-memory
//! variant and the coordination-store-backed variant. `set` is a
//! last-write-wins merge of the single key; there are no multi-key
//! transactional semantics. Callers must not cache snapshots across awaits.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by a context backend.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("context backend error: {0}")]
    Backend(String),
}

/// Keyed store of JSON-compatible values scoped to one run.
#[async_trait]
pub trait Context: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, ContextError>;

    async fn set(&self, key: &str, value: Value) -> Result<(), ContextError>;

    async fn has(&self, key: &str) -> Result<bool, ContextError> {
        Ok(self.get(key).await?.is_some())
    }

    /// Returns true when the key existed.
    async fn delete(&self, key: &str) -> Result<bool, ContextError>;

    /// Point-in-time copy of the whole mapping.
    async fn snapshot(&self) -> Result<Map<String, Value>, ContextError>;
}

/// In-memory context; every operation resolves immediately.
#[derive(Clone, Default)]
pub struct MemoryContext {
    entries: Arc<Mutex<Map<String, Value>>>,
}

impl MemoryContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(entries: Map<String, Value>) -> Self {
        Self { entries: Arc::new(Mutex::new(entries)) }
    }
}

#[async_trait]
impl Context for MemoryContext {
    async fn get(&self, key: &str) -> Result<Option<Value>, ContextError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), ContextError> {
        self.entries.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn has(&self, key: &str) -> Result<bool, ContextError> {
        Ok(self.entries.lock().contains_key(key))
    }

    async fn delete(&self, key: &str) -> Result<bool, ContextError> {
        Ok(self.entries.lock().remove(key).is_some())
    }

    async fn snapshot(&self) -> Result<Map<String, Value>, ContextError> {
        Ok(self.entries.lock().clone())
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
