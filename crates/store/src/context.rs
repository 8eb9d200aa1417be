// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Context view backed by the coordination store.

use crate::store::{CoordinationStore, StoreError};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use weft_core::{Context, ContextError, RunId};

/// The distributed variant of [`Context`]: every operation round-trips
/// through the coordination store, so mutations from any worker are visible
/// to every successor once the writer's result commits.
#[derive(Clone)]
pub struct StoreContext {
    store: Arc<dyn CoordinationStore>,
    run: RunId,
}

impl StoreContext {
    pub fn new(store: Arc<dyn CoordinationStore>, run: RunId) -> Self {
        Self { store, run }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run
    }
}

impl From<StoreError> for ContextError {
    fn from(err: StoreError) -> Self {
        ContextError::Backend(err.to_string())
    }
}

#[async_trait]
impl Context for StoreContext {
    async fn get(&self, key: &str) -> Result<Option<Value>, ContextError> {
        Ok(self.store.context_get(&self.run, key).await?)
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), ContextError> {
        Ok(self.store.context_set(&self.run, key, value).await?)
    }

    async fn delete(&self, key: &str) -> Result<bool, ContextError> {
        Ok(self.store.context_delete(&self.run, key).await?)
    }

    async fn snapshot(&self) -> Result<Map<String, Value>, ContextError> {
        Ok(self.store.context_snapshot(&self.run).await?)
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
