// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event emission plumbing.
//!
//! Each run (or worker process) owns an [`Emitter`] that stamps records
//! with a monotonic sequence number and a clock timestamp, forwards them to
//! the configured sink, and keeps an in-memory copy for the run report.
//! Sequence numbers are monotonic per emitting process; consumers joining
//! streams from several workers should correlate on node ids.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use weft_core::{
    Clock, Context, ContextError, Event, EventRecord, EventSink, NodeId, RunId,
};

/// Stamps, records, and forwards lifecycle events.
pub struct Emitter<C: Clock> {
    sink: Arc<dyn EventSink>,
    clock: C,
    seq: AtomicU64,
    log: Mutex<Vec<EventRecord>>,
}

impl<C: Clock> Emitter<C> {
    pub fn new(sink: Arc<dyn EventSink>, clock: C) -> Self {
        Self { sink, clock, seq: AtomicU64::new(0), log: Mutex::new(Vec::new()) }
    }

    pub async fn emit(&self, event: Event) {
        let record = EventRecord {
            seq: self.seq.fetch_add(1, Ordering::SeqCst),
            at_ms: self.clock.epoch_ms(),
            event,
        };
        self.log.lock().push(record.clone());
        self.sink.append(record).await;
    }

    /// Records emitted so far, in append order.
    pub fn records(&self) -> Vec<EventRecord> {
        self.log.lock().clone()
    }
}

/// Context view handed to nodes: every `set` lands in the backing store
/// and is reported as a `context:change` event attributed to the writing
/// node.
pub struct EmittingContext<C: Clock> {
    inner: Arc<dyn Context>,
    emitter: Arc<Emitter<C>>,
    run: RunId,
    node: NodeId,
}

impl<C: Clock> EmittingContext<C> {
    pub fn new(
        inner: Arc<dyn Context>,
        emitter: Arc<Emitter<C>>,
        run: RunId,
        node: NodeId,
    ) -> Self {
        Self { inner, emitter, run, node }
    }
}

#[async_trait]
impl<C: Clock> Context for EmittingContext<C> {
    async fn get(&self, key: &str) -> Result<Option<Value>, ContextError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), ContextError> {
        self.inner.set(key, value.clone()).await?;
        self.emitter
            .emit(Event::ContextChange {
                run_id: self.run.clone(),
                key: key.to_string(),
                value,
                node: self.node.clone(),
            })
            .await;
        Ok(())
    }

    async fn has(&self, key: &str) -> Result<bool, ContextError> {
        self.inner.has(key).await
    }

    async fn delete(&self, key: &str) -> Result<bool, ContextError> {
        self.inner.delete(key).await
    }

    async fn snapshot(&self) -> Result<serde_json::Map<String, Value>, ContextError> {
        self.inner.snapshot().await
    }
}
