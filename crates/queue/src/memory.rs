// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process queue adapter.
//!
//! Backs the distributed runtime's tests and any single-host deployment:
//! an unbounded dispatch channel shared by worker tasks, plus a per-run
//! terminal status table with wakeups.

use crate::adapter::{Dispatch, QueueAdapter, QueueError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use weft_core::{RunFinal, RunId};

struct Inner {
    tx: Mutex<Option<mpsc::UnboundedSender<Dispatch>>>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Dispatch>>,
    finals: Mutex<HashMap<RunId, RunFinal>>,
    final_published: Notify,
}

/// Process-local [`QueueAdapter`]. Cloning shares the channel, so any
/// number of worker tasks can pull from one queue.
#[derive(Clone)]
pub struct InProcessQueue {
    inner: Arc<Inner>,
}

impl InProcessQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Inner {
                tx: Mutex::new(Some(tx)),
                rx: tokio::sync::Mutex::new(rx),
                finals: Mutex::new(HashMap::new()),
                final_published: Notify::new(),
            }),
        }
    }

    /// Stop accepting dispatches; `next` drains the backlog then reports
    /// closed.
    pub fn close(&self) {
        self.inner.tx.lock().take();
    }
}

impl Default for InProcessQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueAdapter for InProcessQueue {
    async fn enqueue(&self, dispatch: Dispatch) -> Result<(), QueueError> {
        let tx = self.inner.tx.lock().clone().ok_or(QueueError::Closed)?;
        tracing::debug!(run = %dispatch.run_id, node = %dispatch.node, "enqueue");
        tx.send(dispatch).map_err(|_| QueueError::Closed)
    }

    async fn next(&self) -> Result<Option<Dispatch>, QueueError> {
        let mut rx = self.inner.rx.lock().await;
        Ok(rx.recv().await)
    }

    async fn publish_final(
        &self,
        run: &RunId,
        final_status: RunFinal,
    ) -> Result<(), QueueError> {
        self.inner.finals.lock().insert(run.clone(), final_status);
        self.inner.final_published.notify_waiters();
        Ok(())
    }

    async fn wait_final(&self, run: &RunId) -> Result<RunFinal, QueueError> {
        loop {
            // Register for the wakeup before checking, so a publish landing
            // between the check and the await is not lost.
            let notified = self.inner.final_published.notified();
            if let Some(found) = self.inner.finals.lock().get(run).cloned() {
                return Ok(found);
            }
            notified.await;
        }
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
