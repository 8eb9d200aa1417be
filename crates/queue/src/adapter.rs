// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue adapter contract.

use async_trait::async_trait;
use thiserror::Error;
use weft_core::{NodeId, RunFinal, RunId};

/// One unit of distributable work: execute `node` within `run`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub run_id: RunId,
    pub node: NodeId,
}

impl Dispatch {
    pub fn new(run_id: RunId, node: impl Into<NodeId>) -> Self {
        Self { run_id, node: node.into() }
    }
}

/// Errors surfaced by a queue transport.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue closed")]
    Closed,
    #[error("queue transport error: {0}")]
    Transport(String),
}

/// Abstract dispatch transport for worker mode.
///
/// Delivery is at-least-once: a dispatch may be observed by more than one
/// worker, and workers must treat a lost status CAS as "someone else has
/// it". The terminal status channel lets an external waiter observe run
/// outcomes without polling the store.
#[async_trait]
pub trait QueueAdapter: Send + Sync {
    async fn enqueue(&self, dispatch: Dispatch) -> Result<(), QueueError>;

    async fn enqueue_all(&self, batch: Vec<Dispatch>) -> Result<(), QueueError> {
        for dispatch in batch {
            self.enqueue(dispatch).await?;
        }
        Ok(())
    }

    /// Pull the next dispatch; `Ok(None)` once the queue is closed and
    /// drained.
    async fn next(&self) -> Result<Option<Dispatch>, QueueError>;

    /// Publish a run's terminal status.
    async fn publish_final(&self, run: &RunId, final_status: RunFinal)
        -> Result<(), QueueError>;

    /// Wait until the run's terminal status is published.
    async fn wait_final(&self, run: &RunId) -> Result<RunFinal, QueueError>;
}
