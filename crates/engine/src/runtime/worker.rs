// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker pool driving a queue adapter.
//!
//! Each replica pulls dispatches and services them through
//! [`Runtime::execute_node`]. Replicas of one pool model the worker
//! processes of a distributed deployment; several pools can share one
//! queue.

use super::{RunOptions, Runtime};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use weft_core::Clock;
use weft_queue::QueueAdapter;

pub struct WorkerPool<C: Clock> {
    runtime: Arc<Runtime<C>>,
    queue: Arc<dyn QueueAdapter>,
    opts: RunOptions,
    replicas: usize,
}

impl<C: Clock> WorkerPool<C> {
    pub fn new(runtime: Arc<Runtime<C>>, queue: Arc<dyn QueueAdapter>) -> Self {
        Self { runtime, queue, opts: RunOptions::default(), replicas: 1 }
    }

    /// Worker-side run options (loop-condition mode in particular must
    /// match what the submitter intended).
    pub fn opts(mut self, opts: RunOptions) -> Self {
        self.opts = opts;
        self
    }

    pub fn replicas(mut self, replicas: usize) -> Self {
        self.replicas = replicas.max(1);
        self
    }

    /// Serve dispatches until the queue closes or `shutdown` fires.
    pub async fn serve(&self, shutdown: CancellationToken) {
        let mut replicas = JoinSet::new();
        for worker in 0..self.replicas {
            let runtime = self.runtime.clone();
            let queue = self.queue.clone();
            let opts = self.opts.clone();
            let shutdown = shutdown.clone();
            replicas.spawn(async move {
                loop {
                    let dispatch = tokio::select! {
                        _ = shutdown.cancelled() => break,
                        next = queue.next() => next,
                    };
                    match dispatch {
                        Ok(Some(dispatch)) => {
                            tracing::debug!(
                                worker,
                                run = %dispatch.run_id,
                                node = %dispatch.node,
                                "worker took dispatch"
                            );
                            if let Err(err) = runtime
                                .execute_node(&dispatch.run_id, &dispatch.node, &opts, &queue)
                                .await
                            {
                                tracing::error!(
                                    worker,
                                    run = %dispatch.run_id,
                                    node = %dispatch.node,
                                    error = %err,
                                    "dispatch failed"
                                );
                            }
                        }
                        Ok(None) => break,
                        Err(err) => {
                            tracing::error!(worker, error = %err, "queue receive failed");
                            break;
                        }
                    }
                }
            });
        }
        while replicas.join_next().await.is_some() {}
    }
}
