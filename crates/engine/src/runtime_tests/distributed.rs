// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker mode: queue-driven distributed runs.

use super::*;
use crate::runtime::WorkerPool;
use tokio_util::sync::CancellationToken;
use weft_core::RunId;
use weft_queue::{Dispatch, InProcessQueue, QueueAdapter};
use weft_store::CoordinationStore;

struct Cluster {
    rig: Rig,
    queue: Arc<dyn QueueAdapter>,
    raw_queue: InProcessQueue,
    shutdown: CancellationToken,
    pool: tokio::task::JoinHandle<()>,
}

/// Spin up a rig plus a pool of worker replicas sharing one queue.
fn cluster(registry: Registry, blueprints: Vec<Blueprint>, opts: RunOptions) -> Cluster {
    let rig = rig(registry, blueprints);
    let raw_queue = InProcessQueue::new();
    let queue: Arc<dyn QueueAdapter> = Arc::new(raw_queue.clone());
    let shutdown = CancellationToken::new();
    let pool = {
        let pool = WorkerPool::new(rig.runtime.clone(), queue.clone())
            .opts(opts)
            .replicas(3);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { pool.serve(shutdown).await })
    };
    Cluster { rig, queue, raw_queue, shutdown, pool }
}

impl Cluster {
    async fn stop(self) {
        self.shutdown.cancel();
        let _ = self.pool.await;
    }
}

fn diamond() -> Blueprint {
    FlowBuilder::new("diamond")
        .node("a", "seed")
        .node("b", "side")
        .node("c", "side")
        .node("d", "join")
        .edge("a", "b")
        .edge("a", "c")
        .edge("b", "d")
        .edge("c", "d")
        .build()
        .unwrap()
}

#[tokio::test]
async fn distributed_diamond_completes_through_workers() {
    let mut registry = echo_registry(&["seed", "side"]);
    let joins = counter();
    {
        let joins = joins.clone();
        registry.register_fn("join", move |call: NodeCall| {
            let joins = joins.clone();
            async move {
                joins.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                call.ctx.set("done", json!(true)).await.ok();
                Ok(NodeOutcome::empty())
            }
        });
    }

    let cluster = cluster(registry, vec![diamond()], RunOptions::default());
    let run_id = cluster
        .rig
        .runtime
        .submit("diamond", Map::new(), RunOptions::default(), &cluster.queue)
        .await
        .unwrap();

    let final_status = cluster.queue.wait_final(&run_id).await.unwrap();
    assert_eq!(final_status.status, RunStatus::Completed);
    assert_eq!(count_of(&joins), 1);

    // Worker mode leaves the run state for the coordinator to collect.
    let statuses = cluster.rig.store.statuses(&run_id).await.unwrap();
    assert_eq!(statuses.len(), 4);
    assert!(statuses.iter().all(|(_, s)| *s == NodeStatus::Succeeded));
    assert_eq!(
        cluster.rig.store.context_get(&run_id, "done").await.unwrap(),
        Some(json!(true))
    );

    cluster.rig.runtime.collect(&run_id).await.unwrap();
    assert_eq!(cluster.rig.store.run_count(), 0);
    cluster.stop().await;
}

#[tokio::test]
async fn redelivered_dispatches_execute_once() {
    let runs = counter();
    let mut registry = Registry::new();
    {
        let runs = runs.clone();
        registry.register_fn("once", move |_| {
            let runs = runs.clone();
            async move {
                runs.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(NodeOutcome::empty())
            }
        });
    }
    let blueprint = FlowBuilder::new("single").node("only", "once").build().unwrap();

    let cluster = cluster(registry, vec![blueprint], RunOptions::default());
    let run_id = cluster
        .rig
        .runtime
        .submit("single", Map::new(), RunOptions::default(), &cluster.queue)
        .await
        .unwrap();

    // At-least-once delivery: force a duplicate of the same dispatch.
    cluster
        .raw_queue
        .enqueue(Dispatch::new(run_id.clone(), "only"))
        .await
        .unwrap();

    let final_status = cluster.queue.wait_final(&run_id).await.unwrap();
    assert_eq!(final_status.status, RunStatus::Completed);
    // Give the duplicate a chance to be (harmlessly) consumed.
    tokio::task::yield_now().await;
    assert_eq!(count_of(&runs), 1);
    cluster.stop().await;
}

#[tokio::test]
async fn distributed_cancellation_parks_downstream_nodes() {
    let mut registry = echo_registry(&["after"]);
    registry.register_fn("sleepy", |call: NodeCall| async move {
        // Park until the worker's cancellation poller aborts us.
        call.cancel.cancelled().await;
        Err(weft_core::NodeError::aborted("run cancelled"))
    });

    let blueprint = FlowBuilder::new("slow")
        .node("a", "sleepy")
        .node("b", "after")
        .edge("a", "b")
        .build()
        .unwrap();

    let cluster = cluster(registry, vec![blueprint], RunOptions::default());
    let run_id = RunId::from_string("run-dist-cancel");
    cluster
        .rig
        .runtime
        .submit(
            "slow",
            Map::new(),
            RunOptions::default().run_id(run_id.clone()),
            &cluster.queue,
        )
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    cluster.rig.runtime.cancel(&run_id).await.unwrap();

    let final_status = cluster.queue.wait_final(&run_id).await.unwrap();
    assert_eq!(final_status.status, RunStatus::Cancelled);
    assert_eq!(
        cluster.rig.store.status(&run_id, "b").await.unwrap(),
        Some(NodeStatus::Pending)
    );
    cluster.stop().await;
}

#[tokio::test]
async fn distributed_scatter_gather_preserves_order() {
    let mut registry = echo_registry(&["check"]);
    registry.register_fn("load", |call: NodeCall| async move {
        call.ctx.set("items", json!([3, 1, 2])).await.ok();
        Ok(NodeOutcome::empty())
    });
    registry.register_fn("double", |call: NodeCall| async move {
        let n = call.input.as_i64().unwrap_or(0);
        tokio::time::sleep(std::time::Duration::from_millis(5 * n as u64)).await;
        Ok(NodeOutcome::new(json!(n * 2)))
    });

    let blueprint = FlowBuilder::new("batched")
        .node("load", "load")
        .batch("fan", "items", "double", Value::Null, "results")
        .node("done", "check")
        .edge("load", "fan")
        .edge("fan.gather", "done")
        .build()
        .unwrap();

    let cluster = cluster(registry, vec![blueprint], RunOptions::default());
    let run_id = cluster
        .rig
        .runtime
        .submit("batched", Map::new(), RunOptions::default(), &cluster.queue)
        .await
        .unwrap();

    let final_status = cluster.queue.wait_final(&run_id).await.unwrap();
    assert_eq!(final_status.status, RunStatus::Completed);
    assert_eq!(
        cluster.rig.store.context_get(&run_id, "results").await.unwrap(),
        Some(json!([6, 2, 4]))
    );
    cluster.stop().await;
}
