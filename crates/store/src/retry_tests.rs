// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::memory::MemoryStore;
use std::sync::atomic::{AtomicU32, Ordering};

/// MemoryStore wrapper that fails the next N operations with a chosen error.
struct FlakyStore {
    inner: MemoryStore,
    fail_next: AtomicU32,
    transient: bool,
    calls: AtomicU32,
}

impl FlakyStore {
    fn transient(fail_next: u32) -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_next: AtomicU32::new(fail_next),
            transient: true,
            calls: AtomicU32::new(0),
        }
    }

    fn persistent(fail_next: u32) -> Self {
        Self { transient: false, ..Self::transient(fail_next) }
    }

    fn glitch(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.fail_next.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next.store(remaining - 1, Ordering::SeqCst);
            return Err(if self.transient {
                StoreError::Transient("blip".into())
            } else {
                StoreError::Backend("down".into())
            });
        }
        Ok(())
    }
}

#[async_trait]
impl CoordinationStore for FlakyStore {
    async fn create_run(&self, run: &RunId, seed: RunSeed) -> Result<(), StoreError> {
        self.glitch()?;
        self.inner.create_run(run, seed).await
    }

    async fn cas_status(
        &self,
        run: &RunId,
        node: &str,
        from: NodeStatus,
        to: NodeStatus,
    ) -> Result<bool, StoreError> {
        self.glitch()?;
        self.inner.cas_status(run, node, from, to).await
    }

    async fn set_status(
        &self,
        run: &RunId,
        node: &str,
        to: NodeStatus,
    ) -> Result<(), StoreError> {
        self.glitch()?;
        self.inner.set_status(run, node, to).await
    }

    async fn status(&self, run: &RunId, node: &str) -> Result<Option<NodeStatus>, StoreError> {
        self.glitch()?;
        self.inner.status(run, node).await
    }

    async fn statuses(&self, run: &RunId) -> Result<Vec<(NodeId, NodeStatus)>, StoreError> {
        self.glitch()?;
        self.inner.statuses(run).await
    }

    async fn put_result(
        &self,
        run: &RunId,
        node: &str,
        outcome: &NodeOutcome,
    ) -> Result<(), StoreError> {
        self.glitch()?;
        self.inner.put_result(run, node, outcome).await
    }

    async fn result(&self, run: &RunId, node: &str) -> Result<Option<NodeOutcome>, StoreError> {
        self.glitch()?;
        self.inner.result(run, node).await
    }

    async fn context_get(&self, run: &RunId, key: &str) -> Result<Option<Value>, StoreError> {
        self.glitch()?;
        self.inner.context_get(run, key).await
    }

    async fn context_set(&self, run: &RunId, key: &str, value: Value) -> Result<(), StoreError> {
        self.glitch()?;
        self.inner.context_set(run, key, value).await
    }

    async fn context_delete(&self, run: &RunId, key: &str) -> Result<bool, StoreError> {
        self.glitch()?;
        self.inner.context_delete(run, key).await
    }

    async fn context_snapshot(&self, run: &RunId) -> Result<Map<String, Value>, StoreError> {
        self.glitch()?;
        self.inner.context_snapshot(run).await
    }

    async fn set_pending(&self, run: &RunId, node: &str, count: u32) -> Result<(), StoreError> {
        self.glitch()?;
        self.inner.set_pending(run, node, count).await
    }

    async fn decrement_pending(
        &self,
        run: &RunId,
        node: &str,
        satisfied: bool,
    ) -> Result<JoinProgress, StoreError> {
        self.glitch()?;
        self.inner.decrement_pending(run, node, satisfied).await
    }

    async fn arm_nodes(&self, run: &RunId, nodes: &[(NodeId, u32)]) -> Result<(), StoreError> {
        self.glitch()?;
        self.inner.arm_nodes(run, nodes).await
    }

    async fn set_cancelled(&self, run: &RunId) -> Result<(), StoreError> {
        self.glitch()?;
        self.inner.set_cancelled(run).await
    }

    async fn is_cancelled(&self, run: &RunId) -> Result<bool, StoreError> {
        self.glitch()?;
        self.inner.is_cancelled(run).await
    }

    async fn put_final(&self, run: &RunId, final_status: RunFinal) -> Result<(), StoreError> {
        self.glitch()?;
        self.inner.put_final(run, final_status).await
    }

    async fn get_final(&self, run: &RunId) -> Result<Option<RunFinal>, StoreError> {
        self.glitch()?;
        self.inner.get_final(run).await
    }

    async fn remove_run(&self, run: &RunId) -> Result<(), StoreError> {
        self.glitch()?;
        self.inner.remove_run(run).await
    }
}

fn run() -> RunId {
    RunId::from_string("run-retry")
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_to_success() {
    let store = Retrying::new(FlakyStore::transient(2));
    store.create_run(&run(), RunSeed::default()).await.unwrap();
    assert_eq!(store.inner().calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn exhausted_attempts_surface_the_transient_error() {
    let store = Retrying::with(
        FlakyStore::transient(10),
        3,
        std::time::Duration::from_millis(5),
    );
    let err = store.create_run(&run(), RunSeed::default()).await.unwrap_err();
    assert!(err.is_transient());
    assert_eq!(store.inner().calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn persistent_errors_are_not_retried() {
    let store = Retrying::new(FlakyStore::persistent(1));
    let err = store.create_run(&run(), RunSeed::default()).await.unwrap_err();
    assert!(matches!(err, StoreError::Backend(_)));
    assert_eq!(store.inner().calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn decrement_pending_is_never_retried() {
    let store = Retrying::new(FlakyStore::transient(1));
    store.inner().inner.create_run(&run(), RunSeed::default()).await.unwrap();
    let err = store.decrement_pending(&run(), "a", true).await.unwrap_err();
    assert!(err.is_transient());
    assert_eq!(store.inner().calls.load(Ordering::SeqCst), 1);
}
