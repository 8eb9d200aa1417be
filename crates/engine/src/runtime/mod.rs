// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler/runtime.
//!
//! Two operating modes over one settle-and-traverse core:
//!
//! - **Orchestrator mode** ([`Runtime::run`]): the process owns the run end
//!   to end. A bounded dispatch pool pulls ready nodes, executes them,
//!   commits results, and asks the traverser for the next ready set until
//!   no work remains.
//! - **Worker mode** ([`Runtime::submit`] + [`Runtime::execute_node`]): each
//!   node execution is one queue dispatch. The store's `pending → running`
//!   CAS makes redelivered dispatches no-ops, and the worker that consumes
//!   the last node publishes the run's terminal status.

mod builtins;
mod worker;

pub use worker::WorkerPool;

use crate::emit::{Emitter, EmittingContext};
use crate::error::EngineError;
use crate::executor::NodeExecutor;
use crate::graph::CompiledFlow;
use crate::registry::{NodeCall, Registry};
use crate::traverse::{Advance, Signal, Traverser};
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use weft_core::{
    builtin, Blueprint, Clock, Context, Event, EventRecord, EventSink, Node, NodeError, NodeId,
    NodeResult, NodeStatus, NullSink, RunFinal, RunId, RunStatus, SystemClock,
};
use weft_queue::{Dispatch, QueueAdapter};
use weft_store::{CoordinationStore, RunSeed, StoreContext};

/// Context key carrying the blueprint id, so workers can resolve a run's
/// graph from a bare `(run, node)` dispatch.
const BLUEPRINT_KEY: &str = "_blueprint";

/// How often blocked schedulers and workers re-check the sticky
/// cancellation flag.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Per-run invocation options.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Fail the run at start when the blueprint has cycles not guarded by
    /// loop controllers. Loose mode only warns.
    pub strict_cycles: bool,
    /// Maximum concurrent node executions for this run; 0 means unbounded.
    pub concurrency: usize,
    /// Overall run timeout; expiry cancels the run.
    pub timeout_ms: Option<u64>,
    /// Permit the restricted predicate evaluator for loop conditions.
    /// Never a default.
    pub unsafe_conditions: bool,
    /// Pin the run id (resubmission idempotency, external cancellation).
    pub run_id: Option<RunId>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            strict_cycles: true,
            concurrency: 0,
            timeout_ms: None,
            unsafe_conditions: false,
            run_id: None,
        }
    }
}

impl RunOptions {
    weft_core::setters! {
        set {
            strict_cycles: bool,
            concurrency: usize,
            unsafe_conditions: bool,
        }
        option {
            timeout_ms: u64,
            run_id: RunId,
        }
    }
}

/// Terminal description of a finished run.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: RunId,
    pub status: RunStatus,
    pub reason: Option<String>,
    /// Final context snapshot, minus engine-internal keys.
    pub context: Map<String, Value>,
    pub node_statuses: HashMap<NodeId, NodeStatus>,
    /// Ordered event records observed by this process for the run.
    pub events: Vec<EventRecord>,
}

impl RunReport {
    pub fn node_status(&self, node: &str) -> Option<NodeStatus> {
        self.node_statuses.get(node).copied()
    }

    /// Events without their record envelopes, in order.
    pub fn event_stream(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(|r| &r.event)
    }
}

enum Disposition {
    /// Commit done; these nodes became ready.
    Progress(Vec<NodeId>),
    /// Fatal error: the cancellation flag is set, the run ends failed.
    FatalStop(String),
    /// Execution observed the abort signal; the run is ending.
    AbortStop,
}

/// The orchestration kernel. Holds only immutable tables and handles —
/// all per-run mutable state lives in the coordination store. Cloning is
/// cheap and shares everything; dispatch tasks and subflows carry clones.
pub struct Runtime<C: Clock = SystemClock> {
    blueprints: Arc<HashMap<String, Arc<CompiledFlow>>>,
    registry: Arc<Registry>,
    store: Arc<dyn CoordinationStore>,
    sink: Arc<dyn EventSink>,
    clock: C,
}

impl<C: Clock> Clone for Runtime<C> {
    fn clone(&self) -> Self {
        Self {
            blueprints: Arc::clone(&self.blueprints),
            registry: Arc::clone(&self.registry),
            store: Arc::clone(&self.store),
            sink: Arc::clone(&self.sink),
            clock: self.clock.clone(),
        }
    }
}

impl Runtime<SystemClock> {
    pub fn new(store: Arc<dyn CoordinationStore>, registry: Registry) -> Self {
        Self {
            blueprints: Arc::new(HashMap::new()),
            registry: Arc::new(registry),
            store,
            sink: Arc::new(NullSink),
            clock: SystemClock,
        }
    }
}

impl<C: Clock> Runtime<C> {
    /// Replace the event sink.
    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Replace the clock (tests pin timestamps with `FakeClock`).
    pub fn clock<D: Clock>(self, clock: D) -> Runtime<D> {
        Runtime {
            blueprints: self.blueprints,
            registry: self.registry,
            store: self.store,
            sink: self.sink,
            clock,
        }
    }

    /// Compile and register a blueprint for running and subflow resolution.
    pub fn blueprint(mut self, blueprint: Blueprint) -> Result<Self, EngineError> {
        let flow = CompiledFlow::compile(blueprint)?;
        Arc::make_mut(&mut self.blueprints).insert(flow.id().to_string(), Arc::new(flow));
        Ok(self)
    }

    pub fn store(&self) -> &Arc<dyn CoordinationStore> {
        &self.store
    }

    /// Set the run's sticky cancellation flag.
    pub async fn cancel(&self, run: &RunId) -> Result<(), EngineError> {
        tracing::info!(run = %run, "cancellation requested");
        Ok(self.store.set_cancelled(run).await?)
    }

    /// Drop a finished run's coordination state (worker-mode GC).
    pub async fn collect(&self, run: &RunId) -> Result<(), EngineError> {
        Ok(self.store.remove_run(run).await?)
    }

    // ---- orchestrator mode ----

    /// Own a run end-to-end and return its terminal report.
    ///
    /// Validation failures (unknown blueprint or `uses`, bad builtin
    /// params, strict-mode cycles, run id collisions) error out before any
    /// run state exists. After `workflow:start`, failures are contained in
    /// the report.
    pub async fn run(
        &self,
        blueprint_id: &str,
        initial: Map<String, Value>,
        opts: RunOptions,
    ) -> Result<RunReport, EngineError> {
        let flow = self.flow(blueprint_id)?.clone();
        self.validate_run(&flow, &opts)?;
        let run_id = opts.run_id.clone().unwrap_or_default();
        let emitter = Arc::new(Emitter::new(self.sink.clone(), self.clock.clone()));

        self.seed_run(&flow, &run_id, initial).await?;
        emitter
            .emit(Event::WorkflowStart {
                run_id: run_id.clone(),
                blueprint: flow.id().to_string(),
            })
            .await;
        tracing::info!(run = %run_id, blueprint = blueprint_id, "workflow started");

        let final_status = match self.orchestrate(&flow, &run_id, &opts, &emitter).await {
            Ok(final_status) => final_status,
            Err(err) => {
                tracing::error!(run = %run_id, error = %err, "run aborted by coordination failure");
                RunFinal::failed(format!("coordination failure: {err}"))
            }
        };

        self.emit_terminal(&run_id, &final_status, &emitter).await;
        if let Err(err) = self.store.put_final(&run_id, final_status.clone()).await {
            tracing::error!(run = %run_id, error = %err, "failed to record final status");
        }

        let context = self
            .store
            .context_snapshot(&run_id)
            .await
            .map(public_context)
            .unwrap_or_default();
        let node_statuses = self
            .store
            .statuses(&run_id)
            .await
            .map(|rows| rows.into_iter().collect())
            .unwrap_or_default();
        self.store.remove_run(&run_id).await?;

        Ok(RunReport {
            run_id,
            status: final_status.status,
            reason: final_status.reason,
            context,
            node_statuses,
            events: emitter.records(),
        })
    }

    async fn orchestrate(
        &self,
        flow: &Arc<CompiledFlow>,
        run: &RunId,
        opts: &RunOptions,
        emitter: &Arc<Emitter<C>>,
    ) -> Result<RunFinal, EngineError> {
        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::unbounded_channel::<(NodeId, NodeResult)>();
        let limit = if opts.concurrency == 0 { usize::MAX } else { opts.concurrency };
        let deadline = opts
            .timeout_ms
            .map(|ms| tokio::time::Instant::now() + Duration::from_millis(ms));

        let mut ready: VecDeque<NodeId> = flow.start_nodes().iter().cloned().collect();
        let mut in_flight = 0usize;
        let mut fatal: Option<String> = None;
        let mut aborted = false;
        let mut timed_out = false;

        loop {
            // The flag is sticky; observe it between dispatch decisions.
            if !aborted && self.store.is_cancelled(run).await? {
                aborted = true;
                cancel.cancel();
            }
            if aborted || fatal.is_some() {
                ready.clear();
            }

            while in_flight < limit {
                let Some(node_id) = ready.pop_front() else { break };
                if self
                    .try_dispatch(flow, run, node_id, opts, emitter, &cancel, &tx)
                    .await?
                {
                    in_flight += 1;
                }
            }
            if in_flight == 0 {
                break;
            }

            // Wake up for a completion, the run deadline, or a periodic
            // re-check of the sticky cancellation flag.
            let deadline_sleep = async {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };
            let completion = tokio::select! {
                completion = rx.recv() => completion,
                _ = tokio::time::sleep(CANCEL_POLL_INTERVAL), if !aborted => continue,
                _ = deadline_sleep, if !timed_out && !aborted => {
                    tracing::warn!(run = %run, "run timed out");
                    timed_out = true;
                    self.store.set_cancelled(run).await?;
                    continue;
                }
            };
            let Some((node_id, result)) = completion else { break };
            in_flight -= 1;

            match self.settle(flow, run, &node_id, &result, emitter).await? {
                Disposition::Progress(next) => ready.extend(next),
                Disposition::FatalStop(reason) => {
                    fatal.get_or_insert(reason);
                    cancel.cancel();
                }
                Disposition::AbortStop => {}
            }
        }

        if let Some(reason) = fatal {
            return Ok(RunFinal::failed(reason));
        }
        if timed_out {
            return Ok(RunFinal::cancelled_because(format!(
                "run timed out after {}ms",
                opts.timeout_ms.unwrap_or_default()
            )));
        }
        if aborted || self.store.is_cancelled(run).await? {
            return Ok(RunFinal::cancelled());
        }

        // Drained with nothing running: anything still pending can never
        // be signaled again.
        let mut stuck: Vec<NodeId> = self
            .store
            .statuses(run)
            .await?
            .into_iter()
            .filter(|(_, status)| !status.is_terminal())
            .map(|(node, _)| node)
            .collect();
        if stuck.is_empty() {
            Ok(RunFinal::completed())
        } else {
            stuck.sort();
            tracing::error!(run = %run, stuck = ?stuck, "deadlock detected");
            Ok(RunFinal::failed(format!("deadlock: stuck nodes {stuck:?}")))
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn try_dispatch(
        &self,
        flow: &Arc<CompiledFlow>,
        run: &RunId,
        node_id: NodeId,
        opts: &RunOptions,
        emitter: &Arc<Emitter<C>>,
        cancel: &CancellationToken,
        tx: &mpsc::UnboundedSender<(NodeId, NodeResult)>,
    ) -> Result<bool, EngineError> {
        // At-most-one execution per (run, node); a lost CAS means another
        // proposal (any-join duplicate, loop re-proposal) already won.
        if !self
            .store
            .cas_status(run, &node_id, NodeStatus::Pending, NodeStatus::Running)
            .await?
        {
            tracing::debug!(run = %run, node = %node_id, "dispatch skipped, not pending");
            return Ok(false);
        }
        emitter
            .emit(Event::NodeStart { run_id: run.clone(), node: node_id.clone() })
            .await;
        tracing::debug!(run = %run, node = %node_id, "node dispatched");

        let runtime = self.clone();
        let flow = Arc::clone(flow);
        let run = run.clone();
        let opts = opts.clone();
        let emitter = Arc::clone(emitter);
        let cancel = cancel.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let result = runtime
                .invoke(&flow, &run, node_id.clone(), &opts, &emitter, cancel)
                .await;
            let _ = tx.send((node_id, result));
        });
        Ok(true)
    }

    /// Execute one node (builtin or registered implementation).
    async fn invoke(
        &self,
        flow: &Arc<CompiledFlow>,
        run: &RunId,
        node_id: NodeId,
        opts: &RunOptions,
        emitter: &Arc<Emitter<C>>,
        cancel: CancellationToken,
    ) -> NodeResult {
        let Some(node) = flow.node_or_template(&node_id) else {
            return Err(NodeError::fatal(format!("unknown node {node_id}")));
        };

        let traverser = Traverser { flow, store: &self.store };
        let input = match traverser.compute_input(run, &node_id).await {
            Ok(input) => input,
            Err(err) => return Err(NodeError::fatal(format!("input resolution: {err}"))),
        };

        let store_ctx = StoreContext::new(self.store.clone(), run.clone());
        let ctx: Arc<dyn Context> = Arc::new(EmittingContext::new(
            Arc::new(store_ctx),
            emitter.clone(),
            run.clone(),
            node_id.clone(),
        ));
        let call = NodeCall {
            run_id: run.clone(),
            node: node_id.clone(),
            params: node.params.clone(),
            input,
            ctx,
            cancel,
        };
        let executor = NodeExecutor { emitter };

        if builtin::is_builtin(&node.uses) {
            match builtins::builtin_future(self, flow, node, opts) {
                Ok(f) => executor.execute_with(node, call, f).await,
                Err(err) => Err(NodeError::fatal(err.to_string())),
            }
        } else {
            match self.registry.get(&node.uses) {
                Some(imp) => executor.execute(node, imp.clone(), call).await,
                None => Err(NodeError::fatal(format!(
                    "no implementation for uses \"{}\"",
                    node.uses
                ))),
            }
        }
    }

    /// Commit a node's result and work out what happens next. Shared by
    /// both operating modes.
    async fn settle(
        &self,
        flow: &Arc<CompiledFlow>,
        run: &RunId,
        node_id: &str,
        result: &NodeResult,
        emitter: &Arc<Emitter<C>>,
    ) -> Result<Disposition, EngineError> {
        let traverser = Traverser { flow, store: &self.store };
        let Some(node) = flow.node_or_template(node_id) else {
            return Ok(Disposition::Progress(Vec::new()));
        };

        match result {
            Ok(outcome) => {
                self.store.put_result(run, node_id, outcome).await?;
                // Commit before the status transition so successors observe
                // the result once they can observe the status.
                self.store
                    .cas_status(run, node_id, NodeStatus::Running, NodeStatus::Succeeded)
                    .await?;
                emitter
                    .emit(Event::NodeFinish {
                        run_id: run.clone(),
                        node: node_id.into(),
                        action: outcome.action.clone(),
                        output: outcome.output.clone(),
                    })
                    .await;
                tracing::debug!(run = %run, node = node_id, action = %outcome.action, "node finished");

                if node.uses == builtin::SCATTER {
                    return Ok(Disposition::Progress(
                        self.scatter_effects(flow, run, node, outcome).await?,
                    ));
                }
                if node.uses == builtin::LOOP && outcome.action == builtin::CONTINUE_ACTION {
                    // Re-arm the loop body (and the controller itself)
                    // before the continue edge decrements into it.
                    self.store.arm_nodes(run, &flow.loop_rearm(node_id)).await?;
                }
                let advance = traverser
                    .advance(run, node_id, Signal::Succeeded(outcome))
                    .await?;
                self.log_advance(run, node_id, &advance);
                Ok(Disposition::Progress(advance.ready))
            }
            Err(err) => {
                self.store
                    .cas_status(run, node_id, NodeStatus::Running, NodeStatus::Failed)
                    .await?;
                match err {
                    NodeError::Aborted(_) => Ok(Disposition::AbortStop),
                    NodeError::Fatal(reason) => {
                        self.store.set_cancelled(run).await?;
                        Ok(Disposition::FatalStop(reason.clone()))
                    }
                    NodeError::Recoverable(reason) if node.config.fatal_on_error => {
                        self.store.set_cancelled(run).await?;
                        Ok(Disposition::FatalStop(reason.clone()))
                    }
                    NodeError::Recoverable(_) => {
                        let advance =
                            traverser.advance(run, node_id, Signal::Failed).await?;
                        self.log_advance(run, node_id, &advance);
                        Ok(Disposition::Progress(advance.ready))
                    }
                }
            }
        }
    }

    /// Post-commit effects of a scatter: the template never runs, one
    /// instance per element is armed and dispatched, and the gather's
    /// fan-in is resized to the element count.
    async fn scatter_effects(
        &self,
        flow: &Arc<CompiledFlow>,
        run: &RunId,
        node: &Node,
        outcome: &weft_core::NodeOutcome,
    ) -> Result<Vec<NodeId>, EngineError> {
        let plan = builtins::scatter_plan(flow, node)?;
        let count = outcome.output.as_array().map(Vec::len).unwrap_or(0);
        self.store
            .set_status(run, &plan.worker, NodeStatus::Skipped)
            .await?;
        tracing::debug!(
            run = %run,
            scatter = %node.id,
            worker = %plan.worker,
            gather = %plan.gather,
            count,
            "scatter fan-out"
        );
        if count == 0 {
            self.store.set_pending(run, &plan.gather, 0).await?;
            return Ok(vec![plan.gather]);
        }
        self.store.set_pending(run, &plan.gather, count as u32).await?;
        let rows: Vec<(NodeId, u32)> = (0..count)
            .map(|index| (builtin::instance_id(&plan.worker, index), 0))
            .collect();
        self.store.arm_nodes(run, &rows).await?;
        Ok(rows.into_iter().map(|(id, _)| id).collect())
    }

    fn log_advance(&self, run: &RunId, node_id: &str, advance: &Advance) {
        if !advance.ready.is_empty() || !advance.skipped.is_empty() {
            tracing::debug!(
                run = %run,
                node = node_id,
                ready = ?advance.ready,
                skipped = ?advance.skipped,
                "traversal advanced"
            );
        }
    }

    async fn emit_terminal(&self, run: &RunId, final_status: &RunFinal, emitter: &Emitter<C>) {
        let event = match final_status.status {
            RunStatus::Completed => Event::WorkflowFinish { run_id: run.clone() },
            RunStatus::Cancelled => Event::WorkflowCancelled { run_id: run.clone() },
            RunStatus::Failed | RunStatus::Running => Event::WorkflowFailed {
                run_id: run.clone(),
                reason: final_status.reason.clone().unwrap_or_default(),
            },
        };
        tracing::info!(
            run = %run,
            status = %final_status.status,
            reason = final_status.reason.as_deref().unwrap_or(""),
            "workflow finished"
        );
        emitter.emit(event).await;
    }

    // ---- shared plumbing ----

    fn flow(&self, blueprint_id: &str) -> Result<&Arc<CompiledFlow>, EngineError> {
        self.blueprints
            .get(blueprint_id)
            .ok_or_else(|| EngineError::UnknownBlueprint(blueprint_id.to_string()))
    }

    /// Start-of-run validation: no run state exists if this fails.
    fn validate_run(&self, flow: &CompiledFlow, opts: &RunOptions) -> Result<(), EngineError> {
        if !flow.cycles().is_empty() {
            if opts.strict_cycles {
                return Err(EngineError::CyclicBlueprint {
                    blueprint: flow.id().to_string(),
                    cycles: flow.cycles().to_vec(),
                });
            }
            for cycle in flow.cycles() {
                tracing::warn!(blueprint = flow.id(), cycle = ?cycle, "blueprint contains a cycle");
            }
        }
        for node in flow.nodes() {
            if builtin::is_builtin(&node.uses) {
                builtins::validate_builtin(flow, node, &self.blueprints)?;
            } else if !self.registry.contains(&node.uses) {
                return Err(EngineError::UnknownUses {
                    node: node.id.clone(),
                    uses: node.uses.clone(),
                });
            }
        }
        Ok(())
    }

    async fn seed_run(
        &self,
        flow: &CompiledFlow,
        run: &RunId,
        initial: Map<String, Value>,
    ) -> Result<(), EngineError> {
        let mut context = initial;
        context.insert(BLUEPRINT_KEY.to_string(), Value::String(flow.id().to_string()));
        let seed = RunSeed { context, nodes: flow.initial_pending() };
        self.store.create_run(run, seed).await?;
        tracing::debug!(run = %run, blueprint = flow.id(), "run seeded");
        Ok(())
    }

    // ---- worker mode ----

    /// Seed a run and enqueue its start set; workers do the rest.
    pub async fn submit(
        &self,
        blueprint_id: &str,
        initial: Map<String, Value>,
        opts: RunOptions,
        queue: &Arc<dyn QueueAdapter>,
    ) -> Result<RunId, EngineError> {
        let flow = self.flow(blueprint_id)?.clone();
        self.validate_run(&flow, &opts)?;
        let run_id = opts.run_id.clone().unwrap_or_default();
        self.seed_run(&flow, &run_id, initial).await?;

        let emitter = Emitter::new(self.sink.clone(), self.clock.clone());
        emitter
            .emit(Event::WorkflowStart {
                run_id: run_id.clone(),
                blueprint: flow.id().to_string(),
            })
            .await;
        tracing::info!(run = %run_id, blueprint = blueprint_id, "workflow submitted");

        let starts: Vec<Dispatch> = flow
            .start_nodes()
            .iter()
            .map(|node| Dispatch::new(run_id.clone(), node.clone()))
            .collect();
        queue.enqueue_all(starts).await?;
        Ok(run_id)
    }

    /// Execute exactly one node of a distributed run, then enqueue
    /// whatever became ready. Redelivered dispatches are no-ops thanks to
    /// the status CAS.
    pub async fn execute_node(
        &self,
        run: &RunId,
        node_id: &str,
        opts: &RunOptions,
        queue: &Arc<dyn QueueAdapter>,
    ) -> Result<(), EngineError> {
        let blueprint_id = self
            .store
            .context_get(run, BLUEPRINT_KEY)
            .await?
            .as_ref()
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| EngineError::MissingRunBlueprint { run: run.clone() })?;
        let flow = self.flow(&blueprint_id)?.clone();
        let emitter = Arc::new(Emitter::new(self.sink.clone(), self.clock.clone()));

        // Cancellation observed before dispatch: the node never leaves
        // pending.
        if self.store.is_cancelled(run).await? {
            self.finish_distributed(run, RunFinal::cancelled(), queue, &emitter).await?;
            return Ok(());
        }
        if !self
            .store
            .cas_status(run, node_id, NodeStatus::Pending, NodeStatus::Running)
            .await?
        {
            tracing::debug!(run = %run, node = node_id, "dispatch already taken");
            return Ok(());
        }
        emitter
            .emit(Event::NodeStart { run_id: run.clone(), node: node_id.into() })
            .await;

        // Workers poll the sticky flag at short intervals and translate it
        // into the abort signal.
        let cancel = CancellationToken::new();
        let poller = {
            let store = self.store.clone();
            let run = run.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                loop {
                    if cancel.is_cancelled() {
                        break;
                    }
                    match store.is_cancelled(&run).await {
                        Ok(true) => {
                            cancel.cancel();
                            break;
                        }
                        Ok(false) => {}
                        Err(_) => break,
                    }
                    tokio::time::sleep(CANCEL_POLL_INTERVAL).await;
                }
            })
        };

        let result = self
            .invoke(&flow, run, node_id.into(), opts, &emitter, cancel.clone())
            .await;
        cancel.cancel();
        let _ = poller.await;

        match self.settle(&flow, run, node_id, &result, &emitter).await? {
            Disposition::Progress(next) => {
                if next.is_empty() {
                    let statuses = self.store.statuses(run).await?;
                    if statuses.iter().all(|(_, status)| status.is_terminal()) {
                        self.finish_distributed(run, RunFinal::completed(), queue, &emitter)
                            .await?;
                    }
                } else {
                    let batch: Vec<Dispatch> = next
                        .into_iter()
                        .map(|node| Dispatch::new(run.clone(), node))
                        .collect();
                    queue.enqueue_all(batch).await?;
                }
            }
            Disposition::FatalStop(reason) => {
                self.finish_distributed(run, RunFinal::failed(reason), queue, &emitter)
                    .await?;
            }
            Disposition::AbortStop => {
                self.finish_distributed(run, RunFinal::cancelled(), queue, &emitter)
                    .await?;
            }
        }
        Ok(())
    }

    /// Publish a distributed run's terminal status exactly once (first
    /// finisher wins; duplicates are harmless).
    async fn finish_distributed(
        &self,
        run: &RunId,
        final_status: RunFinal,
        queue: &Arc<dyn QueueAdapter>,
        emitter: &Arc<Emitter<C>>,
    ) -> Result<(), EngineError> {
        if self.store.get_final(run).await?.is_some() {
            return Ok(());
        }
        self.store.put_final(run, final_status.clone()).await?;
        self.emit_terminal(run, &final_status, emitter).await;
        queue.publish_final(run, final_status).await?;
        Ok(())
    }
}

/// Strip engine-internal keys from a context snapshot.
fn public_context(mut snapshot: Map<String, Value>) -> Map<String, Value> {
    snapshot.retain(|key, _| {
        key != BLUEPRINT_KEY && !key.starts_with("_fan:") && !key.starts_with("_loop:")
    });
    snapshot
}
