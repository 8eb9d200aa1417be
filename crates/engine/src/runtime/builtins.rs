// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine-synthesized node semantics.
//!
//! Built-ins execute through the same attempt loop as user nodes but are
//! resolved by their `uses` selector, not the registry. Their params are
//! validated at run start; execution re-reads them defensively anyway.

use super::{RunOptions, Runtime};
use crate::error::EngineError;
use crate::eval;
use crate::graph::CompiledFlow;
use crate::registry::NodeCall;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use weft_core::{
    builtin, Clock, ContextError, Node, NodeError, NodeId, NodeOutcome, NodeResult, RunStatus,
};
use weft_store::{CoordinationStore, StoreError};

pub(super) type BuiltinFn = Box<dyn Fn(NodeCall) -> BoxFuture<'static, NodeResult> + Send + Sync>;

fn store_failure(err: StoreError) -> NodeError {
    // Transience is already retried inside the store wrapper; whatever
    // surfaces here is persistent.
    NodeError::fatal(format!("coordination store: {err}"))
}

fn context_failure(err: ContextError) -> NodeError {
    NodeError::fatal(err.to_string())
}

/// Build the execution closure for a builtin node.
pub(super) fn builtin_future<C: Clock>(
    runtime: &Runtime<C>,
    flow: &Arc<CompiledFlow>,
    node: &Node,
    opts: &RunOptions,
) -> Result<BuiltinFn, EngineError> {
    match node.uses.as_str() {
        builtin::PARALLEL => Ok(Box::new(|call: NodeCall| {
            async move { Ok(NodeOutcome::new(call.input)) }.boxed()
        })),

        builtin::SCATTER => {
            let from = str_param(node, "from")?;
            let plan = scatter_plan(flow, node)?;
            let store = runtime.store().clone();
            Ok(Box::new(move |call: NodeCall| {
                let from = from.clone();
                let plan = plan.clone();
                let store = store.clone();
                async move {
                    let items = call.ctx.get(&from).await.map_err(context_failure)?;
                    let Some(Value::Array(items)) = items else {
                        return Err(NodeError::recoverable(format!(
                            "scatter source \"{from}\" is not an array"
                        )));
                    };
                    let info = json!({ "worker": plan.worker.as_str(), "count": items.len() });
                    store
                        .context_set(&call.run_id, &builtin::fan_key(&plan.gather), info)
                        .await
                        .map_err(store_failure)?;
                    Ok(NodeOutcome::new(Value::Array(items)))
                }
                .boxed()
            }))
        }

        builtin::GATHER => {
            let to = opt_str_param(node, "to")?;
            let gather_id = node.id.clone();
            let store = runtime.store().clone();
            Ok(Box::new(move |call: NodeCall| {
                let to = to.clone();
                let gather_id = gather_id.clone();
                let store = store.clone();
                async move {
                    let fan_key = builtin::fan_key(&gather_id);
                    let Some(fan) = store
                        .context_get(&call.run_id, &fan_key)
                        .await
                        .map_err(store_failure)?
                    else {
                        return Err(NodeError::recoverable(
                            "gather has no recorded fan-out".to_string(),
                        ));
                    };
                    let worker = fan["worker"].as_str().unwrap_or_default().to_string();
                    let count = fan["count"].as_u64().unwrap_or(0) as usize;

                    // Outputs in scatter order, regardless of completion order.
                    let mut outputs = Vec::with_capacity(count);
                    for index in 0..count {
                        let instance = builtin::instance_id(&worker, index);
                        match store
                            .result(&call.run_id, &instance)
                            .await
                            .map_err(store_failure)?
                        {
                            Some(outcome) => outputs.push(outcome.output),
                            None => {
                                return Err(NodeError::recoverable(format!(
                                    "scatter worker {instance} did not succeed"
                                )))
                            }
                        }
                    }
                    store
                        .context_delete(&call.run_id, &fan_key)
                        .await
                        .map_err(store_failure)?;

                    let gathered = Value::Array(outputs);
                    if let Some(to) = &to {
                        call.ctx.set(to, gathered.clone()).await.map_err(context_failure)?;
                    }
                    Ok(NodeOutcome::new(gathered))
                }
                .boxed()
            }))
        }

        builtin::LOOP => {
            let condition = str_param(node, "condition")?;
            let controller_id = node.id.clone();
            let store = runtime.store().clone();
            let unsafe_conditions = opts.unsafe_conditions;
            Ok(Box::new(move |call: NodeCall| {
                let condition = condition.clone();
                let controller_id = controller_id.clone();
                let store = store.clone();
                async move {
                    let key = builtin::loop_key(&controller_id);
                    let count = store
                        .context_get(&call.run_id, &key)
                        .await
                        .map_err(store_failure)?
                        .as_ref()
                        .and_then(Value::as_u64)
                        .unwrap_or(0);
                    let mut scope = call.ctx.snapshot().await.map_err(context_failure)?;
                    scope.insert(builtin::LOOP_COUNT_BINDING.to_string(), json!(count));

                    if eval::loop_condition(&condition, &Value::Object(scope), unsafe_conditions)
                    {
                        store
                            .context_set(&call.run_id, &key, json!(count + 1))
                            .await
                            .map_err(store_failure)?;
                        Ok(NodeOutcome::with_action(call.input, builtin::CONTINUE_ACTION))
                    } else {
                        Ok(NodeOutcome::with_action(call.input, builtin::BREAK_ACTION))
                    }
                }
                .boxed()
            }))
        }

        builtin::SUBFLOW => {
            let child_id = str_param(node, "blueprint")?;
            let inputs = map_param(node, "inputs")?;
            let outputs = map_param(node, "outputs")?;
            let runtime = runtime.clone();
            let child_opts = RunOptions::default()
                .strict_cycles(opts.strict_cycles)
                .concurrency(opts.concurrency)
                .unsafe_conditions(opts.unsafe_conditions);
            Ok(Box::new(move |call: NodeCall| {
                let child_id = child_id.clone();
                let inputs = inputs.clone();
                let outputs = outputs.clone();
                let runtime = runtime.clone();
                let child_opts = child_opts.clone();
                async move {
                    let snapshot =
                        Value::Object(call.ctx.snapshot().await.map_err(context_failure)?);
                    let mut child_context = Map::new();
                    for (child_key, expr) in &inputs {
                        if let Some(value) = eval::resolve_path(&snapshot, expr) {
                            child_context.insert(child_key.clone(), value.clone());
                        }
                    }

                    let report = runtime
                        .run(&child_id, child_context, child_opts)
                        .await
                        .map_err(|err| {
                            NodeError::recoverable(format!("subflow {child_id}: {err}"))
                        })?;
                    if report.status != RunStatus::Completed {
                        return Err(NodeError::recoverable(format!(
                            "subflow {child_id} ended {}: {}",
                            report.status,
                            report.reason.unwrap_or_default()
                        )));
                    }

                    let mut copied = Map::new();
                    for (parent_key, child_key) in &outputs {
                        if let Some(value) = report.context.get(child_key) {
                            call.ctx
                                .set(parent_key, value.clone())
                                .await
                                .map_err(context_failure)?;
                            copied.insert(parent_key.clone(), value.clone());
                        }
                    }
                    Ok(NodeOutcome::new(Value::Object(copied)))
                }
                .boxed()
            }))
        }

        other => Err(EngineError::UnknownUses {
            node: node.id.clone(),
            uses: other.to_string(),
        }),
    }
}

/// Static shape of one scatter: the worker template and the gather fed by
/// it.
#[derive(Clone)]
pub(super) struct ScatterPlan {
    pub worker: NodeId,
    pub gather: NodeId,
}

pub(super) fn scatter_plan(flow: &CompiledFlow, node: &Node) -> Result<ScatterPlan, EngineError> {
    let worker = NodeId::from(str_param(node, "worker")?.as_str());
    let gather = flow
        .outgoing(&worker)
        .next()
        .map(|edge| edge.target.clone())
        .ok_or_else(|| EngineError::InvalidParams {
            node: node.id.clone(),
            reason: format!("scatter worker {worker} has no outgoing edge to a gather"),
        })?;
    Ok(ScatterPlan { worker, gather })
}

/// Run-start validation of builtin params (§ error taxonomy: no run is
/// created when this fails).
pub(super) fn validate_builtin(
    flow: &CompiledFlow,
    node: &Node,
    blueprints: &HashMap<String, Arc<CompiledFlow>>,
) -> Result<(), EngineError> {
    match node.uses.as_str() {
        builtin::PARALLEL => Ok(()),
        builtin::GATHER => opt_str_param(node, "to").map(|_| ()),
        builtin::LOOP => str_param(node, "condition").map(|_| ()),
        builtin::SCATTER => {
            str_param(node, "from")?;
            let worker = str_param(node, "worker")?;
            if flow.node(&worker).is_none() {
                return Err(EngineError::InvalidParams {
                    node: node.id.clone(),
                    reason: format!("scatter worker \"{worker}\" is not a node"),
                });
            }
            scatter_plan(flow, node).map(|_| ())
        }
        builtin::SUBFLOW => {
            let child = str_param(node, "blueprint")?;
            if !blueprints.contains_key(&child) {
                return Err(EngineError::UnknownBlueprint(child));
            }
            map_param(node, "inputs")?;
            map_param(node, "outputs")?;
            Ok(())
        }
        other => Err(EngineError::UnknownUses {
            node: node.id.clone(),
            uses: other.to_string(),
        }),
    }
}

fn str_param(node: &Node, key: &str) -> Result<String, EngineError> {
    node.params
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| EngineError::InvalidParams {
            node: node.id.clone(),
            reason: format!("missing or non-string param \"{key}\""),
        })
}

fn opt_str_param(node: &Node, key: &str) -> Result<Option<String>, EngineError> {
    match node.params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if !s.is_empty() => Ok(Some(s.clone())),
        Some(_) => Err(EngineError::InvalidParams {
            node: node.id.clone(),
            reason: format!("param \"{key}\" must be a non-empty string"),
        }),
    }
}

/// Read an optional `{string: string}` object param.
fn map_param(node: &Node, key: &str) -> Result<Vec<(String, String)>, EngineError> {
    match node.params.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Object(entries)) => entries
            .iter()
            .map(|(k, v)| {
                v.as_str()
                    .map(|s| (k.clone(), s.to_string()))
                    .ok_or_else(|| EngineError::InvalidParams {
                        node: node.id.clone(),
                        reason: format!("param \"{key}.{k}\" must be a string"),
                    })
            })
            .collect(),
        Some(_) => Err(EngineError::InvalidParams {
            node: node.id.clone(),
            reason: format!("param \"{key}\" must be an object"),
        }),
    }
}
