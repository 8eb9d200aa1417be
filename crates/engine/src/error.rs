// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error taxonomy.
//!
//! Validation errors fail a run before it is created. Everything after
//! `workflow:start` is contained: executors hold recoverable errors, the
//! runtime holds fatal ones, and the caller sees a terminal run report.

use thiserror::Error;
use weft_core::{BlueprintError, NodeId, RunId};
use weft_queue::QueueError;
use weft_store::StoreError;

/// Errors that can occur while compiling blueprints or starting runs.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Blueprint(#[from] BlueprintError),

    #[error("unknown blueprint: {0}")]
    UnknownBlueprint(String),

    #[error("node {node}: no implementation registered for uses \"{uses}\"")]
    UnknownUses { node: NodeId, uses: String },

    #[error("node {node}: invalid params: {reason}")]
    InvalidParams { node: NodeId, reason: String },

    #[error("blueprint {blueprint} has cycles without loop controllers: {cycles:?}")]
    CyclicBlueprint {
        blueprint: String,
        cycles: Vec<Vec<NodeId>>,
    },

    #[error("run {run}: blueprint id missing from run state")]
    MissingRunBlueprint { run: RunId },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}
