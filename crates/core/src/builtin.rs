// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Selectors and reserved keys for engine-synthesized nodes.
//!
//! Built-in nodes are dispatched on the `builtin:` prefix of their `uses`
//! selector, never through the user registry.

use crate::blueprint::NodeId;
use smol_str::SmolStr;

pub const BUILTIN_PREFIX: &str = "builtin:";

/// Runs another blueprint as a child run.
/// Params: `{"blueprint": id, "inputs": {child_key: parent_expr},
/// "outputs": {parent_key: child_key}}`.
pub const SUBFLOW: &str = "builtin:subflow";

/// Reads an array from a context key and arms one worker instance per
/// element. Params: `{"from": key, "worker": node_id}`.
pub const SCATTER: &str = "builtin:scatter";

/// Collects worker instance outputs in scatter order.
/// Params: `{"to": key}` (the context key receiving the ordered array).
pub const GATHER: &str = "builtin:gather";

/// Loop controller guarding a cyclic body.
/// Params: `{"condition": expr}`.
pub const LOOP: &str = "builtin:loop";

/// Synthetic fan-out root unifying multiple start nodes.
pub const PARALLEL: &str = "builtin:parallel";

/// Node id of the injected parallel root.
pub const PARALLEL_ROOT: &str = "__fanout";

/// Action a loop controller emits toward the loop body.
pub const CONTINUE_ACTION: &str = "continue";

/// Action a loop controller emits toward the loop exit.
pub const BREAK_ACTION: &str = "break";

/// Binding name a loop condition sees for the controller's iteration count.
pub const LOOP_COUNT_BINDING: &str = "loop_count";

pub fn is_builtin(uses: &str) -> bool {
    uses.starts_with(BUILTIN_PREFIX)
}

/// Node id of a dynamic scatter worker instance: `{template}#{index}`.
pub fn instance_id(template: &str, index: usize) -> NodeId {
    SmolStr::new(format!("{template}#{index}"))
}

/// Split an instance id back into its template id and index.
pub fn split_instance(id: &str) -> Option<(&str, usize)> {
    let (template, index) = id.rsplit_once('#')?;
    let index = index.parse().ok()?;
    Some((template, index))
}

/// Reserved context key recording a gather's dynamic fan-out
/// (`{"worker": template_id, "count": n}`).
pub fn fan_key(gather: &str) -> String {
    format!("_fan:{gather}")
}

/// Reserved context key holding a loop controller's iteration count.
pub fn loop_key(controller: &str) -> String {
    format!("_loop:{controller}")
}

#[cfg(test)]
#[path = "builtin_tests.rs"]
mod tests;
