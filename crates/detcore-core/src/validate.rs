// SPDX-License-Identifier: Apache-2.0
//! Task Graph Validator (§4.3): structural checks run before any scheduler
//! touches a graph. Failure aborts the entire `schedule` call with no sink
//! or audit activity beyond this early return.

use crate::graph::TaskGraph;
use crate::order::graph_is_sorted;
use crate::task::{TaskCategory, TaskNode};

use crate::error::ValidationError;

/// Validates a single task's declared invariants: `access_set_id` and
/// `law_scope_ref` non-zero, `category == Authoritative` iff `law_targets`
/// is non-empty, and `commit_key` agreeing with `phase_id`/`task_id`.
///
/// Enum fields are checked for validity structurally by the Rust type
/// system (an out-of-range `TaskCategory`/`DeterminismClass`/`FidelityTier`
/// cannot be constructed), so this function does not re-check enum bounds
/// the way the source's integer-tagged unions must.
pub fn validate_task(task: &TaskNode) -> Result<(), ValidationError> {
    if task.access_set_id.0 == 0 || task.law_scope_ref.0 == 0 {
        return Err(ValidationError::ZeroHandle(task.task_id));
    }
    let is_authoritative = matches!(task.category, TaskCategory::Authoritative);
    if is_authoritative != !task.law_targets.is_empty() {
        return Err(ValidationError::LawTargetsMismatch(task.task_id));
    }
    if task.commit_key.phase_id != task.phase_id || task.commit_key.task_id != task.task_id {
        return Err(ValidationError::CommitKeyMismatch(task.task_id));
    }
    Ok(())
}

/// Validates a complete [`TaskGraph`]: non-empty, sorted, every task
/// individually valid, every edge's endpoints resolvable and non-backward,
/// and the edge set acyclic (Kahn-style topological check).
pub fn validate_graph(graph: &TaskGraph) -> Result<(), ValidationError> {
    if graph.tasks.is_empty() {
        return Err(ValidationError::EmptyGraph);
    }
    if !graph_is_sorted(&graph.tasks) {
        return Err(ValidationError::UnsortedGraph);
    }
    for task in &graph.tasks {
        validate_task(task)?;
    }

    let mut edge_indices = Vec::with_capacity(graph.edges.len());
    for edge in &graph.edges {
        let from = graph
            .index_of(edge.from_task_id)
            .ok_or(ValidationError::DanglingEdge(edge.from_task_id))?;
        let to = graph
            .index_of(edge.to_task_id)
            .ok_or(ValidationError::DanglingEdge(edge.to_task_id))?;
        if graph.tasks[from].phase_id > graph.tasks[to].phase_id {
            return Err(ValidationError::BackwardEdge {
                from: edge.from_task_id,
                to: edge.to_task_id,
            });
        }
        edge_indices.push((from, to));
    }

    if graph_has_cycle(graph.tasks.len(), &edge_indices) {
        return Err(ValidationError::Cycle);
    }
    Ok(())
}

/// Kahn's algorithm over the full graph: repeatedly remove a zero-in-degree
/// node; if not every node is removed, the edge set contains a cycle.
fn graph_has_cycle(task_count: usize, edges: &[(usize, usize)]) -> bool {
    if task_count == 0 {
        return false;
    }
    let mut indegree = vec![0u32; task_count];
    for &(_, to) in edges {
        indegree[to] += 1;
    }
    let mut done = vec![false; task_count];
    for _ in 0..task_count {
        let Some(next) = (0..task_count).find(|&i| !done[i] && indegree[i] == 0) else {
            return true;
        };
        done[next] = true;
        for &(from, to) in edges {
            if from == next {
                indegree[to] -= 1;
            }
        }
    }
    false
}
