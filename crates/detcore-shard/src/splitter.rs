// SPDX-License-Identifier: Apache-2.0
//! Task Splitter (§4.8): deterministically partitions a global Task IR
//! into per-shard subgraphs, synthesizing a [`ShardMessage`] for every
//! dependency edge that crosses a shard boundary.

use rustc_hash::FxHashMap;

use detcore_core::{stable_task_sort, validate_graph, ExecutionContext, TaskGraph, TaskId, Tick};

use crate::error::SplitError;
use crate::message::{message_sort_key, ShardMessage};
use crate::registry::{ShardId, ShardRegistry};

/// Output of [`split`]: one subgraph per shard that owns at least one task,
/// plus the cross-shard message list in canonical order.
#[derive(Debug, Clone, Default)]
pub struct SplitOutput {
    /// Per-shard subgraphs, keyed by shard id.
    pub subgraphs: FxHashMap<ShardId, TaskGraph>,
    /// Cross-shard messages, sorted by `(arrival_tick ASC, message_id ASC)`.
    pub messages: Vec<ShardMessage>,
}

impl SplitOutput {
    /// Returns the subgraph for `shard_id`, if that shard owns any task.
    #[must_use]
    pub fn subgraph(&self, shard_id: ShardId) -> Option<&TaskGraph> {
        self.subgraphs.get(&shard_id)
    }
}

/// Stateless splitter entry point. A struct rather than a bare function so
/// future revisions can carry configuration (e.g. a scratch-arena size
/// hint) without breaking callers, mirroring [`detcore_core::Scheduler`]'s
/// shape.
#[derive(Debug, Default, Clone, Copy)]
pub struct TaskSplitter;

impl TaskSplitter {
    /// Splits `graph` across the shards declared in `registry`.
    ///
    /// # Errors
    /// Returns [`SplitError::InvalidGraph`] if `graph` fails structural
    /// validation, or [`SplitError::Unroutable`] if a task's derived owner
    /// id does not resolve to any registered shard and no fallback
    /// applies.
    pub fn split(
        &self,
        graph: &TaskGraph,
        registry: &ShardRegistry,
        ctx: &ExecutionContext,
        fallback_shard: ShardId,
    ) -> Result<SplitOutput, SplitError> {
        split(graph, registry, ctx, fallback_shard)
    }
}

/// Determines the owning shard for `task`: under `Strict` determinism
/// mode, an unresolved owner id is a hard error rather than a silent
/// migration to `fallback_shard` (§9's placement-fallback open question,
/// resolved in `DESIGN.md`); every other mode falls back as the source
/// does.
fn place(
    task: &detcore_core::TaskNode,
    registry: &ShardRegistry,
    ctx: &ExecutionContext,
    fallback_shard: ShardId,
) -> Result<ShardId, SplitError> {
    let access = ctx.lookup_access_set(task.access_set_id);
    let resolved = access.and_then(|set| registry.place_task_checked(set));
    match resolved {
        Some(shard_id) => Ok(shard_id),
        None if ctx.mode == detcore_core::DeterminismMode::Strict => {
            Err(SplitError::Unroutable {
                task_id: task.task_id,
            })
        }
        None => Ok(fallback_shard),
    }
}

/// Combines two endpoints' `next_due_tick` for a cross-shard message's
/// `arrival_tick`: the max of the two, ignoring `INVALID`; if both are
/// `INVALID`, the result is `INVALID`.
fn max_ignoring_invalid(a: Tick, b: Tick) -> Tick {
    match (a.is_invalid(), b.is_invalid()) {
        (true, true) => Tick::INVALID,
        (true, false) => b,
        (false, true) => a,
        (false, false) => a.max(b),
    }
}

/// Splits `graph` across `registry`'s shards (§4.8). See
/// [`TaskSplitter::split`] for the method form.
///
/// # Errors
/// Returns [`SplitError::InvalidGraph`] or [`SplitError::Unroutable`].
#[tracing::instrument(skip(graph, registry, ctx), fields(graph_id = graph.graph_id, epoch_id = graph.epoch_id))]
pub fn split(
    graph: &TaskGraph,
    registry: &ShardRegistry,
    ctx: &ExecutionContext,
    fallback_shard: ShardId,
) -> Result<SplitOutput, SplitError> {
    validate_graph(graph)?;

    let mut subgraphs: FxHashMap<ShardId, TaskGraph> = FxHashMap::default();
    let mut placement: FxHashMap<TaskId, ShardId> = FxHashMap::default();

    for task in &graph.tasks {
        let shard_id = place(task, registry, ctx, fallback_shard)?;
        let subgraph = subgraphs.entry(shard_id).or_insert_with(|| TaskGraph {
            graph_id: graph.graph_id,
            epoch_id: graph.epoch_id,
            tasks: Vec::new(),
            edges: Vec::new(),
            barriers: graph.barriers.clone(),
        });
        subgraph.tasks.push(task.clone());
        placement.insert(task.task_id, shard_id);
    }

    let mut messages = Vec::new();
    for edge in &graph.edges {
        let Some(&from_shard) = placement.get(&edge.from_task_id) else {
            continue;
        };
        let Some(&to_shard) = placement.get(&edge.to_task_id) else {
            continue;
        };
        if from_shard == to_shard {
            if let Some(subgraph) = subgraphs.get_mut(&from_shard) {
                subgraph.edges.push(*edge);
            }
        } else {
            let from_index = graph.index_of(edge.from_task_id);
            let to_index = graph.index_of(edge.to_task_id);
            let arrival_tick = match (from_index, to_index) {
                (Some(f), Some(t)) => {
                    max_ignoring_invalid(graph.tasks[f].next_due_tick, graph.tasks[t].next_due_tick)
                }
                _ => Tick::INVALID,
            };
            messages.push(ShardMessage {
                source_shard: from_shard,
                target_shard: to_shard,
                task_id: edge.from_task_id,
                message_id: ShardMessage::compute_message_id(edge.from_task_id, edge.to_task_id),
                arrival_tick,
                payload: None,
            });
        }
    }

    for subgraph in subgraphs.values_mut() {
        stable_task_sort(&mut subgraph.tasks);
    }
    messages.sort_by_key(message_sort_key);

    tracing::debug!(
        shard_count = subgraphs.len(),
        message_count = messages.len(),
        "split complete"
    );
    Ok(SplitOutput { subgraphs, messages })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use detcore_core::{
        AccessRange, AccessSet, ActorRef, CapabilitySetRef, CommitKey, CostModelId,
        DependencyEdge as Edge, DeterminismClass, DeterminismMode, ExecutionContext, FidelityTier,
        LawScopeRef, PhaseId, RangeKind, SubIndex, SystemId, TaskCategory, TaskNode,
    };
    use bytes::Bytes;
    use detcore_core::AccessSetId;

    use crate::registry::{Shard, ShardScope, ShardScopeKind};

    fn write_access(id: u64, start: u64, end: u64) -> AccessSet {
        AccessSet {
            access_id: id,
            reads: Vec::new(),
            writes: vec![AccessRange {
                kind: RangeKind::IndexRange,
                component_id: 1,
                field_id: 1,
                start_id: start,
                end_id: end,
                set_id: 0,
            }],
            reduces: Vec::new(),
            reduction_op: None,
            commutative: false,
        }
    }

    fn task(task_id: u64, phase: u32, access_set_id: u64, due: Tick) -> TaskNode {
        TaskNode {
            task_id: TaskId(task_id),
            system_id: SystemId(0),
            category: TaskCategory::Derived,
            determinism_class: DeterminismClass::Strict,
            fidelity_tier: FidelityTier::Macro,
            next_due_tick: due,
            access_set_id: AccessSetId(access_set_id),
            cost_model_id: CostModelId(1),
            law_targets: Vec::new(),
            phase_id: PhaseId(phase),
            commit_key: CommitKey {
                phase_id: PhaseId(phase),
                task_id: TaskId(task_id),
                sub_index: SubIndex(0),
            },
            law_scope_ref: LawScopeRef(1),
            actor_ref: ActorRef::default(),
            capability_set_ref: CapabilitySetRef::default(),
            policy_params: Bytes::new(),
        }
    }

    fn two_shard_registry() -> ShardRegistry {
        let mut registry = ShardRegistry::new();
        registry.add(Shard {
            shard_id: ShardId(1),
            scope: ShardScope {
                kind: ShardScopeKind::EntityRange,
                start: 0,
                end: 999,
                tag: 0,
            },
            determinism_domain: 0,
            allow_cross_shard_reads: false,
        });
        registry.add(Shard {
            shard_id: ShardId(2),
            scope: ShardScope {
                kind: ShardScopeKind::EntityRange,
                start: 1000,
                end: 1999,
                tag: 0,
            },
            determinism_domain: 0,
            allow_cross_shard_reads: false,
        });
        registry
    }

    #[test]
    fn tasks_land_in_their_owning_shard() {
        let mut graph = TaskGraph {
            graph_id: 1,
            epoch_id: 1,
            tasks: vec![task(1, 0, 1, Tick::INVALID), task(2, 0, 2, Tick::INVALID)],
            edges: Vec::new(),
            barriers: Vec::new(),
        };
        stable_task_sort(&mut graph.tasks);

        let mut ctx = ExecutionContext::new(DeterminismMode::Audit);
        ctx.insert_access_set(AccessSetId(1), write_access(1, 0, 10));
        ctx.insert_access_set(AccessSetId(2), write_access(2, 1500, 1510));

        let registry = two_shard_registry();
        let output = split(&graph, &registry, &ctx, ShardId(1)).unwrap();

        assert_eq!(output.subgraph(ShardId(1)).unwrap().tasks.len(), 1);
        assert_eq!(output.subgraph(ShardId(2)).unwrap().tasks.len(), 1);
        assert!(output.messages.is_empty());
    }

    #[test]
    fn cross_shard_edge_becomes_a_message() {
        let mut graph = TaskGraph {
            graph_id: 1,
            epoch_id: 1,
            tasks: vec![
                task(1, 0, 1, Tick(5)),
                task(2, 1, 2, Tick(9)),
            ],
            edges: vec![Edge {
                from_task_id: TaskId(1),
                to_task_id: TaskId(2),
                reason_id: 0,
            }],
            barriers: Vec::new(),
        };
        stable_task_sort(&mut graph.tasks);

        let mut ctx = ExecutionContext::new(DeterminismMode::Audit);
        ctx.insert_access_set(AccessSetId(1), write_access(1, 0, 10));
        ctx.insert_access_set(AccessSetId(2), write_access(2, 1500, 1510));

        let registry = two_shard_registry();
        let output = split(&graph, &registry, &ctx, ShardId(1)).unwrap();

        assert_eq!(output.messages.len(), 1);
        let message = &output.messages[0];
        assert_eq!(message.source_shard, ShardId(1));
        assert_eq!(message.target_shard, ShardId(2));
        assert_eq!(message.arrival_tick, Tick(9));
        assert_eq!(
            message.message_id,
            ShardMessage::compute_message_id(TaskId(1), TaskId(2))
        );
    }

    #[test]
    fn unresolved_owner_falls_back_outside_strict_mode() {
        let mut graph = TaskGraph {
            graph_id: 1,
            epoch_id: 1,
            tasks: vec![task(1, 0, 1, Tick::INVALID)],
            edges: Vec::new(),
            barriers: Vec::new(),
        };
        stable_task_sort(&mut graph.tasks);

        let mut ctx = ExecutionContext::new(DeterminismMode::Audit);
        ctx.insert_access_set(AccessSetId(1), write_access(1, 9000, 9000));

        let registry = two_shard_registry();
        let output = split(&graph, &registry, &ctx, ShardId(1)).unwrap();
        assert_eq!(output.subgraph(ShardId(1)).unwrap().tasks.len(), 1);
    }

    #[test]
    fn unresolved_owner_is_an_error_under_strict_mode() {
        let mut graph = TaskGraph {
            graph_id: 1,
            epoch_id: 1,
            tasks: vec![task(1, 0, 1, Tick::INVALID)],
            edges: Vec::new(),
            barriers: Vec::new(),
        };
        stable_task_sort(&mut graph.tasks);

        let mut ctx = ExecutionContext::new(DeterminismMode::Strict);
        ctx.insert_access_set(AccessSetId(1), write_access(1, 9000, 9000));

        let registry = two_shard_registry();
        let err = split(&graph, &registry, &ctx, ShardId(1)).unwrap_err();
        assert_eq!(err, SplitError::Unroutable { task_id: TaskId(1) });
    }
}
