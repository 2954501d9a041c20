// SPDX-License-Identifier: Apache-2.0
//! The parallel scheduler backend (§4.6): externally indistinguishable from
//! [`super::single_thread`] in every observable event.
//!
//! The phase-local admission order is a pure function of the dependency
//! graph (Kahn's algorithm, lowest-index-first), independent of any task's
//! law verdict. That lets this backend split the work cleanly: the visit
//! order is computed once, up front, by a plain sequential pass; the
//! (potentially expensive, caller-supplied) law/access-set/reduction
//! evaluation for every task in a phase is then fanned out across scoped OS
//! threads, since it depends only on that task's own content; and the
//! cheap, strictly order-dependent parts — conflict detection against the
//! accumulating committed set, and audit recording — stay on a single
//! sequential pass that replays the precomputed visit order. Tokio/rayon
//! are not a fit here: `Scheduler::schedule` is a synchronous, blocking
//! call end to end, and `std::thread::scope` keeps the hot path free of an
//! async runtime.

use std::thread;

use rustc_hash::FxHashMap;

use crate::access::verify_reduction_rules;
use crate::context::{AuditEvent, DecisionKind, EventKind, ExecutionContext, LawDecision, Sink};
use crate::error::{RefusalCode, ScheduleError};
use crate::graph::TaskGraph;
use crate::ident::TaskId;
use crate::order::stable_task_sort;
use crate::task::TaskNode;
use crate::validate::validate_graph;

use super::Scheduler;

/// Thread-pooled backend: fans the per-task law/access-set/reduction
/// evaluation of a phase out across scoped OS threads, then commits in the
/// same canonical order [`super::single_thread`] would.
#[derive(Debug, Clone, Copy)]
pub struct ParallelScheduler {
    /// Upper bound on worker threads spawned per phase. `None` uses
    /// `std::thread::available_parallelism`.
    pub max_workers: Option<usize>,
}

impl Default for ParallelScheduler {
    fn default() -> Self {
        Self { max_workers: None }
    }
}

impl ParallelScheduler {
    /// Constructs a scheduler capped at `max_workers` worker threads per
    /// phase (clamped to at least one).
    #[must_use]
    pub fn with_max_workers(max_workers: usize) -> Self {
        Self {
            max_workers: Some(max_workers.max(1)),
        }
    }

    fn worker_count(&self, phase_count: usize) -> usize {
        let cap = self.max_workers.unwrap_or_else(|| {
            thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
        });
        cap.max(1).min(phase_count.max(1))
    }
}

impl Scheduler for ParallelScheduler {
    fn schedule(
        &self,
        graph: &TaskGraph,
        ctx: &ExecutionContext,
        sink: &mut dyn Sink,
    ) -> Result<Vec<AuditEvent>, ScheduleError> {
        schedule(self, graph, ctx, sink)
    }
}

/// The per-task result of law/access-set/reduction evaluation, computed
/// without reference to any other task in the phase.
enum PrecomputedKind {
    /// The law refused outright, or a second `Transform` was treated as one.
    RefusedLaw(RefusalCode),
    /// The working copy's `access_set_id` did not resolve.
    MissingAccessSet,
    /// The working copy's AccessSet failed reduction verification.
    BadReduction,
    /// The task cleared evaluation and is a conflict-check candidate.
    Candidate(Box<TaskNode>, LawDecision),
}

struct Precomputed {
    /// Whether a `Transform` verdict fired (emits a `Transformed` event
    /// ahead of whatever `kind` resolves to, mirroring the reference
    /// backend).
    transformed: bool,
    kind: PrecomputedKind,
}

fn evaluate_one(ctx: &ExecutionContext, orig: &TaskNode) -> Precomputed {
    let mut working = orig.clone();
    let mut decision = ctx.evaluate_law(&working);
    let mut transformed = false;
    if decision.kind == DecisionKind::Transform {
        transformed = true;
        if let Some(tier) = decision.transformed_fidelity_tier {
            working.fidelity_tier = tier;
        }
        if let Some(tick) = decision.transformed_next_due_tick {
            if !tick.is_invalid() {
                working.next_due_tick = tick;
            }
        }
        decision = ctx.evaluate_law(&working);
    }

    let kind = match decision.kind {
        // A second Transform is treated as a Refuse (§9 open question).
        DecisionKind::Transform => PrecomputedKind::RefusedLaw(RefusalCode::Law),
        DecisionKind::Refuse => {
            PrecomputedKind::RefusedLaw(decision.refusal_code.unwrap_or(RefusalCode::Law))
        }
        DecisionKind::Accept | DecisionKind::Constrain => {
            match ctx.lookup_access_set(working.access_set_id) {
                None => PrecomputedKind::MissingAccessSet,
                Some(access) if !verify_reduction_rules(access) => PrecomputedKind::BadReduction,
                Some(_) => PrecomputedKind::Candidate(Box::new(working), decision),
            }
        }
    };
    Precomputed { transformed, kind }
}

/// Runs `graph` to completion against `ctx`, phase by phase. Returns the
/// complete, ordered audit-event stream, identical in content to what
/// [`super::single_thread::schedule`] would return for the same inputs.
///
/// # Errors
/// Returns [`ScheduleError::InvalidGraph`] if `graph` fails validation
/// before any side effect.
#[tracing::instrument(skip(scheduler, graph, ctx, sink), fields(graph_id = graph.graph_id, epoch_id = graph.epoch_id))]
pub fn schedule(
    scheduler: &ParallelScheduler,
    graph: &TaskGraph,
    ctx: &ExecutionContext,
    sink: &mut dyn Sink,
) -> Result<Vec<AuditEvent>, ScheduleError> {
    validate_graph(graph)?;

    let index_by_task_id: FxHashMap<TaskId, usize> = graph
        .tasks
        .iter()
        .enumerate()
        .map(|(i, t)| (t.task_id, i))
        .collect();

    let mut events = Vec::new();
    let mut emit = |ctx: &ExecutionContext, event: AuditEvent, events: &mut Vec<AuditEvent>| {
        ctx.record_audit(&event);
        events.push(event);
    };

    for phase_id in graph.phases() {
        let (phase_start, phase_end) = graph.phase_bounds(phase_id);
        let phase_count = phase_end - phase_start;
        tracing::debug!(phase = phase_id.0, count = phase_count, "phase begin (parallel)");

        let local_edges: Vec<(usize, usize)> = graph
            .edges
            .iter()
            .filter_map(|edge| {
                let from = *index_by_task_id.get(&edge.from_task_id)?;
                let to = *index_by_task_id.get(&edge.to_task_id)?;
                (from >= phase_start && from < phase_end && to >= phase_start && to < phase_end)
                    .then_some((from - phase_start, to - phase_start))
            })
            .collect();

        // Pure, sequential: the admission order depends only on the
        // dependency graph, never on any verdict.
        let visit_order = kahn_visit_order(phase_count, &local_edges);

        let outcomes = evaluate_phase_parallel(scheduler, ctx, &graph.tasks[phase_start..phase_end]);

        let mut phase_commits: Vec<TaskNode> = Vec::with_capacity(phase_count);
        let mut phase_access: Vec<crate::access::AccessSet> = Vec::with_capacity(phase_count);

        for local_index in visit_order {
            let orig = &graph.tasks[phase_start + local_index];
            let outcome = &outcomes[local_index];
            if outcome.transformed {
                emit(ctx, AuditEvent::transformed(orig.task_id), &mut events);
            }
            match &outcome.kind {
                PrecomputedKind::RefusedLaw(code) => {
                    emit(ctx, AuditEvent::refused(orig.task_id, *code), &mut events);
                }
                PrecomputedKind::MissingAccessSet => {
                    emit(
                        ctx,
                        AuditEvent::refused(orig.task_id, RefusalCode::AccessSet),
                        &mut events,
                    );
                }
                PrecomputedKind::BadReduction => {
                    emit(
                        ctx,
                        AuditEvent::refused(orig.task_id, RefusalCode::Reduction),
                        &mut events,
                    );
                }
                PrecomputedKind::Candidate(working, decision) => {
                    // `lookup_access_set` already resolved during
                    // precompute; re-resolving here is an `O(1)` map
                    // lookup, cheaper than threading a borrow out of the
                    // worker closures.
                    let Some(access) = ctx.lookup_access_set(working.access_set_id) else {
                        emit(
                            ctx,
                            AuditEvent::refused(orig.task_id, RefusalCode::AccessSet),
                            &mut events,
                        );
                        continue;
                    };
                    let conflict = phase_access
                        .iter()
                        .any(|committed| crate::access::detect_access_conflicts(access, committed));
                    if conflict {
                        emit(
                            ctx,
                            AuditEvent::refused(orig.task_id, RefusalCode::Conflict),
                            &mut events,
                        );
                    } else {
                        emit(
                            ctx,
                            AuditEvent::plain(EventKind::Admitted, orig.task_id),
                            &mut events,
                        );
                        sink.on_task(working, decision);
                        emit(
                            ctx,
                            AuditEvent::plain(EventKind::Executed, orig.task_id),
                            &mut events,
                        );
                        phase_commits.push(working.as_ref().clone());
                        phase_access.push(access.clone());
                    }
                }
            }
        }

        let mut committed = phase_commits;
        stable_task_sort(&mut committed);
        for task in &committed {
            emit(ctx, AuditEvent::plain(EventKind::Committed, task.task_id), &mut events);
        }
        tracing::debug!(phase = phase_id.0, committed = committed.len(), "phase end (parallel)");
    }

    Ok(events)
}

/// Evaluates every task in `tasks` (a phase-local slice) in parallel,
/// partitioned into contiguous chunks across scoped worker threads, and
/// returns the per-task outcomes in the same order as `tasks`.
fn evaluate_phase_parallel(
    scheduler: &ParallelScheduler,
    ctx: &ExecutionContext,
    tasks: &[TaskNode],
) -> Vec<Precomputed> {
    let phase_count = tasks.len();
    if phase_count == 0 {
        return Vec::new();
    }

    let worker_count = scheduler.worker_count(phase_count);
    let chunk_size = (phase_count + worker_count - 1) / worker_count.max(1);
    let chunk_size = chunk_size.max(1);

    let mut outcomes: Vec<Option<Precomputed>> = (0..phase_count).map(|_| None).collect();
    thread::scope(|scope| {
        let mut handles = Vec::new();
        for (chunk_index, chunk) in tasks.chunks(chunk_size).enumerate() {
            let base = chunk_index * chunk_size;
            handles.push(scope.spawn(move || {
                chunk
                    .iter()
                    .enumerate()
                    .map(|(offset, task)| (base + offset, evaluate_one(ctx, task)))
                    .collect::<Vec<_>>()
            }));
        }
        for handle in handles {
            if let Ok(results) = handle.join() {
                for (index, outcome) in results {
                    outcomes[index] = Some(outcome);
                }
            }
        }
    });

    outcomes
        .into_iter()
        .map(|o| o.unwrap_or(Precomputed {
            transformed: false,
            kind: PrecomputedKind::RefusedLaw(RefusalCode::Custom(0)),
        }))
        .collect()
}

/// Topological visit order for a phase: repeatedly pick the
/// lowest-indexed, not-yet-visited, zero-in-degree node. Mirrors
/// [`super::single_thread`]'s inner loop exactly, but as a pure function
/// with no side effects, so it can run ahead of (and independent from) the
/// parallel evaluation pass.
fn kahn_visit_order(phase_count: usize, local_edges: &[(usize, usize)]) -> Vec<usize> {
    let mut indegree = vec![0u32; phase_count];
    for &(_, to) in local_edges {
        indegree[to] += 1;
    }
    let mut scheduled = vec![false; phase_count];
    let mut order = Vec::with_capacity(phase_count);
    for _ in 0..phase_count {
        let Some(pick) = (0..phase_count).find(|&i| !scheduled[i] && indegree[i] == 0) else {
            break;
        };
        scheduled[pick] = true;
        order.push(pick);
        for &(from, to) in local_edges {
            if from == pick && indegree[to] > 0 {
                indegree[to] -= 1;
            }
        }
    }
    order
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::access::{AccessRange, AccessSet, RangeKind};
    use crate::context::DeterminismMode;
    use crate::graph::DependencyEdge;
    use crate::hash::hash_committed_events;
    use crate::ident::{
        AccessSetId, ActorRef, CapabilitySetRef, CostModelId, LawScopeRef, PhaseId, SubIndex,
        SystemId, Tick,
    };
    use crate::scheduler::single_thread::SingleThreadScheduler;
    use crate::task::{CommitKey, DeterminismClass, FidelityTier, TaskCategory};
    use bytes::Bytes;

    fn task(task_id: u64, phase: u32, access_set_id: u64) -> TaskNode {
        TaskNode {
            task_id: TaskId(task_id),
            system_id: SystemId(0),
            category: TaskCategory::Derived,
            determinism_class: DeterminismClass::Strict,
            fidelity_tier: FidelityTier::Macro,
            next_due_tick: Tick::INVALID,
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

    fn write_only_access(id: u64, start: u64, end: u64) -> AccessSet {
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

    fn mixed_graph() -> TaskGraph {
        let mut graph = TaskGraph {
            graph_id: 7,
            epoch_id: 1,
            tasks: vec![
                task(1, 0, 1),
                task(2, 0, 2),
                task(3, 0, 3),
                task(4, 1, 4),
                task(5, 1, 1), // conflicts with task 1's range once committed
            ],
            edges: vec![DependencyEdge {
                from_task_id: TaskId(3),
                to_task_id: TaskId(2),
                reason_id: 0,
            }],
            barriers: Vec::new(),
        };
        stable_task_sort(&mut graph.tasks);
        graph
    }

    fn mixed_ctx() -> ExecutionContext {
        let mut ctx = ExecutionContext::new(DeterminismMode::Strict);
        ctx.insert_access_set(AccessSetId(1), write_only_access(1, 0, 10));
        ctx.insert_access_set(AccessSetId(2), write_only_access(2, 100, 110));
        ctx.insert_access_set(AccessSetId(3), write_only_access(3, 200, 210));
        ctx.insert_access_set(AccessSetId(4), write_only_access(4, 300, 310));
        ctx
    }

    /// S5: the parallel backend's commit hash matches the single-thread
    /// reference backend's, for a graph spanning several phases with a
    /// cross-phase AccessSet conflict.
    #[test]
    fn s5_parallel_matches_single_thread_commit_hash() {
        let graph = mixed_graph();

        let single = SingleThreadScheduler;
        let mut single_sink = |_: &TaskNode, _: &LawDecision| {};
        let single_events = single
            .schedule(&graph, &mixed_ctx(), &mut single_sink)
            .unwrap();

        let parallel = ParallelScheduler::with_max_workers(4);
        let mut parallel_sink = |_: &TaskNode, _: &LawDecision| {};
        let parallel_events = parallel
            .schedule(&graph, &mixed_ctx(), &mut parallel_sink)
            .unwrap();

        assert_eq!(
            hash_committed_events(&single_events),
            hash_committed_events(&parallel_events)
        );

        let committed_ids = |events: &[AuditEvent]| -> Vec<TaskId> {
            events
                .iter()
                .filter(|e| matches!(e.kind, EventKind::Committed))
                .map(|e| e.task_id)
                .collect()
        };
        assert_eq!(committed_ids(&single_events), committed_ids(&parallel_events));
    }

    #[test]
    fn single_task_phase_runs_with_one_worker() {
        let mut graph = TaskGraph {
            graph_id: 1,
            epoch_id: 1,
            tasks: vec![task(1, 0, 1)],
            edges: Vec::new(),
            barriers: Vec::new(),
        };
        stable_task_sort(&mut graph.tasks);
        let mut ctx = ExecutionContext::new(DeterminismMode::Strict);
        ctx.insert_access_set(AccessSetId(1), write_only_access(1, 0, 10));

        let scheduler = ParallelScheduler::with_max_workers(1);
        let mut sink = |_: &TaskNode, _: &LawDecision| {};
        let events = scheduler.schedule(&graph, &ctx, &mut sink).unwrap();
        assert!(events
            .iter()
            .any(|e| matches!(e.kind, EventKind::Committed) && e.task_id == TaskId(1)));
    }

    #[test]
    fn invalid_graph_returns_error_before_any_event() {
        let graph = TaskGraph {
            graph_id: 1,
            epoch_id: 1,
            tasks: Vec::new(),
            edges: Vec::new(),
            barriers: Vec::new(),
        };
        let ctx = ExecutionContext::new(DeterminismMode::Strict);
        let scheduler = ParallelScheduler::default();
        let mut sink = |_: &TaskNode, _: &LawDecision| {};
        assert!(scheduler.schedule(&graph, &ctx, &mut sink).is_err());
    }
}
