// SPDX-License-Identifier: Apache-2.0
//! The single-thread reference scheduler (§4.5): the semantic ground truth
//! every other backend must match in observable output.

use rustc_hash::FxHashMap;

use crate::access::{detect_access_conflicts, verify_reduction_rules, AccessSet};
use crate::context::{AuditEvent, DecisionKind, EventKind, ExecutionContext, Sink};
use crate::error::{RefusalCode, ScheduleError};
use crate::graph::TaskGraph;
use crate::ident::TaskId;
use crate::order::stable_task_sort;
use crate::task::TaskNode;
use crate::validate::validate_graph;

use super::Scheduler;

/// The single-threaded cooperative reference backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct SingleThreadScheduler;

impl Scheduler for SingleThreadScheduler {
    fn schedule(
        &self,
        graph: &TaskGraph,
        ctx: &ExecutionContext,
        sink: &mut dyn Sink,
    ) -> Result<Vec<AuditEvent>, ScheduleError> {
        schedule(graph, ctx, sink)
    }
}

/// Runs `graph` to completion against `ctx`, phase by phase, in the order
/// documented by §4.5. Returns the complete, ordered audit-event stream.
///
/// # Errors
/// Returns [`ScheduleError::InvalidGraph`] if `graph` fails validation
/// before any side effect.
#[tracing::instrument(skip(graph, ctx, sink), fields(graph_id = graph.graph_id, epoch_id = graph.epoch_id))]
pub fn schedule(
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
        tracing::debug!(phase = phase_id.0, count = phase_count, "phase begin");

        // Local (to this phase) edges, expressed as phase-relative indices.
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

        let mut indegree = vec![0u32; phase_count];
        for &(_, to) in &local_edges {
            indegree[to] += 1;
        }
        let mut scheduled = vec![false; phase_count];
        let mut phase_commits: Vec<(TaskNode, &AccessSet)> = Vec::with_capacity(phase_count);

        for _ in 0..phase_count {
            let Some(pick) = (0..phase_count).find(|&i| !scheduled[i] && indegree[i] == 0) else {
                break;
            };
            scheduled[pick] = true;
            let global_index = phase_start + pick;
            let orig = &graph.tasks[global_index];
            let mut working = orig.clone();

            let mut decision = ctx.evaluate_law(&working);
            if decision.kind == DecisionKind::Transform {
                emit(
                    ctx,
                    AuditEvent::transformed(orig.task_id),
                    &mut events,
                );
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

            match decision.kind {
                DecisionKind::Transform => {
                    // A second Transform is treated as a Refuse (§9 open question).
                    emit(
                        ctx,
                        AuditEvent::refused(orig.task_id, RefusalCode::Law),
                        &mut events,
                    );
                }
                DecisionKind::Refuse => {
                    let code = decision.refusal_code.unwrap_or(RefusalCode::Law);
                    emit(ctx, AuditEvent::refused(orig.task_id, code), &mut events);
                }
                DecisionKind::Accept | DecisionKind::Constrain => {
                    match ctx.lookup_access_set(working.access_set_id) {
                        None => {
                            emit(
                                ctx,
                                AuditEvent::refused(orig.task_id, RefusalCode::AccessSet),
                                &mut events,
                            );
                        }
                        Some(access) if !verify_reduction_rules(access) => {
                            emit(
                                ctx,
                                AuditEvent::refused(orig.task_id, RefusalCode::Reduction),
                                &mut events,
                            );
                        }
                        Some(access) => {
                            let conflict = phase_commits
                                .iter()
                                .any(|(_, committed)| detect_access_conflicts(access, committed));
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
                                sink.on_task(&working, &decision);
                                emit(
                                    ctx,
                                    AuditEvent::plain(EventKind::Executed, orig.task_id),
                                    &mut events,
                                );
                                phase_commits.push((working, access));
                            }
                        }
                    }
                }
            }

            for &(from, to) in &local_edges {
                if from == pick && indegree[to] > 0 {
                    indegree[to] -= 1;
                }
            }
        }

        let mut committed: Vec<TaskNode> =
            phase_commits.into_iter().map(|(task, _)| task).collect();
        stable_task_sort(&mut committed);
        for task in &committed {
            emit(
                ctx,
                AuditEvent::plain(EventKind::Committed, task.task_id),
                &mut events,
            );
        }
        tracing::debug!(phase = phase_id.0, committed = committed.len(), "phase end");
    }

    Ok(events)
}
