// SPDX-License-Identifier: Apache-2.0
//! Shard Executor (§4.9): runs one shard's subgraph through any conformant
//! scheduler backend, admitting only locally-owned tasks, and forwards
//! outbound cross-shard messages once their source tasks commit.

use detcore_core::{
    AuditEvent, EventKind, ExecutionContext, ScheduleError, Scheduler, Sink, TaskGraph, TaskId,
    TaskNode, Tick,
};

use crate::error::{AccessKind, PlacementError};
use crate::message::{MessageBus, ShardMessage};
use crate::registry::{ShardId, ShardRegistry};

/// One entry appended to a [`ShardExecutor`]'s log for every task the
/// underlying scheduler admits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogEntry {
    /// Always [`EventKind::Executed`]: the log records admitted work, not
    /// the full audit stream (that is still available from the scheduler's
    /// return value/`ctx`'s audit sink).
    pub event_id: EventKind,
    /// The admitted task.
    pub task_id: TaskId,
    /// The admitted task's (possibly law-transformed) due tick.
    pub tick: Tick,
}

/// Runs a single shard's subgraph. Owns the shard's identity, the bounded
/// outbound bus, the commit log, and the bounded accepted-task-id array;
/// the scheduler backend and execution context are supplied per call so
/// one executor can be reused across shards or runs.
pub struct ShardExecutor {
    shard_id: ShardId,
    bus: MessageBus,
    log: Vec<LogEntry>,
    accepted: Vec<TaskId>,
}

/// Collects `{event_id, task_id, tick}` into the executor's log and
/// `task_id` into its accepted-task array as the scheduler admits work;
/// never refuses or re-enters the scheduler itself (§5: sinks must be
/// non-blocking and must not re-enter the scheduler).
struct LogSink<'a> {
    log: &'a mut Vec<LogEntry>,
    accepted: &'a mut Vec<TaskId>,
}

impl Sink for LogSink<'_> {
    fn on_task(&mut self, task_view: &TaskNode, _decision: &detcore_core::LawDecision) {
        self.log.push(LogEntry {
            event_id: EventKind::Executed,
            task_id: task_view.task_id,
            tick: task_view.next_due_tick,
        });
        self.accepted.push(task_view.task_id);
    }
}

impl ShardExecutor {
    /// Constructs an executor for `shard_id`, with an outbound bus bounded
    /// at `bus_capacity`.
    #[must_use]
    pub fn new(shard_id: ShardId, bus_capacity: usize) -> Self {
        Self {
            shard_id,
            bus: MessageBus::new(bus_capacity),
            log: Vec::new(),
            accepted: Vec::new(),
        }
    }

    /// This executor's shard identity.
    #[must_use]
    pub fn shard_id(&self) -> ShardId {
        self.shard_id
    }

    /// The commit log accumulated across every `execute` call so far.
    #[must_use]
    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    /// The outbound message bus; messages land here once their source
    /// task has committed and `execute` has processed `outbound_messages`.
    #[must_use]
    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    /// Mutable access to the outbound bus, for callers draining it with
    /// [`MessageBus::pop_ready`] between `execute` calls.
    pub fn bus_mut(&mut self) -> &mut MessageBus {
        &mut self.bus
    }

    /// Runs `subgraph` to completion against `scheduler`/`ctx` (§4.9):
    ///
    /// 1. Every Authoritative task's owner must validate as a local Write;
    ///    a misplaced task aborts with [`PlacementError::Refused`] before
    ///    any sink activity.
    /// 2. The scheduler runs with a local sink that logs every admitted
    ///    task and records its id into the accepted-task array.
    /// 3. The accepted array is stably sorted.
    /// 4. Every outbound message sourced from this shard whose task is in
    ///    the accepted array is enqueued onto the bus.
    ///
    /// Returns the full audit-event stream the scheduler produced.
    ///
    /// # Errors
    /// Returns [`ExecuteError::Placement`] if step 1 rejects a task, or
    /// [`ExecuteError::Schedule`] if the scheduler itself errors (e.g. an
    /// invalid subgraph).
    #[tracing::instrument(skip(self, scheduler, subgraph, registry, ctx, outbound_messages), fields(shard_id = self.shard_id.0, graph_id = subgraph.graph_id))]
    pub fn execute<S: Scheduler>(
        &mut self,
        scheduler: &S,
        subgraph: &TaskGraph,
        registry: &ShardRegistry,
        ctx: &ExecutionContext,
        outbound_messages: &[ShardMessage],
    ) -> Result<Vec<AuditEvent>, ExecuteError> {
        for task in &subgraph.tasks {
            if !task.is_authoritative() {
                continue;
            }
            let Some(access) = ctx.lookup_access_set(task.access_set_id) else {
                return Err(ExecuteError::Placement(PlacementError::Refused {
                    task_id: task.task_id,
                }));
            };
            let owner_id = access.owner_id();
            if registry
                .validate_access(self.shard_id, owner_id, AccessKind::Write)
                .is_err()
            {
                return Err(ExecuteError::Placement(PlacementError::Refused {
                    task_id: task.task_id,
                }));
            }
        }

        let round_start = self.accepted.len();
        let mut sink = LogSink {
            log: &mut self.log,
            accepted: &mut self.accepted,
        };
        let events = scheduler
            .schedule(subgraph, ctx, &mut sink)
            .map_err(ExecuteError::Schedule)?;

        let this_round = &mut self.accepted[round_start..];
        this_round.sort_unstable();
        let accepted_this_round: Vec<TaskId> = this_round.to_vec();

        for message in outbound_messages {
            if message.source_shard == self.shard_id
                && accepted_this_round.contains(&message.task_id)
            {
                // A full outbound queue is a caller sizing error, not a
                // scheduling failure; dropping here would silently corrupt
                // the replay-equivalence property (§4.9), so surface it.
                self.bus
                    .enqueue(message.clone())
                    .map_err(ExecuteError::BusFull)?;
            }
        }

        tracing::debug!(
            accepted = accepted_this_round.len(),
            enqueued = self.bus.len(),
            "shard execute complete"
        );
        Ok(events)
    }
}

/// Error returned by [`ShardExecutor::execute`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecuteError {
    /// A task's owner does not resolve to this shard for Write access.
    #[error(transparent)]
    Placement(#[from] PlacementError),
    /// The underlying scheduler returned an error.
    #[error("scheduler error: {0}")]
    Schedule(ScheduleError),
    /// The outbound message bus is at capacity.
    #[error(transparent)]
    BusFull(#[from] crate::message::BusFullError),
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use detcore_core::{
        AccessRange, AccessSet, ActorRef, CapabilitySetRef, CommitKey, CostModelId,
        DeterminismClass, DeterminismMode, FidelityTier, LawScopeRef, LawTargetId, PhaseId,
        RangeKind, SingleThreadScheduler, SubIndex, SystemId, TaskCategory,
    };
    use detcore_core::{stable_task_sort, AccessSetId};
    use bytes::Bytes;

    use crate::registry::{Shard, ShardScope, ShardScopeKind};

    fn authoritative_task(task_id: u64, phase: u32, access_set_id: u64) -> TaskNode {
        TaskNode {
            task_id: TaskId(task_id),
            system_id: SystemId(0),
            category: TaskCategory::Authoritative,
            determinism_class: DeterminismClass::Strict,
            fidelity_tier: FidelityTier::Macro,
            next_due_tick: Tick(1),
            access_set_id: AccessSetId(access_set_id),
            cost_model_id: CostModelId(1),
            law_targets: vec![LawTargetId(1)],
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

    fn registry() -> ShardRegistry {
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
        registry
    }

    #[test]
    fn locally_owned_task_executes_and_logs() {
        let mut graph = TaskGraph {
            graph_id: 1,
            epoch_id: 1,
            tasks: vec![authoritative_task(1, 0, 1)],
            edges: Vec::new(),
            barriers: Vec::new(),
        };
        stable_task_sort(&mut graph.tasks);

        let mut ctx = ExecutionContext::new(DeterminismMode::Strict);
        ctx.insert_access_set(AccessSetId(1), write_access(1, 0, 10));

        let mut executor = ShardExecutor::new(ShardId(1), 16);
        let events = executor
            .execute(&SingleThreadScheduler, &graph, &registry(), &ctx, &[])
            .unwrap();
        assert!(events
            .iter()
            .any(|e| matches!(e.kind, EventKind::Committed) && e.task_id == TaskId(1)));
        assert_eq!(executor.log().len(), 1);
        assert_eq!(executor.log()[0].task_id, TaskId(1));
    }

    #[test]
    fn misplaced_authoritative_task_is_refused_before_scheduling() {
        let mut graph = TaskGraph {
            graph_id: 1,
            epoch_id: 1,
            tasks: vec![authoritative_task(1, 0, 1)],
            edges: Vec::new(),
            barriers: Vec::new(),
        };
        stable_task_sort(&mut graph.tasks);

        let mut ctx = ExecutionContext::new(DeterminismMode::Strict);
        // Owned by a different shard's range.
        ctx.insert_access_set(AccessSetId(1), write_access(1, 5000, 5010));

        let mut executor = ShardExecutor::new(ShardId(1), 16);
        let err = executor
            .execute(&SingleThreadScheduler, &graph, &registry(), &ctx, &[])
            .unwrap_err();
        assert!(matches!(err, ExecuteError::Placement(_)));
        assert!(executor.log().is_empty());
    }

    #[test]
    fn outbound_message_enqueues_only_when_source_task_accepted() {
        let mut graph = TaskGraph {
            graph_id: 1,
            epoch_id: 1,
            tasks: vec![authoritative_task(1, 0, 1)],
            edges: Vec::new(),
            barriers: Vec::new(),
        };
        stable_task_sort(&mut graph.tasks);

        let mut ctx = ExecutionContext::new(DeterminismMode::Strict);
        ctx.insert_access_set(AccessSetId(1), write_access(1, 0, 10));

        let outbound = vec![ShardMessage {
            source_shard: ShardId(1),
            target_shard: ShardId(2),
            task_id: TaskId(1),
            message_id: ShardMessage::compute_message_id(TaskId(1), TaskId(99)),
            arrival_tick: Tick(5),
            payload: None,
        }];

        let mut executor = ShardExecutor::new(ShardId(1), 16);
        executor
            .execute(&SingleThreadScheduler, &graph, &registry(), &ctx, &outbound)
            .unwrap();
        assert_eq!(executor.bus().len(), 1);
    }
}
