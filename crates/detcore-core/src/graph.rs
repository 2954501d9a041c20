// SPDX-License-Identifier: Apache-2.0
//! The Task IR graph: tasks, dependency edges, and phase barriers.

use crate::ident::{PhaseId, TaskId};
use crate::task::TaskNode;

/// A forward dependency: `from` must commit before `to` is admitted in the
/// same run. Invariant: `phase(from) <= phase(to)`; the full edge set must
/// induce a DAG over the task set (checked by
/// [`crate::validate::validate_graph`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DependencyEdge {
    /// Task that must commit first.
    pub from_task_id: TaskId,
    /// Task that depends on `from_task_id`.
    pub to_task_id: TaskId,
    /// Caller-assigned reason code, not interpreted by the core.
    pub reason_id: u32,
}

/// An optional synchronization point: every task of `phase_id` must commit
/// before any task of a later phase begins admission. Schedulers honor this
/// implicitly by processing phases in ascending order; `PhaseBarrier` exists
/// so callers can assert the boundary explicitly in a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PhaseBarrier {
    /// Phase this barrier closes.
    pub phase_id: PhaseId,
}

/// A complete, validated (or pending-validation) unit of schedulable work.
///
/// Invariant: `tasks` is sorted by the canonical comparator
/// ([`crate::order::task_cmp`]) before being passed to a scheduler; use
/// [`crate::order::stable_task_sort`] to establish it and
/// [`crate::order::graph_is_sorted`] to check it.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TaskGraph {
    /// Identity of this graph, carried through splitting unchanged.
    pub graph_id: u64,
    /// Logical epoch this graph was built for, carried through splitting.
    pub epoch_id: u64,
    /// Tasks, sorted by the canonical comparator.
    pub tasks: Vec<TaskNode>,
    /// Forward dependency edges.
    pub edges: Vec<DependencyEdge>,
    /// Declared phase barriers, in ascending phase order.
    pub barriers: Vec<PhaseBarrier>,
}

impl TaskGraph {
    /// Returns the index of `task_id` within `tasks`, if present.
    #[must_use]
    pub fn index_of(&self, task_id: TaskId) -> Option<usize> {
        self.tasks.iter().position(|t| t.task_id == task_id)
    }

    /// Returns the contiguous slice of `tasks` belonging to `phase_id`.
    ///
    /// Relies on `tasks` being sorted by the canonical comparator, which
    /// groups a phase into one contiguous run.
    #[must_use]
    pub fn phase_slice(&self, phase_id: PhaseId) -> &[TaskNode] {
        let (start, end) = self.phase_bounds(phase_id);
        &self.tasks[start..end]
    }

    /// Returns the `[start, end)` index range of `tasks` belonging to
    /// `phase_id`, for callers that need absolute indices alongside the
    /// slice (e.g. to map edge endpoints to phase-local positions).
    #[must_use]
    pub fn phase_bounds(&self, phase_id: PhaseId) -> (usize, usize) {
        let start = self.tasks.partition_point(|t| t.phase_id < phase_id);
        let end = self.tasks.partition_point(|t| t.phase_id <= phase_id);
        (start, end)
    }

    /// Returns the distinct phase ids present, in ascending order.
    #[must_use]
    pub fn phases(&self) -> Vec<PhaseId> {
        let mut phases: Vec<PhaseId> = self.tasks.iter().map(|t| t.phase_id).collect();
        phases.dedup();
        phases
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::ident::{
        AccessSetId, ActorRef, CapabilitySetRef, CostModelId, LawScopeRef, SubIndex, SystemId,
        Tick,
    };
    use crate::task::{CommitKey, DeterminismClass, FidelityTier, TaskCategory};
    use bytes::Bytes;

    fn task(task_id: u64, phase: u32) -> TaskNode {
        TaskNode {
            task_id: TaskId(task_id),
            system_id: SystemId(0),
            category: TaskCategory::Derived,
            determinism_class: DeterminismClass::Strict,
            fidelity_tier: FidelityTier::Macro,
            next_due_tick: Tick::INVALID,
            access_set_id: AccessSetId(1),
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

    #[test]
    fn phase_slice_is_contiguous() {
        let graph = TaskGraph {
            graph_id: 1,
            epoch_id: 1,
            tasks: vec![task(1, 0), task(2, 0), task(3, 1)],
            edges: Vec::new(),
            barriers: Vec::new(),
        };
        assert_eq!(graph.phase_slice(PhaseId(0)).len(), 2);
        assert_eq!(graph.phase_slice(PhaseId(1)).len(), 1);
        assert_eq!(graph.phase_slice(PhaseId(2)).len(), 0);
    }

    #[test]
    fn phases_are_deduplicated() {
        let graph = TaskGraph {
            graph_id: 1,
            epoch_id: 1,
            tasks: vec![task(1, 0), task(2, 0), task(3, 1)],
            edges: Vec::new(),
            barriers: Vec::new(),
        };
        assert_eq!(graph.phases(), vec![PhaseId(0), PhaseId(1)]);
    }
}
