// SPDX-License-Identifier: Apache-2.0
//! Canonical task ordering.
//!
//! Ordering invariant
//! - Tasks compare by `(phase_id, system_id, task_id, commit_key.sub_index)`
//!   ascending. This ordering is stable across platforms and runs; every
//!   scheduler backend relies on a pre-sorted `TaskGraph` to treat each
//!   phase as a contiguous slice and to pick "the lowest-index ready task"
//!   deterministically.

use std::cmp::Ordering;

use crate::task::TaskNode;

/// Compares two tasks by the canonical key: `(phase_id, system_id, task_id,
/// commit_key.sub_index)`, ascending.
#[must_use]
pub fn task_cmp(a: &TaskNode, b: &TaskNode) -> Ordering {
    a.phase_id
        .cmp(&b.phase_id)
        .then_with(|| a.system_id.cmp(&b.system_id))
        .then_with(|| a.task_id.cmp(&b.task_id))
        .then_with(|| a.commit_key.sub_index.cmp(&b.commit_key.sub_index))
}

/// Sorts `tasks` in place by [`task_cmp`]. Stable: tasks that compare equal
/// keep their original relative order.
pub fn stable_task_sort(tasks: &mut [TaskNode]) {
    tasks.sort_by(task_cmp);
}

/// Returns true iff `task_cmp` is non-decreasing across every adjacent pair.
#[must_use]
pub fn graph_is_sorted(tasks: &[TaskNode]) -> bool {
    tasks
        .windows(2)
        .all(|pair| task_cmp(&pair[0], &pair[1]) != Ordering::Greater)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::ident::{
        AccessSetId, ActorRef, CapabilitySetRef, CostModelId, LawScopeRef, PhaseId, SubIndex,
        SystemId, TaskId, Tick,
    };
    use crate::task::{CommitKey, DeterminismClass, FidelityTier, TaskCategory};
    use bytes::Bytes;
    use proptest::prelude::*;

    fn task(task_id: u64, phase: u32, sub_index: u32) -> TaskNode {
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
                sub_index: SubIndex(sub_index),
            },
            law_scope_ref: LawScopeRef(1),
            actor_ref: ActorRef::default(),
            capability_set_ref: CapabilitySetRef::default(),
            policy_params: Bytes::new(),
        }
    }

    /// S1: stable ordering.
    #[test]
    fn s1_stable_ordering() {
        let mut tasks = vec![task(5, 2, 0), task(1, 1, 0), task(3, 1, 1)];
        stable_task_sort(&mut tasks);
        let ids: Vec<(u32, u64, u32)> = tasks
            .iter()
            .map(|t| (t.phase_id.0, t.task_id.0, t.commit_key.sub_index.0))
            .collect();
        assert_eq!(ids, vec![(1, 1, 0), (1, 3, 1), (2, 5, 0)]);
        assert!(graph_is_sorted(&tasks));
    }

    #[test]
    fn p1_sort_is_idempotent() {
        let mut tasks = vec![task(5, 2, 0), task(1, 1, 0), task(3, 1, 1), task(1, 1, 0)];
        stable_task_sort(&mut tasks);
        let once = tasks.clone();
        stable_task_sort(&mut tasks);
        assert_eq!(
            once.iter().map(|t| t.task_id).collect::<Vec<_>>(),
            tasks.iter().map(|t| t.task_id).collect::<Vec<_>>()
        );
        assert!(graph_is_sorted(&tasks));
    }

    #[test]
    fn unsorted_input_is_detected() {
        let tasks = vec![task(5, 2, 0), task(1, 1, 0)];
        assert!(!graph_is_sorted(&tasks));
    }

    proptest! {
        /// (P1): for any generated task list, sorting twice is the same as
        /// sorting once, and the result always satisfies `graph_is_sorted`.
        #[test]
        fn p1_sort_is_idempotent_for_generated_inputs(
            entries in prop::collection::vec((0u32..4, 0u32..3, 0u64..30, 0u32..4), 1..30)
        ) {
            let mut tasks: Vec<TaskNode> = entries
                .iter()
                .map(|&(phase, system, task_id, sub_index)| {
                    let mut t = task(task_id, phase, sub_index);
                    t.system_id = SystemId(system);
                    t
                })
                .collect();

            stable_task_sort(&mut tasks);
            let once: Vec<(PhaseId, SystemId, TaskId, SubIndex)> = tasks
                .iter()
                .map(|t| (t.phase_id, t.system_id, t.task_id, t.commit_key.sub_index))
                .collect();

            stable_task_sort(&mut tasks);
            let twice: Vec<(PhaseId, SystemId, TaskId, SubIndex)> = tasks
                .iter()
                .map(|t| (t.phase_id, t.system_id, t.task_id, t.commit_key.sub_index))
                .collect();

            prop_assert_eq!(once, twice);
            prop_assert!(graph_is_sorted(&tasks));
        }
    }
}
