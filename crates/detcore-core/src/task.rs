// SPDX-License-Identifier: Apache-2.0
//! Task nodes: the unit of work admitted and executed by a scheduler.
//!
//! `TaskNode` is immutable from the scheduler's viewpoint; a law verdict of
//! `Transform` mutates a working copy (see `scheduler::single_thread`), never
//! the node stored in the graph.

use bytes::Bytes;

use crate::ident::{
    AccessSetId, ActorRef, CapabilitySetRef, CostModelId, LawScopeRef, LawTargetId, PhaseId,
    SubIndex, SystemId, TaskId, Tick,
};

/// Coarse classification of a task's authority over simulation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TaskCategory {
    /// Subject to law evaluation; must carry a non-empty `law_targets` list.
    Authoritative,
    /// Computed from authoritative state; not law-evaluated.
    Derived,
    /// View-only work with no simulation-state effect.
    Presentation,
}

/// Determinism contract a task's effects are expected to uphold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DeterminismClass {
    /// Effects must be bit-identical across backends and replays.
    Strict,
    /// Effects depend on a declared, preserved order.
    Ordered,
    /// Effects commute; any admission order yields the same result.
    Commutative,
    /// Effects are recomputed from other committed state.
    Derived,
}

/// Declared execution quality; ordered so the law layer may downgrade it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FidelityTier {
    /// Lowest fidelity: may be skipped or heavily approximated.
    Latent,
    /// Coarse-grained simulation.
    Macro,
    /// Fine-grained simulation.
    Micro,
    /// Highest fidelity, reserved for focal subjects.
    Focus,
}

/// The canonical ordering key for Committed events: `(phase_id, task_id,
/// sub_index)`. Invariant: `commit_key.phase_id == task.phase_id` and
/// `commit_key.task_id == task.task_id`; enforced by
/// [`crate::validate::validate_task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CommitKey {
    /// Phase the commit belongs to.
    pub phase_id: PhaseId,
    /// Task identity within that phase.
    pub task_id: TaskId,
    /// Tie-breaker for fan-out tasks sharing a task id.
    pub sub_index: SubIndex,
}

/// A unit of work admitted and executed by a scheduler.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TaskNode {
    /// Unique id, stable across runs.
    pub task_id: TaskId,
    /// Producer id.
    pub system_id: SystemId,
    /// Authority classification.
    pub category: TaskCategory,
    /// Determinism contract.
    pub determinism_class: DeterminismClass,
    /// Declared execution quality.
    pub fidelity_tier: FidelityTier,
    /// Logical due tick, or `Tick::INVALID`.
    pub next_due_tick: Tick,
    /// Handle into caller-owned `AccessSet` storage; never zero.
    pub access_set_id: AccessSetId,
    /// Handle into caller-owned cost-model storage; never zero.
    pub cost_model_id: CostModelId,
    /// Non-empty iff `category == Authoritative`.
    pub law_targets: Vec<LawTargetId>,
    /// Phase this task is processed in; ascending across a schedule call.
    pub phase_id: PhaseId,
    /// Canonical ordering key; must agree with `phase_id`/`task_id`.
    pub commit_key: CommitKey,
    /// Law scope this task is evaluated under; never zero.
    pub law_scope_ref: LawScopeRef,
    /// Opaque actor reference, not interpreted by the core.
    pub actor_ref: ActorRef,
    /// Opaque capability-set reference, not interpreted by the core.
    pub capability_set_ref: CapabilitySetRef,
    /// Opaque policy parameters, may be empty.
    pub policy_params: Bytes,
}

impl TaskNode {
    /// Returns true iff `category == Authoritative`.
    #[must_use]
    pub fn is_authoritative(&self) -> bool {
        matches!(self.category, TaskCategory::Authoritative)
    }
}
