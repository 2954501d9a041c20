// SPDX-License-Identifier: Apache-2.0
//! Newtype identifiers for the Task IR.
//!
//! Every handle in the scheduler core is a plain integer newtype rather than
//! a content hash: task, system, phase, and access-set identity are assigned
//! by the caller's emitters and must compare by value alone.

use std::fmt;

/// 64-bit task identifier, stable across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TaskId(pub u64);

/// 32-bit producer identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SystemId(pub u32);

/// 32-bit phase identifier; phases are processed in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PhaseId(pub u32);

/// Tie-breaker within a `(phase_id, task_id)` pair, for fan-out tasks that
/// share a task id within one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SubIndex(pub u32);

/// Handle into caller-owned `AccessSet` storage; never zero for a valid node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AccessSetId(pub u64);

/// Handle into caller-owned cost-model storage; never zero for a valid node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CostModelId(pub u64);

/// Reference to the law scope a task is evaluated under; never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LawScopeRef(pub u64);

/// Opaque actor reference carried on a task, not interpreted by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActorRef(pub u64);

/// Opaque capability-set reference carried on a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CapabilitySetRef(pub u64);

/// Identifier assigned to a law target within a task's `law_targets` list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LawTargetId(pub u32);

/// Logical tick, or the `INVALID` sentinel meaning "not scheduled".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tick(pub u64);

impl Tick {
    /// Sentinel meaning "no due tick".
    pub const INVALID: Tick = Tick(u64::MAX);

    /// Returns true if this tick is the `INVALID` sentinel.
    #[must_use]
    pub fn is_invalid(self) -> bool {
        self == Self::INVALID
    }
}

macro_rules! impl_display_for_newtype {
    ($ty:ident) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

impl_display_for_newtype!(TaskId);
impl_display_for_newtype!(SystemId);
impl_display_for_newtype!(PhaseId);
impl_display_for_newtype!(SubIndex);
impl_display_for_newtype!(AccessSetId);
impl_display_for_newtype!(CostModelId);
impl_display_for_newtype!(Tick);
