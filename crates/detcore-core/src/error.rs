// SPDX-License-Identifier: Apache-2.0
//! Stable numeric status/refusal codes and the typed errors they back.
//!
//! The numeric codes in this module are the wire/FFI-level projection of
//! the Rust error types; they are preserved exactly because fixture-driven
//! regression tests key on them (§9).

use thiserror::Error;

use crate::ident::TaskId;

/// Stable numeric refusal cause (§6): `INVALID_GRAPH=1, LAW=2, CONFLICT=3,
/// REDUCTION=4, ACCESS_SET=5`. Every `Refused` audit event carries the most
/// specific code that applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefusalCode {
    /// The graph itself failed validation (surfaced as an audit cause only
    /// when a caller chooses to report it that way; normally validation
    /// aborts the call before any audit activity, see [`ValidationError`]).
    InvalidGraph,
    /// The law callback refused the task, or a second `Transform` verdict
    /// was treated as a refusal.
    Law,
    /// `detect_access_conflicts` found a conflict with an already-committed
    /// task in this phase.
    Conflict,
    /// `verify_reduction_rules` failed for the task's AccessSet.
    Reduction,
    /// `lookup_access_set` returned `None` for the task's `access_set_id`.
    AccessSet,
    /// A caller-supplied code outside the five reserved causes above (e.g.
    /// the literal refusal codes used in `law_eval` test fixtures).
    Custom(u32),
}

impl RefusalCode {
    /// The stable numeric code for this cause.
    #[must_use]
    pub fn code(self) -> u32 {
        match self {
            RefusalCode::InvalidGraph => 1,
            RefusalCode::Law => 2,
            RefusalCode::Conflict => 3,
            RefusalCode::Reduction => 4,
            RefusalCode::AccessSet => 5,
            RefusalCode::Custom(code) => code,
        }
    }
}

/// Validation errors (§4.3/§7): malformed inputs detected before any side
/// effect. These abort `schedule`/`split`/`execute` with no audit activity
/// beyond validation's own early return.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The graph carries no tasks.
    #[error("task graph is empty")]
    EmptyGraph,
    /// `tasks` is not sorted by the canonical comparator.
    #[error("task graph is not sorted by the canonical comparator")]
    UnsortedGraph,
    /// A task's `access_set_id` or `law_scope_ref` was zero.
    #[error("task {0} has a zero-valued access_set_id or law_scope_ref")]
    ZeroHandle(TaskId),
    /// `category == Authoritative` but `law_targets` was empty, or vice
    /// versa.
    #[error("task {0} violates the Authoritative/law_targets invariant")]
    LawTargetsMismatch(TaskId),
    /// `commit_key.phase_id`/`task_id` disagree with the task's own fields.
    #[error("task {0} has a commit_key that disagrees with its phase_id/task_id")]
    CommitKeyMismatch(TaskId),
    /// An edge endpoint does not resolve to a task in the graph.
    #[error("dependency edge references unknown task {0}")]
    DanglingEdge(TaskId),
    /// An edge points from a later phase to an earlier one.
    #[error("dependency edge from task {from} to task {to} goes backward in phase")]
    BackwardEdge {
        /// The edge's source task.
        from: TaskId,
        /// The edge's target task.
        to: TaskId,
    },
    /// The dependency edge set contains a cycle.
    #[error("task graph contains a dependency cycle")]
    Cycle,
}

/// Top-level error/status returned by `schedule` (§6/§7): `OK` is `Ok(())`;
/// everything else maps to the stable `status` codes `INVALID_GRAPH=1` and
/// `ALLOC_FAIL` via [`ScheduleError::status_code`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// The graph failed structural validation; see the wrapped cause.
    #[error("invalid graph: {0}")]
    InvalidGraph(#[from] ValidationError),
    /// Scratch-arena allocation failed before any phase began.
    #[error("scratch-arena allocation failed for {requested} scalar slots")]
    AllocFail {
        /// Number of scalar slots the arena needed.
        requested: usize,
    },
}

impl ScheduleError {
    /// The stable numeric status code for this error (§6): `INVALID_GRAPH`
    /// is `1`, `ALLOC_FAIL` is `2`. `OK` (`0`) is represented as `Ok(())`
    /// in the Rust API and has no `ScheduleError` variant.
    #[must_use]
    pub fn status_code(&self) -> u32 {
        match self {
            ScheduleError::InvalidGraph(_) => 1,
            ScheduleError::AllocFail { .. } => 2,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn refusal_codes_match_stable_numeric_ids() {
        assert_eq!(RefusalCode::InvalidGraph.code(), 1);
        assert_eq!(RefusalCode::Law.code(), 2);
        assert_eq!(RefusalCode::Conflict.code(), 3);
        assert_eq!(RefusalCode::Reduction.code(), 4);
        assert_eq!(RefusalCode::AccessSet.code(), 5);
        assert_eq!(RefusalCode::Custom(42).code(), 42);
    }

    #[test]
    fn schedule_error_status_codes_are_stable() {
        assert_eq!(
            ScheduleError::InvalidGraph(ValidationError::EmptyGraph).status_code(),
            1
        );
        assert_eq!(ScheduleError::AllocFail { requested: 10 }.status_code(), 2);
    }
}
