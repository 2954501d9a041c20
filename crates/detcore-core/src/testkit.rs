// SPDX-License-Identifier: Apache-2.0
//! Determinism test harness (§4.11, ambient): a runnable analogue of (P4)
//! and (S5) — rather than leaving "two runs must hash identically" as a
//! paper invariant, this module gives integration tests a single call that
//! runs a pair of scheduler backends (or two modes of the same backend)
//! and reports a structured mismatch.

use crate::context::{AuditEvent, ExecutionContext, Sink};
use crate::error::ScheduleError;
use crate::graph::TaskGraph;
use crate::hash::hash_committed_events;
use crate::scheduler::Scheduler;

/// Error reporting a Committed-event hash mismatch between two runs,
/// naming both run labels and the hash each produced (§8 (P4)/(S5)).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismMismatch {
    /// Label of the first run (typically the reference backend).
    pub left_label: String,
    /// Commit hash the first run produced.
    pub left_hash: u64,
    /// Label of the second run (typically the backend under test).
    pub right_label: String,
    /// Commit hash the second run produced.
    pub right_hash: u64,
}

impl std::fmt::Display for DeterminismMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "commit hash mismatch: {} = {:#018x}, {} = {:#018x}",
            self.left_label, self.left_hash, self.right_label, self.right_hash
        )
    }
}

impl std::error::Error for DeterminismMismatch {}

/// Either half of a [`run_pair_determinism`] comparison failed to run at
/// all (as opposed to running and disagreeing).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeterminismCheckError {
    /// A run's `schedule` call itself returned an error.
    ScheduleFailed {
        /// Which run failed.
        label: String,
        /// The underlying schedule error.
        source: ScheduleError,
    },
    /// Both runs completed but their commit hashes disagree.
    Mismatch(DeterminismMismatch),
}

impl std::fmt::Display for DeterminismCheckError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeterminismCheckError::ScheduleFailed { label, source } => {
                write!(f, "run {label} failed to schedule: {source}")
            }
            DeterminismCheckError::Mismatch(mismatch) => write!(f, "{mismatch}"),
        }
    }
}

impl std::error::Error for DeterminismCheckError {}

/// One half of a determinism-pair run: a labeled scheduler backend plus
/// the graph/context it runs against.
pub struct RunSpec<'a, S: Scheduler> {
    /// Name used in mismatch reports (e.g. `"single-thread"`, `"parallel"`).
    pub label: &'a str,
    /// Backend under test.
    pub scheduler: &'a S,
    /// Graph this run schedules.
    pub graph: &'a TaskGraph,
    /// Context this run schedules against.
    pub ctx: &'a ExecutionContext,
}

/// Runs `left` and `right` to completion, hashes each run's Committed-event
/// stream under FNV-1a 64 (§4.4), and returns `Ok(())` iff they match.
///
/// This is the direct analogue of (P4): "for all runs with identical
/// inputs, the Committed-event sequence hashes identically." Callers
/// typically set `left` to the single-thread reference scheduler and
/// `right` to the backend under test, but the harness takes no sides: it
/// only compares.
///
/// # Errors
/// Returns [`DeterminismCheckError::ScheduleFailed`] if either run's
/// `schedule` call errors, or [`DeterminismCheckError::Mismatch`] if both
/// runs complete but their commit hashes disagree.
pub fn run_pair_determinism<L: Scheduler, R: Scheduler>(
    left: &RunSpec<'_, L>,
    right: &RunSpec<'_, R>,
) -> Result<(), DeterminismCheckError> {
    let left_events = run_one(left)?;
    let right_events = run_one(right)?;

    let left_hash = hash_committed_events(&left_events);
    let right_hash = hash_committed_events(&right_events);

    if left_hash != right_hash {
        return Err(DeterminismCheckError::Mismatch(DeterminismMismatch {
            left_label: left.label.to_string(),
            left_hash,
            right_label: right.label.to_string(),
            right_hash,
        }));
    }
    Ok(())
}

fn run_one<S: Scheduler>(spec: &RunSpec<'_, S>) -> Result<Vec<AuditEvent>, DeterminismCheckError> {
    let mut noop_sink = NoopSink;
    spec.scheduler
        .schedule(spec.graph, spec.ctx, &mut noop_sink)
        .map_err(|source| DeterminismCheckError::ScheduleFailed {
            label: spec.label.to_string(),
            source,
        })
}

struct NoopSink;

impl Sink for NoopSink {
    fn on_task(&mut self, _task_view: &crate::task::TaskNode, _decision: &crate::context::LawDecision) {}
}
