// SPDX-License-Identifier: Apache-2.0
//! Scheduler backends: a single-threaded reference implementation and a
//! parallel one that must be externally indistinguishable from it (§4.6).

pub mod parallel;
pub mod single_thread;

use crate::context::{AuditEvent, ExecutionContext, Sink};
use crate::error::ScheduleError;
use crate::graph::TaskGraph;

/// A conformant scheduler backend: `schedule(graph, ctx, sink)` blocks the
/// caller until all phases are drained or validation aborts (§5), and
/// returns the full ordered audit-event stream recorded during the call.
///
/// Returning the event stream (rather than only calling
/// `ctx.record_audit`) is a Rust-idiom addition over the source contract:
/// both happen, but the return value lets [`crate::testkit`] and tests
/// compute a commit hash without wiring a shared accumulator through a
/// `Fn` callback.
pub trait Scheduler {
    /// Runs `graph` to completion against `ctx`, invoking `sink` once per
    /// executed task.
    ///
    /// # Errors
    /// Returns [`ScheduleError::InvalidGraph`] if `graph` fails validation
    /// (§4.3) before any side effect, or [`ScheduleError::AllocFail`] if
    /// scratch-buffer sizing overflows available memory.
    fn schedule(
        &self,
        graph: &TaskGraph,
        ctx: &ExecutionContext,
        sink: &mut dyn Sink,
    ) -> Result<Vec<AuditEvent>, ScheduleError>;
}
