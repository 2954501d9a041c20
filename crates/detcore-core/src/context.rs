// SPDX-License-Identifier: Apache-2.0
//! The execution context: law evaluation, audit recording, and AccessSet
//! lookup, re-expressed from the source's function-pointer-plus-user_data
//! pattern as a capability object holding trait objects.
//!
//! A context holds no long-lived references into the graph: the scheduler
//! borrows it only for the duration of one `schedule` call (§5).

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::access::AccessSet;
use crate::error::RefusalCode;
use crate::ident::{AccessSetId, TaskId};
use crate::task::{FidelityTier, TaskNode};

/// Verdict kind returned by the law-evaluation callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionKind {
    /// The task may proceed unchanged.
    Accept = 1,
    /// The task is rejected; it will not execute this schedule call.
    Refuse = 2,
    /// The task is rejected but a transformed working copy should be
    /// re-evaluated once.
    Transform = 3,
    /// The task may proceed with a caller-imposed constraint; treated like
    /// `Accept` by the scheduler, which does not interpret constraints.
    Constrain = 4,
}

/// A law's verdict on one task.
#[derive(Debug, Clone, Copy)]
pub struct LawDecision {
    /// Accept, Refuse, Transform, or Constrain.
    pub kind: DecisionKind,
    /// Caller-supplied refusal code, used only when `kind == Refuse`.
    pub refusal_code: Option<RefusalCode>,
    /// Replacement fidelity tier, used only when `kind == Transform`.
    pub transformed_fidelity_tier: Option<FidelityTier>,
    /// Replacement due tick, used only when `kind == Transform`.
    pub transformed_next_due_tick: Option<crate::ident::Tick>,
}

impl LawDecision {
    /// The `Accept` verdict, with no transformation fields set.
    #[must_use]
    pub fn accept() -> Self {
        Self {
            kind: DecisionKind::Accept,
            refusal_code: None,
            transformed_fidelity_tier: None,
            transformed_next_due_tick: None,
        }
    }
}

/// Stable numeric audit event identity (§6): `Admitted=1, Refused=2,
/// Transformed=3, Executed=4, Committed=5`. Preserved exactly so downstream
/// fixtures keyed on these ids remain valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A task passed law evaluation and access-conflict checking.
    Admitted = 1,
    /// A task was refused, by law or by the core.
    Refused = 2,
    /// A task's working copy was transformed by the law layer.
    Transformed = 3,
    /// A task was handed to the sink.
    Executed = 4,
    /// A task's effects are part of the canonical commit order.
    Committed = 5,
}

/// A structured record emitted to the audit callback for every observable
/// decision. `decision_kind`/`refusal_code` are populated only for the
/// event kinds that carry them (Transformed carries `decision_kind`,
/// Refused carries `refusal_code`).
#[derive(Debug, Clone, Copy)]
pub struct AuditEvent {
    /// Which observable decision this event records.
    pub kind: EventKind,
    /// Task this event concerns.
    pub task_id: TaskId,
    /// Present for `Transformed` events: the verdict kind that triggered it.
    pub decision_kind: Option<DecisionKind>,
    /// Present for `Refused` events: the most specific refusal cause.
    pub refusal_code: Option<RefusalCode>,
}

impl AuditEvent {
    /// Constructs an event carrying neither `decision_kind` nor
    /// `refusal_code`, for the common `Admitted`/`Executed`/`Committed` case.
    #[must_use]
    pub fn plain(kind: EventKind, task_id: TaskId) -> Self {
        Self {
            kind,
            task_id,
            decision_kind: None,
            refusal_code: None,
        }
    }

    /// Constructs a `Refused` event with the given cause.
    #[must_use]
    pub fn refused(task_id: TaskId, refusal_code: RefusalCode) -> Self {
        Self {
            kind: EventKind::Refused,
            task_id,
            decision_kind: None,
            refusal_code: Some(refusal_code),
        }
    }

    /// Constructs a `Transformed` event.
    #[must_use]
    pub fn transformed(task_id: TaskId) -> Self {
        Self {
            kind: EventKind::Transformed,
            task_id,
            decision_kind: Some(DecisionKind::Transform),
            refusal_code: None,
        }
    }
}

/// Determinism mode a context runs under. `Strict` and `Audit` are both
/// fully deterministic; `Test` exists so test harnesses can opt into
/// relaxed placement fallback behavior (§9 open question) without changing
/// production semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeterminismMode {
    /// Production mode: placement/law ambiguity is an error, not a fallback.
    Strict,
    /// Records full audit detail but tolerates fallback placement.
    Audit,
    /// Relaxed mode for test harnesses and fixtures.
    Test,
}

/// Law-evaluation callback: `evaluate_law(ctx, task_view, user_data)`.
pub type LawEvalFn = dyn Fn(&TaskNode) -> LawDecision + Send + Sync;
/// Audit-recording callback: `record_audit(ctx, event, user_data)`.
pub type AuditFn = dyn Fn(&AuditEvent) + Send + Sync;

/// The handle passed into schedulers: law evaluation, audit recording, and
/// AccessSet lookup, plus determinism mode and a logical "now" tick.
///
/// A context holds no long-lived references; the AccessSet table is
/// consulted by value lookup (`FxHashMap`) rather than by raw pointer, so
/// the borrow-checker enforces the "valid for one schedule call" contract
/// from §5 without `unsafe`.
pub struct ExecutionContext {
    law_eval: Option<Arc<LawEvalFn>>,
    audit: Option<Arc<AuditFn>>,
    access_sets: FxHashMap<AccessSetId, AccessSet>,
    /// Determinism mode this context runs under.
    pub mode: DeterminismMode,
    /// Logical "now" tick, used by message-bus `pop_ready` style queries.
    pub act_now: crate::ident::Tick,
}

impl ExecutionContext {
    /// Constructs a context with the Accept-all law (a `None` law callable
    /// behaves as Accept-all, per §9), no audit sink, and an empty
    /// AccessSet table.
    #[must_use]
    pub fn new(mode: DeterminismMode) -> Self {
        Self {
            law_eval: None,
            audit: None,
            access_sets: FxHashMap::default(),
            mode,
            act_now: crate::ident::Tick(0),
        }
    }

    /// Installs a law-evaluation callback.
    #[must_use]
    pub fn with_law_eval(mut self, f: Arc<LawEvalFn>) -> Self {
        self.law_eval = Some(f);
        self
    }

    /// Installs an audit-recording callback.
    #[must_use]
    pub fn with_audit(mut self, f: Arc<AuditFn>) -> Self {
        self.audit = Some(f);
        self
    }

    /// Registers an [`AccessSet`] so it is resolvable by `access_set_id`
    /// during the next `schedule` call.
    pub fn insert_access_set(&mut self, id: AccessSetId, set: AccessSet) {
        self.access_sets.insert(id, set);
    }

    /// Evaluates the law on `task`. A context with no law callable installed
    /// always returns `Accept`.
    #[must_use]
    pub fn evaluate_law(&self, task: &TaskNode) -> LawDecision {
        self.law_eval
            .as_ref()
            .map_or_else(LawDecision::accept, |f| f(task))
    }

    /// Records `event` on the installed audit sink, if any.
    pub fn record_audit(&self, event: &AuditEvent) {
        if let Some(audit) = &self.audit {
            audit(event);
        }
    }

    /// Resolves `id` against the registered AccessSet table. Returns `None`
    /// when the id is unknown, which callers must treat as a per-task
    /// refusal with [`RefusalCode::AccessSet`].
    #[must_use]
    pub fn lookup_access_set(&self, id: AccessSetId) -> Option<&AccessSet> {
        self.access_sets.get(&id)
    }
}

/// Caller-supplied callable invoked once per executed task:
/// `on_task(task_view, decision)`.
pub trait Sink {
    /// Receives the working copy of an executed task and its accepted
    /// decision. Must be non-blocking with respect to the scheduler and
    /// must not re-enter it.
    fn on_task(&mut self, task_view: &TaskNode, decision: &LawDecision);
}

impl<F: FnMut(&TaskNode, &LawDecision)> Sink for F {
    fn on_task(&mut self, task_view: &TaskNode, decision: &LawDecision) {
        self(task_view, decision);
    }
}
