// SPDX-License-Identifier: Apache-2.0
//! detcore-core: Task IR, AccessSet conflict engine, and the deterministic
//! scheduler backends (single-threaded reference, parallel) that back a
//! simulation/game runtime's execution core.
//!
//! Crates built on top of this one (`detcore-shard`) add sharding; emitters,
//! the law/policy engine, and audit persistence are out of scope here (see
//! the workspace `SPEC_FULL.md`) and are consumed only through the
//! [`context::ExecutionContext`] callbacks.

pub mod access;
pub mod config;
pub mod context;
pub mod error;
pub mod fixture;
pub mod graph;
pub mod hash;
pub mod ident;
pub mod kv;
pub mod order;
pub mod scheduler;
pub mod task;
pub mod testkit;
pub mod validate;

pub use access::{AccessRange, AccessSet, RangeKind, ReductionOp};
pub use context::{AuditEvent, DecisionKind, DeterminismMode, EventKind, ExecutionContext, LawDecision, Sink};
pub use error::{RefusalCode, ScheduleError, ValidationError};
pub use graph::{DependencyEdge, PhaseBarrier, TaskGraph};
pub use ident::{
    AccessSetId, ActorRef, CapabilitySetRef, CostModelId, LawScopeRef, LawTargetId, PhaseId,
    SubIndex, SystemId, TaskId, Tick,
};
pub use order::{graph_is_sorted, stable_task_sort, task_cmp};
pub use scheduler::{parallel::ParallelScheduler, single_thread::SingleThreadScheduler, Scheduler};
pub use task::{CommitKey, DeterminismClass, FidelityTier, TaskCategory, TaskNode};
pub use validate::{validate_graph, validate_task};
