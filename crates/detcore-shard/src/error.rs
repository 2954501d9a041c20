// SPDX-License-Identifier: Apache-2.0
//! Stable numeric status codes for the sharding layer (§7/§9), extending
//! `detcore-core`'s error taxonomy with placement and split failures.

use thiserror::Error;

use detcore_core::TaskId;

/// Access kind used by [`crate::registry::validate_access`]: whether the
/// caller is asking to read or write through a shard boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    /// A read access; may be permitted cross-shard depending on policy.
    Read,
    /// A write access; only ever permitted to the effective owner shard.
    Write,
}

/// Returned by [`crate::registry::ShardRegistry::validate_access`] when a
/// shard boundary access is not permitted. Carries no task context, since
/// the registry only sees an owner id; [`crate::executor::ShardExecutor`]
/// attaches the task id when it converts this into a
/// [`PlacementError::Refused`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("access denied across shard boundary")]
pub struct AccessDenied;

/// Placement error (§7): detected in the Shard Executor before scheduling;
/// no sink activity occurs when this is returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlacementError {
    /// An Authoritative task's owner does not resolve to the executing
    /// shard; the task is misplaced.
    #[error("task {task_id} is not owned by the executing shard")]
    Refused {
        /// The misplaced task.
        task_id: TaskId,
    },
}

impl PlacementError {
    /// Stable numeric status code: `PLACEMENT_REFUSED`.
    #[must_use]
    pub const fn status_code(&self) -> u32 {
        match self {
            PlacementError::Refused { .. } => 6,
        }
    }
}

/// Splitter error (§7): unroutable task or cross-phase inconsistency;
/// returning this leaves no partial per-shard graphs in the splitter's
/// outputs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SplitError {
    /// A task's derived owner id did not resolve to any registered shard,
    /// and no fallback applies (no fallback was supplied, or the context's
    /// determinism mode is `Strict`, which elevates an unresolved owner to
    /// a hard error instead of silently migrating to the fallback shard;
    /// see §9's placement-fallback open question).
    #[error("task {task_id} has no resolvable shard owner")]
    Unroutable {
        /// The unroutable task.
        task_id: TaskId,
    },
    /// The source graph itself failed structural validation.
    #[error("source graph is invalid: {0}")]
    InvalidGraph(#[from] detcore_core::ValidationError),
}

impl SplitError {
    /// Stable numeric status code: `SPLIT_UNROUTABLE` or `INVALID_GRAPH`.
    #[must_use]
    pub const fn status_code(&self) -> u32 {
        match self {
            SplitError::Unroutable { .. } => 7,
            SplitError::InvalidGraph(_) => 1,
        }
    }
}
