// SPDX-License-Identifier: Apache-2.0
//! detcore-shard: shard registry and placement, the Task Splitter, and the
//! Shard Executor/Message Bus that let a global Task IR run as
//! independently-executed shards whose concatenated commit logs are
//! observably identical to a single-shard run (§4.7-§4.9).
//!
//! Built on [`detcore_core`]; this crate adds no new scheduling semantics
//! of its own, only partitioning and routing. It does not re-export the
//! scheduler backends directly, consuming them instead through its own
//! [`TaskSplitter`] and [`ShardExecutor`].

pub mod error;
pub mod executor;
pub mod message;
pub mod registry;
pub mod splitter;

pub use error::{AccessDenied, AccessKind, PlacementError, SplitError};
pub use executor::{ExecuteError, LogEntry, ShardExecutor};
pub use message::{BusFullError, MessageBus, ShardMessage};
pub use registry::{Shard, ShardId, ShardRegistry, ShardScope, ShardScopeKind};
pub use splitter::{split, SplitOutput, TaskSplitter};
