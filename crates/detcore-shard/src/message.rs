// SPDX-License-Identifier: Apache-2.0
//! Cross-shard messages and the bounded message bus (§3/§4.9).

use std::collections::BinaryHeap;

use detcore_core::hash::{fnv1a64_fold, FNV_OFFSET_BASIS};
use detcore_core::{TaskId, Tick};
use thiserror::Error;

use crate::registry::ShardId;

/// A cross-shard dependency edge, synthesized by the [`crate::splitter`]
/// when a `DependencyEdge`'s endpoints land in different shards.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShardMessage {
    /// Shard owning the edge's `from` task.
    pub source_shard: ShardId,
    /// Shard owning the edge's `to` task.
    pub target_shard: ShardId,
    /// The `from` task of the originating dependency edge.
    pub task_id: TaskId,
    /// FNV-1a 64 hash of `(from_task_id, to_task_id)`.
    pub message_id: u64,
    /// Logical tick this message becomes deliverable, the max of the two
    /// endpoints' `next_due_tick` (ignoring `INVALID`).
    pub arrival_tick: Tick,
    /// Opaque caller payload, not interpreted by the core.
    pub payload: Option<Vec<u8>>,
}

impl ShardMessage {
    /// Computes the stable `message_id` for an edge `(from, to)`: FNV-1a 64
    /// over the pair's little-endian bytes, concatenated.
    #[must_use]
    pub fn compute_message_id(from: TaskId, to: TaskId) -> u64 {
        let hash = fnv1a64_fold(FNV_OFFSET_BASIS, &from.0.to_le_bytes());
        fnv1a64_fold(hash, &to.0.to_le_bytes())
    }
}

/// Sort key for the bus ordering and [`crate::splitter::split`]'s outbound
/// message list: `(arrival_tick ascending, message_id ascending)`.
#[must_use]
pub fn message_sort_key(message: &ShardMessage) -> (Tick, u64) {
    (message.arrival_tick, message.message_id)
}

/// Error returned by [`MessageBus::enqueue`] when the bus is at capacity.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("message bus is at capacity ({capacity})")]
pub struct BusFullError {
    /// The bus's configured capacity.
    pub capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct HeapEntry(ShardMessage);

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // `BinaryHeap` is a max-heap; reverse so the lowest key is popped
        // first, matching the bus's `(arrival_tick ASC, message_id ASC)`
        // dequeue order.
        message_sort_key(&other.0).cmp(&message_sort_key(&self.0))
    }
}

/// A bounded FIFO, keyed by `(arrival_tick ASC, message_id ASC)`, guarding
/// a single mutable queue of outbound [`ShardMessage`]s (§5: "its
/// operations are atomic with respect to callers" — enforced here by
/// owning the queue outright rather than by any locking, since a bus is
/// not shared across threads within one `schedule`/`execute` call).
#[derive(Debug, Default)]
pub struct MessageBus {
    capacity: usize,
    entries: BinaryHeap<HeapEntry>,
}

impl MessageBus {
    /// Constructs an empty bus bounded at `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: BinaryHeap::new(),
        }
    }

    /// Number of messages currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true iff no messages are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Enqueues `message`.
    ///
    /// # Errors
    /// Returns [`BusFullError`] if the bus is already at capacity.
    pub fn enqueue(&mut self, message: ShardMessage) -> Result<(), BusFullError> {
        if self.entries.len() >= self.capacity {
            return Err(BusFullError {
                capacity: self.capacity,
            });
        }
        self.entries.push(HeapEntry(message));
        Ok(())
    }

    /// Dequeues the minimum-keyed entry whose `arrival_tick <= now`, if
    /// any. Returns `None` when the bus is empty or the earliest entry is
    /// not yet deliverable.
    pub fn pop_ready(&mut self, now: Tick) -> Option<ShardMessage> {
        let is_ready = self.entries.peek().is_some_and(|entry| entry.0.arrival_tick <= now);
        if is_ready {
            self.entries.pop().map(|entry| entry.0)
        } else {
            None
        }
    }
}
