// SPDX-License-Identifier: Apache-2.0
//! FNV-1a 64 hashing.
//!
//! Used for two distinct purposes that both require a fixed, documented
//! algorithm rather than whatever `std::hash` happens to pick: the
//! Committed-event commit hash (§4.4) and a `ShardMessage`'s `message_id`
//! (derived from the `detcore-shard` crate, which reuses this module).

/// FNV-1a 64 offset basis.
pub const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
/// FNV-1a 64 prime.
pub const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Hashes `bytes` with FNV-1a 64, starting from [`FNV_OFFSET_BASIS`].
#[must_use]
pub fn fnv1a64(bytes: &[u8]) -> u64 {
    fnv1a64_fold(FNV_OFFSET_BASIS, bytes)
}

/// Continues an FNV-1a 64 hash from an existing accumulator, for callers
/// that need to hash several fields without concatenating them first.
#[must_use]
pub fn fnv1a64_fold(mut hash: u64, bytes: &[u8]) -> u64 {
    for &byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

use crate::context::{AuditEvent, EventKind};
use crate::error::RefusalCode;

/// Projects one [`AuditEvent`] to the byte tuple `(event_id, task_id,
/// decision_kind, refusal_code)` and folds it into `hash`.
///
/// `decision_kind` is the numeric `LawDecision` kind when the event carries
/// one (Transformed) and `0` otherwise; `refusal_code` is `0` when the event
/// is not a refusal.
#[must_use]
pub fn fold_audit_event(hash: u64, event: &AuditEvent) -> u64 {
    let mut hash = fnv1a64_fold(hash, &(event.kind as u32).to_le_bytes());
    hash = fnv1a64_fold(hash, &event.task_id.0.to_le_bytes());
    let decision_kind = event.decision_kind.map_or(0u32, |k| k as u32);
    hash = fnv1a64_fold(hash, &decision_kind.to_le_bytes());
    let refusal_code: u32 = event.refusal_code.map_or(0, RefusalCode::code);
    hash = fnv1a64_fold(hash, &refusal_code.to_le_bytes());
    hash
}

/// Hashes a complete sequence of audit events under FNV-1a 64, suitable for
/// comparing two runs for byte-identical Committed-event sequences (P4/S5).
#[must_use]
pub fn hash_audit_events(events: &[AuditEvent]) -> u64 {
    events
        .iter()
        .fold(FNV_OFFSET_BASIS, |hash, event| fold_audit_event(hash, event))
}

/// Filters `events` down to `Committed` events before hashing, matching the
/// commit-hash defined in §4.4/(P4)/(P6).
#[must_use]
pub fn hash_committed_events(events: &[AuditEvent]) -> u64 {
    events
        .iter()
        .filter(|e| matches!(e.kind, EventKind::Committed))
        .fold(FNV_OFFSET_BASIS, |hash, event| fold_audit_event(hash, event))
}
