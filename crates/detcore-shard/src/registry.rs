// SPDX-License-Identifier: Apache-2.0
//! Shard Registry & Placement (§4.7): maps an owner identity derived from
//! a task's primary access range to a shard id, and gates cross-shard
//! access.

use detcore_core::AccessSet;

use crate::error::{AccessDenied, AccessKind};

/// 32-bit shard identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShardId(pub u32);

/// The ownership range a [`Shard`] covers. `owner_kind` names what the
/// `[start, end]` bounds are measured in (entity id, component id, ...);
/// the registry does not interpret it beyond the closed-interval test, but
/// it is carried for diagnostics and for callers building a registry from
/// a declarative config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShardScope {
    /// What kind of id this scope's bounds measure.
    pub kind: ShardScopeKind,
    /// Inclusive lower bound.
    pub start: u64,
    /// Inclusive upper bound.
    pub end: u64,
    /// Caller-assigned tag, not interpreted by the registry.
    pub tag: u32,
}

/// Kind of identifier a [`ShardScope`]'s bounds are measured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ShardScopeKind {
    /// The scope covers a contiguous range of entity ids.
    EntityRange,
    /// The scope covers a contiguous range of opaque set ids.
    SetRange,
}

impl ShardScope {
    /// Returns true iff `owner_id` falls within `[start, end]`.
    #[must_use]
    pub fn covers(&self, owner_id: u64) -> bool {
        self.start <= owner_id && owner_id <= self.end
    }
}

/// A named partition of simulation state with an ownership scope and a
/// determinism domain tag (declared non-overlapping with every other
/// shard's scope by the registry's builder; the registry does not itself
/// enforce non-overlap since the source trusts callers to declare
/// partitions correctly, but [`ShardRegistry::add`] is where a future
/// overlap check would live).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Shard {
    /// This shard's identity.
    pub shard_id: ShardId,
    /// The ownership range this shard covers.
    pub scope: ShardScope,
    /// Determinism domain this shard's tasks are evaluated under; opaque
    /// to the registry, carried for the caller's own bookkeeping.
    pub determinism_domain: u32,
    /// Whether tasks outside this shard may take Read access into it.
    pub allow_cross_shard_reads: bool,
}

/// A bounded registry of [`Shard`] records, mapping owner ids to shards.
#[derive(Debug, Clone, Default)]
pub struct ShardRegistry {
    shards: Vec<Shard>,
}

impl ShardRegistry {
    /// Constructs an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `shard`. Scopes are assumed non-overlapping by
    /// construction (§4.7: "ties are impossible because scopes are
    /// declared non-overlapping"); this is a caller invariant, not one the
    /// registry checks.
    pub fn add(&mut self, shard: Shard) {
        self.shards.push(shard);
    }

    /// Returns the registered shards, in registration order.
    #[must_use]
    pub fn shards(&self) -> &[Shard] {
        &self.shards
    }

    /// Returns the shard whose scope covers `owner_id`, if any.
    #[must_use]
    pub fn find_owner(&self, owner_id: u64) -> Option<ShardId> {
        self.shards
            .iter()
            .find(|shard| shard.scope.covers(owner_id))
            .map(|shard| shard.shard_id)
    }

    fn shard(&self, shard_id: ShardId) -> Option<&Shard> {
        self.shards.iter().find(|shard| shard.shard_id == shard_id)
    }

    /// Returns `Ok(())` iff the effective owner of `owner_id` is
    /// `shard_id`, or `access_kind` is [`AccessKind::Read`] and the owning
    /// shard's policy permits cross-shard reads.
    ///
    /// # Errors
    /// Returns [`AccessDenied`] when access is not permitted. Callers map
    /// this to `PLACEMENT_REFUSED` or a refusal audit event as appropriate
    /// for their call site.
    pub fn validate_access(
        &self,
        shard_id: ShardId,
        owner_id: u64,
        access_kind: AccessKind,
    ) -> Result<(), AccessDenied> {
        let Some(owner_shard_id) = self.find_owner(owner_id) else {
            return Err(AccessDenied);
        };
        if owner_shard_id == shard_id {
            return Ok(());
        }
        if access_kind == AccessKind::Read {
            if let Some(owner_shard) = self.shard(owner_shard_id) {
                if owner_shard.allow_cross_shard_reads {
                    return Ok(());
                }
            }
        }
        Err(AccessDenied)
    }

    /// Derives the owning shard for `access`, falling back to `fallback`
    /// if the derived owner id does not resolve to any registered shard.
    #[must_use]
    pub fn place_task(&self, access: &AccessSet, fallback: ShardId) -> ShardId {
        let owner_id = access.owner_id();
        self.find_owner(owner_id).unwrap_or(fallback)
    }

    /// Like [`ShardRegistry::place_task`], but reports whether the
    /// fallback was used instead of silently returning it — the splitter
    /// uses this to elevate an unresolved owner to [`crate::SplitError`]
    /// under `Strict` determinism mode (§9).
    #[must_use]
    pub fn place_task_checked(&self, access: &AccessSet) -> Option<ShardId> {
        self.find_owner(access.owner_id())
    }
}
