// SPDX-License-Identifier: Apache-2.0
//! AccessSet range/set algebra used to gate admission.
//!
//! This is the sole basis for admission fairness within a phase: two tasks
//! whose AccessSets conflict may not both commit in the same phase.

use crate::ident::AccessSetId;

/// Kind of an [`AccessRange`]. `IndexRange`/`Single` compare by closed
/// integer interval; the `*Set` kinds are conservative (overlap unless
/// `component_id`/`field_id` differ).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RangeKind {
    /// Set of entities, identified by `set_id`.
    EntitySet,
    /// Set of components, identified by `set_id`.
    ComponentSet,
    /// Set of interests (subscriptions), identified by `set_id`.
    InterestSet,
    /// Closed integer interval `[start_id, end_id]`.
    IndexRange,
    /// Single id, equivalent to `IndexRange { start_id, start_id }`.
    Single,
}

impl RangeKind {
    fn is_interval(self) -> bool {
        matches!(self, RangeKind::IndexRange | RangeKind::Single)
    }
}

/// A single declared read/write/reduce range within an [`AccessSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AccessRange {
    /// Kind of range; determines the overlap rule applied.
    pub kind: RangeKind,
    /// Component type this range addresses.
    pub component_id: u32,
    /// Field within the component this range addresses.
    pub field_id: u32,
    /// Interval start, for `IndexRange`/`Single`.
    pub start_id: u64,
    /// Interval end, for `IndexRange`/`Single` (ignored for `Single`: the
    /// effective interval is `[start_id, start_id]`).
    pub end_id: u64,
    /// Set identity, for the `*Set` kinds.
    pub set_id: u64,
}

impl AccessRange {
    /// The primary owner id this range resolves to for shard placement:
    /// `start_id` for interval kinds, `set_id` for set kinds.
    #[must_use]
    pub fn owner_id(&self) -> u64 {
        if self.kind.is_interval() {
            self.start_id
        } else {
            self.set_id
        }
    }
}

/// One of the deterministic reduction operators; `None` marks "no
/// reduction" on an [`AccessSet`] that declares no reduce ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReductionOp {
    /// No reduction declared.
    None,
    /// Integer sum.
    IntSum,
    /// Integer minimum.
    IntMin,
    /// Integer maximum.
    IntMax,
    /// Fixed-point sum.
    FixedSum,
    /// Bitwise OR.
    BitOr,
    /// Bitwise AND.
    BitAnd,
    /// Bitwise XOR.
    BitXor,
    /// Histogram bucket merge.
    HistogramMerge,
    /// Set union.
    SetUnion,
}

impl ReductionOp {
    fn is_allowed(self) -> bool {
        !matches!(self, ReductionOp::None)
    }
}

/// Declaration of the reads, writes, and reductions a task performs.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AccessSet {
    /// Identity of this set, matched against a task's `access_set_id`.
    pub access_id: u64,
    /// Ranges read.
    pub reads: Vec<AccessRange>,
    /// Ranges written.
    pub writes: Vec<AccessRange>,
    /// Ranges reduced into.
    pub reduces: Vec<AccessRange>,
    /// Operator applied to `reduces`, if any.
    pub reduction_op: Option<ReductionOp>,
    /// Whether the declared reduction is commutative.
    pub commutative: bool,
}

impl AccessSet {
    /// Derives the owner id used for shard placement: the owner of the
    /// first write range, else the first read range, else the first reduce
    /// range, else `0`.
    #[must_use]
    pub fn owner_id(&self) -> u64 {
        self.writes
            .first()
            .or_else(|| self.reads.first())
            .or_else(|| self.reduces.first())
            .map_or(0, AccessRange::owner_id)
    }
}

/// Backing storage an [`crate::context::ExecutionContext`] resolves
/// `access_set_id` handles against.
#[must_use]
pub fn lookup_in<'a>(
    table: &'a rustc_hash::FxHashMap<AccessSetId, AccessSet>,
    id: AccessSetId,
) -> Option<&'a AccessSet> {
    table.get(&id)
}

/// Returns false iff `component_id` or `field_id` differ, or both ranges
/// are interval-typed and their closed intervals are disjoint. Otherwise
/// true (conservative for set-typed ranges).
#[must_use]
pub fn ranges_overlap(a: &AccessRange, b: &AccessRange) -> bool {
    if a.component_id != b.component_id || a.field_id != b.field_id {
        return false;
    }
    if a.kind.is_interval() && b.kind.is_interval() {
        let a_end = if matches!(a.kind, RangeKind::Single) {
            a.start_id
        } else {
            a.end_id
        };
        let b_end = if matches!(b.kind, RangeKind::Single) {
            b.start_id
        } else {
            b.end_id
        };
        return a.start_id <= b_end && b.start_id <= a_end;
    }
    true
}

fn ranges_conflict(a: &[AccessRange], b: &[AccessRange]) -> bool {
    a.iter().any(|x| b.iter().any(|y| ranges_overlap(x, y)))
}

/// Validates an [`AccessSet`]'s declared reduction: if it declares no
/// reduce ranges, it trivially passes with `op = None`; otherwise the
/// declared operator must be a real operator (not `None`) and
/// `commutative` must be true.
#[must_use]
pub fn verify_reduction_rules(set: &AccessSet) -> bool {
    if set.reduces.is_empty() {
        return true;
    }
    match set.reduction_op {
        Some(op) if op.is_allowed() => set.commutative,
        _ => false,
    }
}

/// Returns true if `a` and `b` may not both commit in the same phase:
/// write/write, write/read (either direction), write/reduce (either
/// direction), or mismatched/missing reduction operators when either side
/// declares reduce ranges.
#[must_use]
pub fn detect_access_conflicts(a: &AccessSet, b: &AccessSet) -> bool {
    if ranges_conflict(&a.writes, &b.writes) {
        return true;
    }
    if ranges_conflict(&a.writes, &b.reads) || ranges_conflict(&b.writes, &a.reads) {
        return true;
    }
    if ranges_conflict(&a.writes, &b.reduces) || ranges_conflict(&b.writes, &a.reduces) {
        return true;
    }
    if !a.reduces.is_empty() || !b.reduces.is_empty() {
        match (a.reduction_op, b.reduction_op) {
            (Some(op_a), Some(op_b)) if op_a == op_b && op_a.is_allowed() => {}
            _ => return true,
        }
    }
    false
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn index_range(component: u32, field: u32, start: u64, end: u64) -> AccessRange {
        AccessRange {
            kind: RangeKind::IndexRange,
            component_id: component,
            field_id: field,
            start_id: start,
            end_id: end,
            set_id: 0,
        }
    }

    fn set_with_write(range: AccessRange) -> AccessSet {
        AccessSet {
            access_id: 1,
            reads: Vec::new(),
            writes: vec![range],
            reduces: Vec::new(),
            reduction_op: None,
            commutative: false,
        }
    }

    /// S2: write/write conflict.
    #[test]
    fn s2_write_write_conflict_by_overlap() {
        let a = set_with_write(index_range(1, 1, 0, 10));
        let disjoint = set_with_write(index_range(1, 1, 20, 30));
        assert!(!detect_access_conflicts(&a, &disjoint));

        let overlapping = set_with_write(index_range(1, 1, 5, 6));
        assert!(detect_access_conflicts(&a, &overlapping));
    }

    /// S3: reduction rules.
    #[test]
    fn s3_reduction_rules() {
        let mut set = AccessSet {
            access_id: 1,
            reads: Vec::new(),
            writes: Vec::new(),
            reduces: vec![index_range(1, 1, 0, 10)],
            reduction_op: Some(ReductionOp::IntSum),
            commutative: true,
        };
        assert!(verify_reduction_rules(&set));

        set.commutative = false;
        assert!(!verify_reduction_rules(&set));

        set.commutative = true;
        set.reduction_op = None;
        assert!(!verify_reduction_rules(&set));
    }

    #[test]
    fn differing_component_never_overlaps() {
        let a = index_range(1, 1, 0, 10);
        let b = index_range(2, 1, 0, 10);
        assert!(!ranges_overlap(&a, &b));
    }

    #[test]
    fn set_typed_ranges_are_conservative() {
        let a = AccessRange {
            kind: RangeKind::EntitySet,
            component_id: 1,
            field_id: 1,
            start_id: 0,
            end_id: 0,
            set_id: 10,
        };
        let b = AccessRange {
            kind: RangeKind::EntitySet,
            component_id: 1,
            field_id: 1,
            start_id: 0,
            end_id: 0,
            set_id: 99,
        };
        assert!(ranges_overlap(&a, &b));
    }

    /// P2: conflict detection is symmetric.
    #[test]
    fn p2_conflict_detection_is_symmetric() {
        let a = set_with_write(index_range(1, 1, 0, 10));
        let b = set_with_write(index_range(1, 1, 5, 15));
        assert_eq!(
            detect_access_conflicts(&a, &b),
            detect_access_conflicts(&b, &a)
        );

        let mut reducer_a = AccessSet {
            access_id: 2,
            reads: Vec::new(),
            writes: Vec::new(),
            reduces: vec![index_range(3, 3, 0, 10)],
            reduction_op: Some(ReductionOp::IntSum),
            commutative: true,
        };
        let mut reducer_b = reducer_a.clone();
        reducer_b.reduction_op = Some(ReductionOp::BitOr);
        assert_eq!(
            detect_access_conflicts(&reducer_a, &reducer_b),
            detect_access_conflicts(&reducer_b, &reducer_a)
        );

        reducer_a.reduction_op = Some(ReductionOp::IntSum);
        reducer_b.reduction_op = Some(ReductionOp::IntSum);
        assert!(!detect_access_conflicts(&reducer_a, &reducer_b));
    }

    #[test]
    fn owner_id_prefers_write_then_read_then_reduce() {
        let write_owner = index_range(1, 1, 42, 42);
        let set = set_with_write(write_owner);
        assert_eq!(set.owner_id(), 42);

        let read_only = AccessSet {
            access_id: 1,
            reads: vec![index_range(1, 1, 7, 7)],
            writes: Vec::new(),
            reduces: Vec::new(),
            reduction_op: None,
            commutative: false,
        };
        assert_eq!(read_only.owner_id(), 7);

        let empty = AccessSet::default();
        assert_eq!(empty.owner_id(), 0);
    }

    fn reduction_op_from_index(idx: u8) -> ReductionOp {
        match idx {
            0 => ReductionOp::None,
            1 => ReductionOp::IntSum,
            2 => ReductionOp::IntMin,
            3 => ReductionOp::IntMax,
            4 => ReductionOp::FixedSum,
            5 => ReductionOp::BitOr,
            6 => ReductionOp::BitAnd,
            7 => ReductionOp::BitXor,
            8 => ReductionOp::HistogramMerge,
            _ => ReductionOp::SetUnion,
        }
    }

    fn arb_range(component: u32, field: u32) -> impl Strategy<Value = AccessRange> {
        (0u64..100, 0u64..20).prop_map(move |(start, len)| {
            index_range(component, field, start, start + len)
        })
    }

    fn arb_access_set(component: u32, field: u32) -> impl Strategy<Value = AccessSet> {
        (
            prop::option::of(arb_range(component, field)),
            prop::option::of(arb_range(component, field)),
        )
            .prop_map(|(write, read)| AccessSet {
                access_id: 1,
                reads: read.into_iter().collect(),
                writes: write.into_iter().collect(),
                reduces: Vec::new(),
                reduction_op: None,
                commutative: false,
            })
    }

    proptest! {
        /// (P2): conflict detection is symmetric over generated write/read
        /// ranges, including overlapping and disjoint intervals.
        #[test]
        fn p2_conflict_detection_is_symmetric_for_generated_ranges(
            a in arb_access_set(1, 1),
            b in arb_access_set(1, 1),
        ) {
            prop_assert_eq!(detect_access_conflicts(&a, &b), detect_access_conflicts(&b, &a));
        }

        /// (P2): symmetry holds for reduce-range conflicts too, across every
        /// combination of declared (possibly mismatched) reduction operators.
        #[test]
        fn p2_reduction_conflict_is_symmetric_for_generated_operators(
            op_a in 0u8..10,
            op_b in 0u8..10,
            commutative_a in any::<bool>(),
            commutative_b in any::<bool>(),
        ) {
            let reduce_range = index_range(3, 3, 0, 10);
            let a = AccessSet {
                access_id: 1,
                reads: Vec::new(),
                writes: Vec::new(),
                reduces: vec![reduce_range],
                reduction_op: Some(reduction_op_from_index(op_a)),
                commutative: commutative_a,
            };
            let b = AccessSet {
                access_id: 2,
                reads: Vec::new(),
                writes: Vec::new(),
                reduces: vec![reduce_range],
                reduction_op: Some(reduction_op_from_index(op_b)),
                commutative: commutative_b,
            };
            prop_assert_eq!(detect_access_conflicts(&a, &b), detect_access_conflicts(&b, &a));
        }
    }
}
