//! Batch assignment: conflict-free grouping of constraints for intra-batch
//! data parallelism (component design §4.7 "Batch assignment", testable
//! properties 2 and 3).

use rustc_hash::{FxHashMap, FxHashSet};

use crate::dynamics::body::BodyHandle;
use crate::dynamics::solver::constraint_kind::ConstraintKind;
use crate::dynamics::solver::contact_constraint::{ContactConstraint, ContactNonConvexConstraint};
use crate::dynamics::solver::joint_constraint::JointConstraint;

/// Opaque handle to a constraint. Stable across the structural moves that
/// happen when a sibling constraint is removed (component design §3,
/// "Invariants").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstraintHandle(pub(crate) crate::data::arena::Index);

impl ConstraintHandle {
    #[cfg(test)]
    pub(crate) fn for_test(index: crate::data::arena::Index) -> Self {
        ConstraintHandle(index)
    }
}

/// Per-kind storage for one [`Batch`]. Each variant is a plain `Vec`, kept
/// dense via swap-remove; a monomorphized enum rather than a trait object so
/// the solver's inner loop never pays for a virtual call (design notes,
/// "dynamic dispatch without vtables on hot paths").
pub enum TypeBatchStorage {
    Contact(Vec<(ConstraintHandle, ContactConstraint)>),
    ContactNonConvex(Vec<(ConstraintHandle, ContactNonConvexConstraint)>),
    Joint(Vec<(ConstraintHandle, JointConstraint)>),
}

impl TypeBatchStorage {
    fn empty_for(kind: ConstraintKind) -> Self {
        match kind {
            ConstraintKind::Contact => TypeBatchStorage::Contact(Vec::new()),
            ConstraintKind::ContactNonConvex => TypeBatchStorage::ContactNonConvex(Vec::new()),
            _ => TypeBatchStorage::Joint(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TypeBatchStorage::Contact(v) => v.len(),
            TypeBatchStorage::ContactNonConvex(v) => v.len(),
            TypeBatchStorage::Joint(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes the entry at `index`; if another entry occupied the last
    /// slot, returns `(moved_handle, new_index)` so the caller can fix that
    /// constraint's `handle_to_location` entry.
    fn swap_remove(&mut self, index: usize) -> Option<(ConstraintHandle, usize)> {
        fn do_remove<T>(v: &mut Vec<(ConstraintHandle, T)>, index: usize) -> Option<(ConstraintHandle, usize)> {
            let last = v.len() - 1;
            v.swap_remove(index);
            (index != last).then(|| (v[index].0, index))
        }
        match self {
            TypeBatchStorage::Contact(v) => do_remove(v, index),
            TypeBatchStorage::ContactNonConvex(v) => do_remove(v, index),
            TypeBatchStorage::Joint(v) => do_remove(v, index),
        }
    }
}

/// A set of constraints, no two of which share a body — the unit of
/// intra-step data parallelism (component design §3, §4.7).
pub struct Batch {
    pub(crate) referenced: FxHashSet<BodyHandle>,
    pub(crate) type_batches: FxHashMap<ConstraintKind, TypeBatchStorage>,
}

impl Batch {
    fn new() -> Self {
        Batch {
            referenced: FxHashSet::default(),
            type_batches: FxHashMap::default(),
        }
    }

    fn disjoint_from(&self, a: BodyHandle, b: Option<BodyHandle>) -> bool {
        !self.referenced.contains(&a) && b.is_none_or(|b| !self.referenced.contains(&b))
    }

    pub fn type_batch(&self, kind: ConstraintKind) -> Option<&TypeBatchStorage> {
        self.type_batches.get(&kind)
    }

    pub fn type_batch_mut(&mut self, kind: ConstraintKind) -> Option<&mut TypeBatchStorage> {
        self.type_batches.get_mut(&kind)
    }

    pub fn len(&self) -> usize {
        self.type_batches.values().map(TypeBatchStorage::len).sum()
    }
}

/// Finds the lowest-index batch disjoint from `{a, b}`, appending a new
/// batch if none qualify. Property 3 ("constraint placement minimality").
pub fn find_or_create_batch(batches: &mut Vec<Batch>, a: BodyHandle, b: Option<BodyHandle>) -> usize {
    for (i, batch) in batches.iter().enumerate() {
        if batch.disjoint_from(a, b) {
            return i;
        }
    }
    batches.push(Batch::new());
    batches.len() - 1
}

/// Records that `a` (and `b`, if present) are now referenced by batch
/// `batch_index`, and reserves a slot for `kind` in that batch's type
/// batch, creating the type batch if this is its first constraint.
pub fn reserve_slot(
    batches: &mut [Batch],
    batch_index: usize,
    kind: ConstraintKind,
    a: BodyHandle,
    b: Option<BodyHandle>,
) -> &mut TypeBatchStorage {
    let batch = &mut batches[batch_index];
    batch.referenced.insert(a);
    if let Some(b) = b {
        batch.referenced.insert(b);
    }
    batch
        .type_batches
        .entry(kind)
        .or_insert_with(|| TypeBatchStorage::empty_for(kind))
}

pub(crate) fn remove_slot(
    batches: &mut [Batch],
    batch_index: usize,
    kind: ConstraintKind,
    index: usize,
) -> Option<(ConstraintHandle, usize)> {
    batches[batch_index]
        .type_batches
        .get_mut(&kind)
        .and_then(|tb| tb.swap_remove(index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::arena::Arena;

    fn handle(arena: &mut Arena<()>) -> BodyHandle {
        BodyHandle::for_test(arena.insert(()))
    }

    #[test]
    fn disjoint_constraints_share_a_batch() {
        let mut arena = Arena::new();
        let mut batches = Vec::new();
        let a = handle(&mut arena);
        let b = handle(&mut arena);
        let c = handle(&mut arena);
        let d = handle(&mut arena);

        let i1 = find_or_create_batch(&mut batches, a, Some(b));
        reserve_slot(&mut batches, i1, ConstraintKind::BallSocket, a, Some(b));
        let i2 = find_or_create_batch(&mut batches, c, Some(d));
        reserve_slot(&mut batches, i2, ConstraintKind::BallSocket, c, Some(d));

        assert_eq!(i1, i2, "bodies sharing no handle should land in the same batch");
    }

    #[test]
    fn conflicting_constraints_land_in_new_batch() {
        let mut arena = Arena::new();
        let mut batches = Vec::new();
        let a = handle(&mut arena);
        let b = handle(&mut arena);
        let c = handle(&mut arena);

        let i1 = find_or_create_batch(&mut batches, a, Some(b));
        reserve_slot(&mut batches, i1, ConstraintKind::BallSocket, a, Some(b));
        // Shares body `b` with the first constraint: must NOT land in batch 0.
        let i2 = find_or_create_batch(&mut batches, b, Some(c));
        reserve_slot(&mut batches, i2, ConstraintKind::BallSocket, b, Some(c));

        assert_ne!(i1, i2);
        assert_eq!(i2, 1, "minimality: must use the lowest qualifying index, here a fresh batch 1");
    }

    #[test]
    fn batch_disjointness_holds_for_many_constraints() {
        let mut arena = Arena::new();
        let mut batches = Vec::new();
        let handles: Vec<BodyHandle> = (0..20).map(|_| handle(&mut arena)).collect();
        for pair in handles.chunks(2) {
            let i = find_or_create_batch(&mut batches, pair[0], Some(pair[1]));
            reserve_slot(&mut batches, i, ConstraintKind::BallSocket, pair[0], Some(pair[1]));
        }
        // Every pair is disjoint from every other, so all constraints should
        // have landed in a single batch.
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].referenced.len(), 20);
    }
}
