//! Constraint graph & pair cache (component design §4.6): for every ordered
//! collidable pair the narrow phase has seen, remembers which constraint
//! currently represents it so a later update can refresh it in place,
//! swap its kind, or be told to allocate fresh.
//!
//! Per-set migration of pair-cache entries on sleep/wake is not implemented:
//! this crate keeps one global pair cache regardless of which body set its
//! participants live in, mirroring the same simplification
//! [`crate::dynamics::sleep`] makes for the constraint graph itself — see
//! `DESIGN.md`.

use rustc_hash::FxHashMap;

use crate::dynamics::body::{BodyHandle, StaticHandle};
use crate::dynamics::solver::{ConstraintHandle, ConstraintKind};
use crate::geometry::contact::FeatureId;
use crate::math::Real;

/// One side of a collidable pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColliderId {
    Body(BodyHandle),
    Static(StaticHandle),
}

impl ColliderId {
    fn sort_key(&self) -> (u8, usize, u64) {
        match self {
            ColliderId::Body(h) => {
                let (index, generation) = h.0.into_raw_parts();
                (0, index, generation)
            }
            ColliderId::Static(h) => {
                let (index, generation) = h.0.into_raw_parts();
                (1, index, generation)
            }
        }
    }
}

/// An ordered collidable pair, canonicalized so `(a, b)` and `(b, a)` hash
/// to the same entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CollidablePair(ColliderId, ColliderId);

impl CollidablePair {
    pub fn new(a: ColliderId, b: ColliderId) -> Self {
        if a.sort_key() <= b.sort_key() {
            CollidablePair(a, b)
        } else {
            CollidablePair(b, a)
        }
    }

    pub fn participants(&self) -> (ColliderId, ColliderId) {
        (self.0, self.1)
    }
}

/// The cached record for one pair: which constraint represents it, and the
/// previous frame's per-feature impulses for warm-start carry-over
/// (component design §4.5, "Warm start carry-over").
pub struct PairCacheEntry {
    pub constraint_handle: ConstraintHandle,
    pub constraint_kind: ConstraintKind,
    pub collision_cache: Vec<(FeatureId, Real)>,
}

/// What the caller should do about a pair whose narrow-phase manifold was
/// just (re)computed, given the cache's current state for it (component
/// design §4.6).
pub enum PairUpdate {
    /// No existing entry: allocate a constraint and call [`PairCache::insert`].
    Create,
    /// An entry exists with a matching constraint kind: refresh its
    /// description in place: `collision_cache` carries the previous frame's
    /// feature-id/impulse pairs for warm-start matching.
    UpdateInPlace { handle: ConstraintHandle, collision_cache: Vec<(FeatureId, Real)> },
    /// An entry exists but its kind changed (e.g. a manifold went from
    /// convex to non-convex as a compound's children started overlapping
    /// differently): the caller must remove `old_handle` from the solver and
    /// allocate a fresh constraint via [`PairCache::insert`].
    ReplaceKind { old_handle: ConstraintHandle },
}

#[derive(Default)]
pub struct PairCache {
    entries: FxHashMap<CollidablePair, PairCacheEntry>,
}

impl PairCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Classifies `pair` against the cache's current state, given the
    /// constraint kind the freshly computed manifold implies.
    pub fn classify(&self, pair: CollidablePair, new_kind: ConstraintKind) -> PairUpdate {
        match self.entries.get(&pair) {
            None => PairUpdate::Create,
            Some(entry) if entry.constraint_kind == new_kind => PairUpdate::UpdateInPlace {
                handle: entry.constraint_handle,
                collision_cache: entry.collision_cache.clone(),
            },
            Some(entry) => PairUpdate::ReplaceKind { old_handle: entry.constraint_handle },
        }
    }

    /// Records (or overwrites) the entry for `pair`.
    pub fn insert(&mut self, pair: CollidablePair, entry: PairCacheEntry) {
        self.entries.insert(pair, entry);
    }

    /// Removes a pair's entry, e.g. once its collidables stop overlapping.
    pub fn remove(&mut self, pair: CollidablePair) -> Option<PairCacheEntry> {
        self.entries.remove(&pair)
    }

    pub fn get(&self, pair: CollidablePair) -> Option<&PairCacheEntry> {
        self.entries.get(&pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::arena::{Arena, Index};

    fn handle() -> BodyHandle {
        let mut arena: Arena<()> = Arena::new();
        BodyHandle::for_test(arena.insert(()))
    }

    fn constraint_handle(raw: usize) -> ConstraintHandle {
        crate::dynamics::solver::batch::ConstraintHandle::for_test(Index::from_raw_parts(raw, 0))
    }

    #[test]
    fn pair_order_does_not_matter_for_lookup() {
        let a = ColliderId::Body(handle());
        let b = ColliderId::Body(handle());
        assert_eq!(CollidablePair::new(a, b), CollidablePair::new(b, a));
    }

    #[test]
    fn absent_pair_requests_creation() {
        let cache = PairCache::new();
        let pair = CollidablePair::new(ColliderId::Body(handle()), ColliderId::Body(handle()));
        assert!(matches!(cache.classify(pair, ConstraintKind::Contact), PairUpdate::Create));
    }

    #[test]
    fn matching_kind_requests_in_place_update_with_prior_cache() {
        let mut cache = PairCache::new();
        let pair = CollidablePair::new(ColliderId::Body(handle()), ColliderId::Body(handle()));
        let h = constraint_handle(0);
        cache.insert(pair, PairCacheEntry { constraint_handle: h, constraint_kind: ConstraintKind::Contact, collision_cache: vec![(1, 5.0)] });

        match cache.classify(pair, ConstraintKind::Contact) {
            PairUpdate::UpdateInPlace { handle, collision_cache } => {
                assert_eq!(handle, h);
                assert_eq!(collision_cache, vec![(1, 5.0)]);
            }
            _ => panic!("expected UpdateInPlace"),
        }
    }

    #[test]
    fn changed_kind_requests_replacement() {
        let mut cache = PairCache::new();
        let pair = CollidablePair::new(ColliderId::Body(handle()), ColliderId::Body(handle()));
        let h = constraint_handle(0);
        cache.insert(pair, PairCacheEntry { constraint_handle: h, constraint_kind: ConstraintKind::Contact, collision_cache: vec![] });

        match cache.classify(pair, ConstraintKind::ContactNonConvex) {
            PairUpdate::ReplaceKind { old_handle } => assert_eq!(old_handle, h),
            _ => panic!("expected ReplaceKind"),
        }
    }
}
