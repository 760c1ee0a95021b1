//! Dispatches broad-phase candidate pairs to a registered shape-pair tester
//! and turns the result into a (possibly reduced) [`Manifold`] (component
//! design §4.5).
//!
//! Concrete collision geometry is out of this crate's scope (§1): testers
//! are supplied by the embedding application and keyed only by the opaque
//! [`ShapeType`] tag, the same way [`Collidable`] never looks inside a
//! shape.

use arrayvec::ArrayVec;
use rustc_hash::FxHashMap;

use crate::geometry::collidable::{ShapeHandle, ShapeType};
use crate::geometry::contact::{ConvexContact, NonConvexContact};
use crate::geometry::manifold::{self, Manifold, MAX_CONVEX_CONTACTS};
use crate::math::{Isometry, Vector};

/// What a tester hands back for one pair, before non-convex reduction.
pub enum TestOutcome {
    /// The pair does not overlap this step.
    None,
    Convex {
        normal: Vector,
        contacts: ArrayVec<ConvexContact, MAX_CONVEX_CONTACTS>,
    },
    NonConvex {
        candidates: Vec<NonConvexContact>,
    },
}

/// A shape-pair collision tester, registered by [`ShapeType`] (component
/// design §4.5). Receives only opaque shape handles and world poses; the
/// caller resolves `ShapeHandle` against whatever shape storage it owns.
///
/// `Downcast` lets a caller that just pulled a `&dyn PairTester` back out of
/// its own bookkeeping (e.g. to reconfigure one in place) recover the
/// concrete type without this crate needing to know it.
pub trait PairTester: downcast_rs::Downcast + Send + Sync {
    fn test(&self, shape_a: ShapeHandle, pose_a: &Isometry, shape_b: ShapeHandle, pose_b: &Isometry) -> TestOutcome;
}
downcast_rs::impl_downcast!(PairTester);

fn canonical_shape_pair(a: ShapeType, b: ShapeType) -> (ShapeType, ShapeType) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// The tester registry plus dispatch logic. One instance is shared across a
/// simulation's narrow-phase updates.
#[derive(Default)]
pub struct NarrowPhase {
    testers: FxHashMap<(ShapeType, ShapeType), Box<dyn PairTester>>,
}

impl NarrowPhase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `tester` for `(a, b)`, in either order. Fails if a tester
    /// is already registered for this shape-type pair (component design
    /// §4.10: a construction-time, recoverable error, not a contract
    /// violation).
    pub fn register(&mut self, a: ShapeType, b: ShapeType, tester: Box<dyn PairTester>) -> Result<(), crate::errors::EngineError> {
        let key = canonical_shape_pair(a, b);
        if self.testers.contains_key(&key) {
            return Err(crate::errors::EngineError::TesterAlreadyRegistered(key.0, key.1));
        }
        self.testers.insert(key, tester);
        Ok(())
    }

    /// Looks up the tester for `(shape_type_a, shape_type_b)`, runs it, and
    /// (for a non-convex result) reduces the candidate list to at most
    /// [`manifold::MAX_SOLVER_CONTACTS`] points. Returns `None` both when no
    /// tester is registered for this shape-type pair and when the tester
    /// itself reports no contact — narrow-phase callers treat an
    /// unregistered pair as "never collides", not as an error.
    pub fn test(
        &self,
        shape_type_a: ShapeType,
        shape_a: ShapeHandle,
        pose_a: &Isometry,
        shape_type_b: ShapeType,
        shape_b: ShapeHandle,
        pose_b: &Isometry,
    ) -> Option<Manifold> {
        let key = canonical_shape_pair(shape_type_a, shape_type_b);
        let tester = self.testers.get(&key)?;
        let outcome = if key == (shape_type_a, shape_type_b) {
            tester.test(shape_a, pose_a, shape_b, pose_b)
        } else {
            tester.test(shape_b, pose_b, shape_a, pose_a)
        };
        match outcome {
            TestOutcome::None => None,
            TestOutcome::Convex { normal, contacts } if contacts.is_empty() => {
                let _ = normal;
                None
            }
            TestOutcome::Convex { normal, contacts } => Some(Manifold::Convex { normal, contacts }),
            TestOutcome::NonConvex { candidates } => {
                let contacts = manifold::reduce_non_convex(&candidates);
                if contacts.is_empty() {
                    None
                } else {
                    Some(Manifold::NonConvex { contacts })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Point;

    struct AlwaysTouching;
    impl PairTester for AlwaysTouching {
        fn test(&self, _shape_a: ShapeHandle, _pose_a: &Isometry, _shape_b: ShapeHandle, _pose_b: &Isometry) -> TestOutcome {
            let mut contacts = ArrayVec::new();
            contacts.push(ConvexContact { local_point_a: Point::origin(), depth: 0.01, feature_id: 0 });
            TestOutcome::Convex { normal: Vector::y(), contacts }
        }
    }

    #[test]
    fn registered_pair_dispatches_regardless_of_argument_order() {
        let mut np = NarrowPhase::new();
        np.register(ShapeType(1), ShapeType(2), Box::new(AlwaysTouching)).unwrap();

        let identity = Isometry::identity();
        assert!(np.test(ShapeType(1), ShapeHandle(0), &identity, ShapeType(2), ShapeHandle(1), &identity).is_some());
        assert!(np.test(ShapeType(2), ShapeHandle(1), &identity, ShapeType(1), ShapeHandle(0), &identity).is_some());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut np = NarrowPhase::new();
        np.register(ShapeType(1), ShapeType(2), Box::new(AlwaysTouching)).unwrap();
        assert!(np.register(ShapeType(2), ShapeType(1), Box::new(AlwaysTouching)).is_err());
    }

    #[test]
    fn unregistered_pair_yields_no_manifold() {
        let np = NarrowPhase::new();
        let identity = Isometry::identity();
        assert!(np.test(ShapeType(9), ShapeHandle(0), &identity, ShapeType(10), ShapeHandle(1), &identity).is_none());
    }
}
