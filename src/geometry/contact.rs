//! Individual contact points, as produced by narrow-phase testers (component
//! design §4.5).

use crate::math::{Point, Real, Vector};

/// Geometric identity of a contact within its shape pair. Must stay stable
/// across frames so warm-start impulses can be matched up (component design
/// §4.5, "Feature ids").
///
/// Reduction mixes child indices into this id so that compound shapes don't
/// collide id spaces; this crate treats the value as opaque and supplied by
/// the tester, combined (via [`mix_feature_id`]) only when reducing
/// non-convex manifolds.
pub type FeatureId = u64;

/// Combines a tester-supplied feature id with a child shape index, so that
/// two different compound children can't alias the same feature id.
pub fn mix_feature_id(feature_id: FeatureId, child_index: u32) -> FeatureId {
    feature_id ^ ((child_index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

/// One point of a convex manifold: all contacts in the manifold share
/// [`Manifold::Convex::normal`].
#[derive(Debug, Clone, Copy)]
pub struct ConvexContact {
    /// Contact point, in body-A local space, at the start of the step.
    pub local_point_a: Point,
    /// Signed penetration depth; negative means separated (a "speculative"
    /// contact, see component design §4.5 and the glossary).
    pub depth: Real,
    pub feature_id: FeatureId,
}

/// One point of a non-convex manifold: each contact carries its own normal.
#[derive(Debug, Clone, Copy)]
pub struct NonConvexContact {
    pub local_point_a: Point,
    pub normal: Vector,
    pub depth: Real,
    pub feature_id: FeatureId,
}
