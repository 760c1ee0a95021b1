//! The geometric embodiment of a body or static (component design §3,
//! "Collidable reference").
//!
//! Concrete shape storage and collision-pair testers are out of scope for
//! this crate (§1); a [`Collidable`] only carries enough information for the
//! broad phase to place it in a tree and for the narrow phase to look up the
//! right tester by `(ShapeType, ShapeType)`.

use crate::geometry::broad_phase::LeafId;
use crate::math::Real;

/// Opaque handle into whatever shape storage the embedding application owns.
/// The engine never dereferences this; it is passed back verbatim to
/// narrow-phase testers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShapeHandle(pub u32);

/// A small integer tag identifying a shape's *kind* (sphere, capsule, box,
/// triangle, compound, mesh, ...). The narrow phase keys its tester registry
/// on an (unordered-but-canonicalized) pair of these; this crate assigns no
/// meaning to specific values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeType(pub u16);

/// Continuous-collision mode for a collidable, per component design §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinuityMode {
    /// Only discrete (per-step) collision is performed.
    Discrete,
    /// The collidable's predicted AABB accounts for its velocity so fast
    /// motion doesn't tunnel through thin geometry (component design §4.4
    /// step 6).
    Continuous,
}

/// The geometric half of a body or static: what shape it has, how far its
/// broad-phase bounds should be padded, and where its broad-phase leaf
/// lives.
#[derive(Debug, Clone, Copy)]
pub struct Collidable {
    pub shape: ShapeHandle,
    pub shape_type: ShapeType,
    /// Non-negative margin added to this collidable's AABB, and the
    /// furthest negative depth a contact against it may have and still
    /// count as "speculative" rather than discarded.
    pub speculative_margin: Real,
    pub continuity: ContinuityMode,
    /// Which broad-phase tree this collidable's leaf lives in, and its leaf
    /// id within that tree. `None` only transiently, between insertion into
    /// a body/static store and the broad-phase add that follows it.
    pub leaf: Option<LeafId>,
}

impl Collidable {
    pub fn new(shape: ShapeHandle, shape_type: ShapeType, speculative_margin: Real) -> Self {
        assert!(
            speculative_margin >= 0.0,
            "speculative margin must be non-negative"
        );
        Collidable {
            shape,
            shape_type,
            speculative_margin,
            continuity: ContinuityMode::Discrete,
            leaf: None,
        }
    }

    pub fn with_continuity(mut self, continuity: ContinuityMode) -> Self {
        self.continuity = continuity;
        self
    }
}

/// Canonicalizes a shape-type pair into a stable, order-independent key for
/// the narrow phase's tester registry.
pub fn canonical_pair(a: ShapeType, b: ShapeType) -> (ShapeType, ShapeType) {
    if a.0 <= b.0 {
        (a, b)
    } else {
        (b, a)
    }
}
