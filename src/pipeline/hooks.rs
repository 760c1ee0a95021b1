//! Narrow-phase callback contracts (external interfaces §6): the embedding
//! application decides whether two collidables are even allowed to
//! generate contacts, and supplies the per-pair material once a manifold
//! exists.

use crate::geometry::manifold::Manifold;
use crate::geometry::pair_cache::{CollidablePair, ColliderId};
use crate::math::Real;

/// Spring settings for a pair's contact constraints (component design
/// §4.7, "Spring-damper terms").
#[derive(Debug, Clone, Copy)]
pub struct SpringParameters {
    pub natural_frequency: Real,
    pub damping_ratio: Real,
}

/// Per-pair contact material, supplied by [`NarrowPhaseHooks::configure_contact_manifold`].
#[derive(Debug, Clone, Copy)]
pub struct PairMaterial {
    pub friction_coefficient: Real,
    pub max_recovery_velocity: Real,
    pub spring: SpringParameters,
}

pub trait NarrowPhaseHooks {
    /// Filters which overlapping pairs are even tested. Returning `false` is
    /// not an error — it's "this pair is excluded from collision", e.g. for
    /// collision groups or a no-self-collision rule (component design §6).
    fn allow_contact_generation(&self, _worker: usize, _collidable_a: ColliderId, _collidable_b: ColliderId) -> bool {
        true
    }

    /// Called once a tester has produced a manifold for `pair`. Returning
    /// `(false, _)` drops the manifold without creating or updating a
    /// constraint, exactly like `allow_contact_generation` returning false —
    /// a filtering outcome, not an error.
    fn configure_contact_manifold(&self, worker: usize, pair: CollidablePair, manifold: &Manifold) -> (bool, PairMaterial);
}
