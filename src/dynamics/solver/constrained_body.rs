//! A constraint's "other side" is either a dynamic body (participates in
//! batch disjointness, gets velocity written back) or a static body (pose
//! only, never conflicts with another constraint and is never mutated).

use crate::dynamics::body::{BodyHandle, StaticHandle};
use crate::math::Isometry;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstrainedBody {
    Dynamic(BodyHandle),
    Static(StaticHandle),
    /// A moving reference frame with no body behind it at all, e.g. the
    /// drag target of a grab-servo joint. The pose is captured at prestep
    /// time; re-stepping the target means rebuilding the constraint.
    Kinematic(Isometry),
}

impl ConstrainedBody {
    pub fn as_dynamic(self) -> Option<BodyHandle> {
        match self {
            ConstrainedBody::Dynamic(h) => Some(h),
            _ => None,
        }
    }
}

/// Computes the soft-constraint ERP/CFM pair for a spring of the given
/// frequency and damping ratio (component design §4.7, contact softness and
/// joint spring parameters both route through this).
///
/// `erp` is the fraction of positional error corrected this step; `cfm`
/// scales the constraint's effective mass down to avoid overshoot. Derived
/// the standard way (e.g. Catto's soft constraints): treat the constraint as
/// a damped harmonic oscillator and integrate it implicitly over `dt`.
pub fn soft_constraint_coefficients(natural_frequency: crate::math::Real, damping_ratio: crate::math::Real, dt: crate::math::Real) -> (crate::math::Real, crate::math::Real) {
    use std::f64::consts::PI;
    let omega = 2.0 * PI as crate::math::Real * natural_frequency;
    let a1 = 2.0 * damping_ratio + dt * omega;
    let a2 = dt * omega * a1;
    let a3 = 1.0 / (1.0 + a2);
    let erp = omega * a1 * a3 * dt;
    let cfm = a3;
    (erp, cfm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stiffer_spring_corrects_more_error_per_step() {
        let (erp_soft, _) = soft_constraint_coefficients(5.0, 1.0, 1.0 / 60.0);
        let (erp_stiff, _) = soft_constraint_coefficients(60.0, 1.0, 1.0 / 60.0);
        assert!(erp_stiff > erp_soft);
        assert!(erp_stiff <= 1.0 + 1e-3);
    }
}
