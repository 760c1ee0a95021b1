//! Single-body spring pulling a local anchor on body A toward a moving
//! world-space target point, bounded by `max_force` — the "mouse drag"
//! joint.

use arrayvec::ArrayVec;

use crate::dynamics::body::{BodyHandle, RigidBody};
use crate::dynamics::integration_parameters::IntegrationParameters;
use crate::dynamics::solver::constrained_body::ConstrainedBody;
use crate::math::{Isometry, Real, Vector};

use super::{finish, JointConstraint, JointContext};

pub fn build(
    body_a_handle: BodyHandle,
    body_a: &RigidBody,
    local_anchor_a: Vector,
    target_world_point: Vector,
    max_force: Real,
    params: &IntegrationParameters,
) -> JointConstraint {
    let target_pose = Isometry::from_parts(target_world_point.into(), crate::math::Rotation::identity());
    let b_view = super::BodyView::anchored(&target_pose);
    let ctx = JointContext::new(body_a, b_view, local_anchor_a, Vector::zeros(), params);
    let rows: ArrayVec<_, 6> = ctx.point_rows(max_force).into_iter().collect();
    finish(body_a_handle, ConstrainedBody::Kinematic(target_pose), rows)
}
