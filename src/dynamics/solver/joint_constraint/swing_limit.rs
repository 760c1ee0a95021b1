//! One-sided cone limit: keeps the angle between `axis_a` and `axis_b`
//! below `max_angle`, inert while within the cone.

use arrayvec::ArrayVec;

use crate::dynamics::body::{BodyHandle, RigidBody};
use crate::dynamics::integration_parameters::IntegrationParameters;
use crate::dynamics::solver::constrained_body::ConstrainedBody;
use crate::math::{Isometry, Real, Vector};

use super::{finish, resolve_body_pose, resolve_body_view, JointConstraint, JointContext};

#[allow(clippy::too_many_arguments)]
pub fn build(
    body_a_handle: BodyHandle,
    body_a: &RigidBody,
    body_b: ConstrainedBody,
    body_b_view_source: Result<&RigidBody, &Isometry>,
    local_anchor_a: Vector,
    local_anchor_b: Vector,
    local_axis_a: Vector,
    local_axis_b: Vector,
    max_angle: Real,
    params: &IntegrationParameters,
) -> JointConstraint {
    let b_view = resolve_body_view(body_b_view_source);
    let b_pose = resolve_body_pose(body_b_view_source);
    let ctx = JointContext::new(body_a, b_view, local_anchor_a, local_anchor_b, params);

    let axis_a = body_a.pose.rotation * local_axis_a;
    let axis_b = b_pose.rotation * local_axis_b;
    let cos_angle = axis_a.dot(&axis_b).clamp(-1.0, 1.0);
    let angle = cos_angle.acos();
    let violation = angle - max_angle;

    let swing_axis = axis_a.cross(&axis_b);
    let swing_axis = if swing_axis.norm() > 1.0e-9 {
        swing_axis.normalize()
    } else {
        axis_a.cross(&Vector::x()).normalize()
    };

    let mut rows: ArrayVec<_, 6> = ctx.point_rows(0.0).into_iter().collect();
    rows.push(ctx.limit_row(swing_axis, violation));
    finish(body_a_handle, body_b, rows)
}
