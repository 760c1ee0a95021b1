//! Drives relative angular velocity about a shared axis toward
//! `target_velocity`, blended with a spring pulling the twist angle toward
//! `target_angle`, bounded by `max_torque`.

use arrayvec::ArrayVec;

use crate::dynamics::body::{BodyHandle, RigidBody};
use crate::dynamics::integration_parameters::IntegrationParameters;
use crate::dynamics::solver::constrained_body::ConstrainedBody;
use crate::math::{Isometry, Real, Vector};
use crate::utils::WBasis;

use super::{finish, resolve_body_pose, resolve_body_view, JointConstraint, JointContext};

fn twist_angle(axis: Vector, reference_a: Vector, reference_b: Vector) -> Real {
    let sin_part = reference_a.cross(&reference_b).dot(&axis);
    let cos_part = reference_a.dot(&reference_b);
    sin_part.atan2(cos_part)
}

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
    target_angle: Real,
    target_velocity: Real,
    max_torque: Real,
    params: &IntegrationParameters,
) -> JointConstraint {
    let b_view = resolve_body_view(body_b_view_source);
    let b_pose = resolve_body_pose(body_b_view_source);
    let ctx = JointContext::new(body_a, b_view, local_anchor_a, local_anchor_b, params);

    let axis_a = body_a.pose.rotation * local_axis_a;
    let axis_b = b_pose.rotation * local_axis_b;
    let [reference_a, _] = axis_a.orthonormal_basis();
    let [reference_b, _] = axis_b.orthonormal_basis();
    let angle_error = target_angle - twist_angle(axis_a, reference_a, reference_b);

    let mut rows: ArrayVec<_, 6> = ctx.point_rows(0.0).into_iter().collect();
    rows.push(ctx.motor_row(axis_a, target_velocity, angle_error, max_torque * params.dt));
    finish(body_a_handle, body_b, rows)
}
