//! Point constraint plus a single locked perpendicular axis, leaving two
//! angular degrees of freedom free (swing about the shared axis, plus one
//! perpendicular swivel) — a universal-joint-style constraint.

use arrayvec::ArrayVec;

use crate::dynamics::body::{BodyHandle, RigidBody};
use crate::dynamics::integration_parameters::IntegrationParameters;
use crate::dynamics::solver::constrained_body::ConstrainedBody;
use crate::math::{Isometry, Vector};

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
    params: &IntegrationParameters,
) -> JointConstraint {
    let b_view = resolve_body_view(body_b_view_source);
    let b_pose = resolve_body_pose(body_b_view_source);
    let ctx = JointContext::new(body_a, b_view, local_anchor_a, local_anchor_b, params);

    let axis_a = body_a.pose.rotation * local_axis_a;
    let axis_b = b_pose.rotation * local_axis_b;

    let mut rows: ArrayVec<_, 6> = ctx.point_rows(0.0).into_iter().collect();
    let [first_lock, _second_free] = ctx.perpendicular_lock_rows(axis_a, axis_b);
    rows.push(first_lock);
    finish(body_a_handle, body_b, rows)
}
