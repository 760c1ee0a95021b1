//! Pins a point on body A to a point on body B (or a static anchor):
//! three linear rows, no angular constraint at all.

use arrayvec::ArrayVec;

use crate::dynamics::body::{BodyHandle, RigidBody};
use crate::dynamics::integration_parameters::IntegrationParameters;
use crate::dynamics::solver::constrained_body::ConstrainedBody;
use crate::math::{Isometry, Vector};

use super::{finish, resolve_body_view, JointContext, JointConstraint};

#[allow(clippy::too_many_arguments)]
pub fn build(
    body_a_handle: BodyHandle,
    body_a: &RigidBody,
    body_b: ConstrainedBody,
    body_b_view_source: Result<&RigidBody, &Isometry>,
    local_anchor_a: Vector,
    local_anchor_b: Vector,
    params: &IntegrationParameters,
) -> JointConstraint {
    let b = resolve_body_view(body_b_view_source);
    let ctx = JointContext::new(body_a, b, local_anchor_a, local_anchor_b, params);
    let rows: ArrayVec<_, 6> = ctx.point_rows(0.0).into_iter().collect();
    finish(body_a_handle, body_b, rows)
}
