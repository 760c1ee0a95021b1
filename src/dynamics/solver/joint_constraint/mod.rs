//! Joint constraints (component design §4.7, joint kinds enumerated in
//! [`ConstraintKind`]).
//!
//! Every joint kind in this crate (ball-socket, hinge, swivel-hinge,
//! swing-limit, twist-limit, angular-servo-motor, grab-servo) is built from
//! the same small vocabulary of rows: a coupled 3-axis point constraint that
//! pins an anchor on one body to an anchor on the other, and independent
//! 1-axis angular rows that lock, limit, or motor rotation about a given
//! axis. The per-kind modules below only decide which rows to build; the
//! prestep/warm-start/iterate math lives once, here.

pub mod angular_servo_motor;
pub mod ball_socket;
pub mod grab_servo;
pub mod hinge;
pub mod swing_limit;
pub mod swivel_hinge;
pub mod twist;

use arrayvec::ArrayVec;

use crate::dynamics::body::BodyHandle;
use crate::dynamics::solver::constrained_body::{soft_constraint_coefficients, ConstrainedBody};
use crate::math::{AngVector, AngularInertia, Isometry, Real, Vector};
use crate::utils::{WAngularInertia, WBasis, WCross, WDot};

const MAX_ROWS: usize = 6;

#[derive(Clone, Copy)]
struct BodyView {
    position: Vector,
    linvel: Vector,
    angvel: AngVector,
    inverse_mass: Real,
    inverse_inertia: AngularInertia,
}

impl BodyView {
    fn dynamic(body: &crate::dynamics::body::RigidBody) -> Self {
        BodyView {
            position: body.pose.translation.vector,
            linvel: body.linvel,
            angvel: body.angvel,
            inverse_mass: body.inverse_mass,
            inverse_inertia: body.inverse_inertia_world,
        }
    }

    fn anchored(pose: &Isometry) -> Self {
        BodyView {
            position: pose.translation.vector,
            linvel: Vector::zeros(),
            angvel: AngVector::zeros(),
            inverse_mass: 0.0,
            inverse_inertia: AngularInertia::zero(),
        }
    }

    fn point_velocity(&self, r: Vector) -> Vector {
        self.linvel + self.angvel.gcross(r)
    }
}

/// One scalar constraint row. `linear_a`/`linear_b` are zero for a pure
/// angular row; `r_a`/`r_b` (the anchor offsets used for the angular
/// contribution of a linear row) are zero for a pure angular row.
#[derive(Clone, Copy)]
struct JointRow {
    r_a: Vector,
    r_b: Vector,
    linear: Vector,
    angular_a: Vector,
    angular_b: Vector,
    target_velocity: Real,
    bias_velocity: Real,
    impulse_min: Real,
    impulse_max: Real,
    effective_mass: Real,
    accumulated_impulse: Real,
}

impl JointRow {
    fn linear(r_a: Vector, r_b: Vector, axis: Vector, a: &BodyView, b: &BodyView, target_velocity: Real, bias_velocity: Real, cfm: Real, impulse_min: Real, impulse_max: Real) -> Self {
        let angular_a = r_a.gcross(axis);
        let angular_b = r_b.gcross(axis);
        Self::assemble(r_a, r_b, axis, angular_a, angular_b, a, b, target_velocity, bias_velocity, cfm, impulse_min, impulse_max)
    }

    fn angular(axis: Vector, a: &BodyView, b: &BodyView, target_velocity: Real, bias_velocity: Real, cfm: Real, impulse_min: Real, impulse_max: Real) -> Self {
        Self::assemble(Vector::zeros(), Vector::zeros(), Vector::zeros(), axis, axis, a, b, target_velocity, bias_velocity, cfm, impulse_min, impulse_max)
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        r_a: Vector,
        r_b: Vector,
        linear: Vector,
        angular_a: Vector,
        angular_b: Vector,
        a: &BodyView,
        b: &BodyView,
        target_velocity: Real,
        bias_velocity: Real,
        cfm: Real,
        impulse_min: Real,
        impulse_max: Real,
    ) -> Self {
        let k = a.inverse_mass * linear.gdot(linear)
            + b.inverse_mass * linear.gdot(linear)
            + a.inverse_inertia.transform_vector(angular_a).gdot(angular_a)
            + b.inverse_inertia.transform_vector(angular_b).gdot(angular_b);
        JointRow {
            r_a,
            r_b,
            linear,
            angular_a,
            angular_b,
            target_velocity,
            bias_velocity,
            impulse_min,
            impulse_max,
            effective_mass: if k > 1.0e-12 { cfm / k } else { 0.0 },
            accumulated_impulse: 0.0,
        }
    }

    fn jacobian_velocity(&self, a: &BodyView, b: &BodyView) -> Real {
        let lin = (b.point_velocity(self.r_b) - a.point_velocity(self.r_a)).gdot(self.linear);
        let ang = b.angvel.gdot(self.angular_b) - a.angvel.gdot(self.angular_a);
        lin + ang
    }

    fn apply(&self, magnitude: Real, a: &mut BodyView, b: &mut BodyView) {
        let impulse = self.linear * magnitude;
        a.linvel -= impulse * a.inverse_mass;
        a.angvel -= a.inverse_inertia.transform_vector(self.r_a.gcross(impulse) + self.angular_a * magnitude);
        b.linvel += impulse * b.inverse_mass;
        b.angvel += b.inverse_inertia.transform_vector(self.r_b.gcross(impulse) + self.angular_b * magnitude);
    }

    fn warm_start(&mut self, a: &mut BodyView, b: &mut BodyView, coefficient: Real) {
        self.accumulated_impulse *= coefficient;
        self.apply(self.accumulated_impulse, a, b);
    }

    fn solve(&mut self, a: &mut BodyView, b: &mut BodyView) {
        let lambda = -(self.jacobian_velocity(a, b) - self.target_velocity - self.bias_velocity) * self.effective_mass;
        let new_total = (self.accumulated_impulse + lambda).clamp(self.impulse_min, self.impulse_max);
        let applied = new_total - self.accumulated_impulse;
        self.accumulated_impulse = new_total;
        self.apply(applied, a, b);
    }
}

/// The generic record shared by every joint kind named in [`ConstraintKind`].
/// What distinguishes a hinge from a ball-socket is purely which rows its
/// constructor populates.
pub struct JointConstraint {
    body_a: BodyHandle,
    body_b: ConstrainedBody,
    rows: ArrayVec<JointRow, MAX_ROWS>,
}

impl JointConstraint {
    /// The bodies this constraint references, for building the sleep
    /// island graph.
    pub fn bodies(&self) -> (BodyHandle, ConstrainedBody) {
        (self.body_a, self.body_b)
    }

    pub fn warm_start(&mut self, bodies: &mut crate::dynamics::body::BodySet, statics: &crate::dynamics::body::StaticSet, coefficient: Real) {
        self.for_each(bodies, statics, |row, a, b| row.warm_start(a, b, coefficient));
    }

    pub fn solve(&mut self, bodies: &mut crate::dynamics::body::BodySet, statics: &crate::dynamics::body::StaticSet) {
        self.for_each(bodies, statics, |row, a, b| row.solve(a, b));
    }

    fn for_each(
        &mut self,
        bodies: &mut crate::dynamics::body::BodySet,
        statics: &crate::dynamics::body::StaticSet,
        mut f: impl FnMut(&mut JointRow, &mut BodyView, &mut BodyView),
    ) {
        let mut a = BodyView::dynamic(bodies.get(self.body_a).expect("joint constraint body_a missing"));
        let mut b = match self.body_b {
            ConstrainedBody::Dynamic(h) => BodyView::dynamic(bodies.get(h).expect("joint constraint body_b missing")),
            ConstrainedBody::Static(h) => BodyView::anchored(&statics.get(h).expect("joint constraint static body_b missing").pose),
            ConstrainedBody::Kinematic(pose) => BodyView::anchored(&pose),
        };
        for row in &mut self.rows {
            f(row, &mut a, &mut b);
        }
        if let Some(body_a) = bodies.get_mut(self.body_a) {
            body_a.linvel = a.linvel;
            body_a.angvel = a.angvel;
        }
        if let ConstrainedBody::Dynamic(h) = self.body_b {
            if let Some(body_b) = bodies.get_mut(h) {
                body_b.linvel = b.linvel;
                body_b.angvel = b.angvel;
            }
        }
    }
}

/// Shared builder context: both anchor frames resolved to world space and
/// the two body views, so a per-kind constructor just decides which rows to
/// append.
struct JointContext<'a> {
    body_a: &'a crate::dynamics::body::RigidBody,
    a: BodyView,
    b: BodyView,
    anchor_a: Vector,
    anchor_b: Vector,
    r_a: Vector,
    r_b: Vector,
    params: &'a crate::dynamics::integration_parameters::IntegrationParameters,
}

impl<'a> JointContext<'a> {
    fn new(
        body_a: &'a crate::dynamics::body::RigidBody,
        b: BodyView,
        local_anchor_a: Vector,
        local_anchor_b: Vector,
        params: &'a crate::dynamics::integration_parameters::IntegrationParameters,
    ) -> Self {
        let a = BodyView::dynamic(body_a);
        let anchor_a = body_a.pose.rotation * local_anchor_a + a.position;
        // `local_anchor_b` is already expressed relative to body B's frame;
        // for an anchored (static/world) body B, the frame is identity.
        let anchor_b = local_anchor_b + b.position;
        JointContext {
            body_a,
            a,
            b,
            anchor_a,
            anchor_b,
            r_a: anchor_a - a.position,
            r_b: anchor_b - b.position,
            params,
        }
    }

    fn point_rows(&self, max_linear_force: Real) -> [JointRow; 3] {
        let (erp, cfm) = soft_constraint_coefficients(self.params.contact_natural_frequency, self.params.contact_damping_ratio, self.params.dt);
        let error = self.anchor_b - self.anchor_a;
        let bias = error * (erp / self.params.dt);
        let bound = if max_linear_force > 0.0 { max_linear_force } else { Real::MAX };
        [
            JointRow::linear(self.r_a, self.r_b, Vector::x(), &self.a, &self.b, 0.0, bias.x, cfm, -bound, bound),
            JointRow::linear(self.r_a, self.r_b, Vector::y(), &self.a, &self.b, 0.0, bias.y, cfm, -bound, bound),
            JointRow::linear(self.r_a, self.r_b, Vector::z(), &self.a, &self.b, 0.0, bias.z, cfm, -bound, bound),
        ]
    }

    /// Drives `axis_a` (on body A) and `axis_b` (on body B) to stay
    /// parallel, measured along the two directions perpendicular to
    /// `axis_a` so the row carries no twist-about-`axis_a` component.
    /// Hinge locks both rows (only rotation about the shared axis is
    /// free); swivel-hinge locks only the first (two angular DOF free).
    fn perpendicular_lock_rows(&self, axis_a: Vector, axis_b: Vector) -> [JointRow; 2] {
        let (erp, cfm) = soft_constraint_coefficients(self.params.contact_natural_frequency, self.params.contact_damping_ratio, self.params.dt);
        let error = axis_a.cross(&axis_b);
        let [perp1, perp2] = axis_a.orthonormal_basis();
        let bias1 = error.gdot(perp1) * erp / self.params.dt;
        let bias2 = error.gdot(perp2) * erp / self.params.dt;
        [
            JointRow::angular(perp1, &self.a, &self.b, 0.0, bias1, cfm, Real::MIN, Real::MAX),
            JointRow::angular(perp2, &self.a, &self.b, 0.0, bias2, cfm, Real::MIN, Real::MAX),
        ]
    }

    /// A one-sided limit on rotation about `axis`, active only once
    /// `current_angle` exceeds `limit` in the direction given by `sign`.
    fn limit_row(&self, axis: Vector, violation: Real) -> JointRow {
        let (erp, cfm) = soft_constraint_coefficients(self.params.contact_natural_frequency, self.params.contact_damping_ratio, self.params.dt);
        let bias = if violation > 0.0 { (violation * erp / self.params.dt).min(self.params.max_recovery_velocity) } else { 0.0 };
        JointRow::angular(axis, &self.a, &self.b, 0.0, bias, cfm, 0.0, Real::MAX)
    }

    /// A bounded motor driving relative angular velocity about `axis`
    /// toward `target_velocity`, optionally biased by a spring term toward
    /// `target_angle_error`.
    fn motor_row(&self, axis: Vector, target_velocity: Real, angle_error: Real, max_impulse: Real) -> JointRow {
        let (erp, cfm) = soft_constraint_coefficients(self.params.contact_natural_frequency, self.params.contact_damping_ratio, self.params.dt);
        let bias = angle_error * erp / self.params.dt;
        JointRow::angular(axis, &self.a, &self.b, target_velocity, bias, cfm, -max_impulse, max_impulse)
    }
}

fn finish(body_a: BodyHandle, body_b: ConstrainedBody, rows: ArrayVec<JointRow, MAX_ROWS>) -> JointConstraint {
    JointConstraint { body_a, body_b, rows }
}

fn resolve_body_view(source: Result<&crate::dynamics::body::RigidBody, &Isometry>) -> BodyView {
    match source {
        Ok(body) => BodyView::dynamic(body),
        Err(pose) => BodyView::anchored(pose),
    }
}

fn resolve_body_pose(source: Result<&crate::dynamics::body::RigidBody, &Isometry>) -> Isometry {
    match source {
        Ok(body) => body.pose,
        Err(pose) => *pose,
    }
}
