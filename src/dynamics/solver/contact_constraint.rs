//! Penetration and friction constraint rows for convex and non-convex
//! manifolds (component design §4.7 "contact constraints").

use arrayvec::ArrayVec;

use crate::dynamics::integration_parameters::IntegrationParameters;
use crate::dynamics::solver::constrained_body::{soft_constraint_coefficients, ConstrainedBody};
use crate::geometry::manifold::MAX_SOLVER_CONTACTS;
use crate::math::{AngVector, AngularInertia, Isometry, Real, Vector};
use crate::utils::{WAngularInertia, WBasis, WCross, WCrossMatrix, WDot};

/// A view of whichever side of a contact a body sits on, reduced to just
/// what the constraint math needs. Lets penetration/friction rows be
/// written once and reused for dynamic-vs-dynamic and dynamic-vs-static
/// pairs alike (a static's `inverse_mass` and `inverse_inertia` are zero).
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

    fn fixed(pose: &Isometry) -> Self {
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

/// One scalar row of the constraint: a Jacobian direction plus the scalar
/// bookkeeping (effective mass, bias velocity, accumulated impulse, and an
/// optional impulse bound coupling it to another row, e.g. friction bounded
/// by the sibling normal impulse).
#[derive(Clone, Copy, Debug)]
struct ContactRow {
    r_a: Vector,
    r_b: Vector,
    dir: Vector,
    effective_mass: Real,
    bias_velocity: Real,
    cfm: Real,
    accumulated_impulse: Real,
}

impl ContactRow {
    fn new(r_a: Vector, r_b: Vector, dir: Vector, a: &BodyView, b: &BodyView, bias_velocity: Real, cfm: Real) -> Self {
        let ra_cross_n = r_a.gcross(dir);
        let rb_cross_n = r_b.gcross(dir);
        let inv_mass_sum = a.inverse_mass + b.inverse_mass;
        let angular_term =
            a.inverse_inertia.transform_vector(ra_cross_n).gdot(ra_cross_n) + b.inverse_inertia.transform_vector(rb_cross_n).gdot(rb_cross_n);
        let k = inv_mass_sum + angular_term;
        ContactRow {
            r_a,
            r_b,
            dir,
            effective_mass: if k > 1.0e-12 { cfm / k } else { 0.0 },
            bias_velocity,
            cfm,
            accumulated_impulse: 0.0,
        }
    }

    fn relative_velocity(&self, a: &BodyView, b: &BodyView) -> Real {
        (b.point_velocity(self.r_b) - a.point_velocity(self.r_a)).gdot(self.dir)
    }

    fn apply_impulse(&self, magnitude: Real, a: &mut BodyView, b: &mut BodyView) {
        let impulse = self.dir * magnitude;
        a.linvel -= impulse * a.inverse_mass;
        a.angvel -= a.inverse_inertia.transform_vector(self.r_a.gcross(impulse));
        b.linvel += impulse * b.inverse_mass;
        b.angvel += b.inverse_inertia.transform_vector(self.r_b.gcross(impulse));
    }
}

struct ContactPointConstraint {
    normal: ContactRow,
    friction: [ContactRow; 2],
    friction_coefficient: Real,
}

impl ContactPointConstraint {
    fn warm_start(&mut self, a: &mut BodyView, b: &mut BodyView, coefficient: Real) {
        self.normal.accumulated_impulse *= coefficient;
        for row in &mut self.friction {
            row.accumulated_impulse *= coefficient;
        }
        self.normal.apply_impulse(self.normal.accumulated_impulse, a, b);
        for row in &self.friction {
            row.apply_impulse(row.accumulated_impulse, a, b);
        }
    }

    fn solve(&mut self, a: &mut BodyView, b: &mut BodyView) {
        // Friction first, bounded by the *previous* iteration's normal
        // impulse (component design: iterative solve uses stale coupling
        // within a single pass, matching warm-started PGS solvers).
        let max_friction = self.friction_coefficient * self.normal.accumulated_impulse.max(0.0);
        for row in &mut self.friction {
            let lambda = -row.relative_velocity(a, b) * row.effective_mass;
            let new_total = (row.accumulated_impulse + lambda).clamp(-max_friction, max_friction);
            let applied = new_total - row.accumulated_impulse;
            row.accumulated_impulse = new_total;
            row.apply_impulse(applied, a, b);
        }

        let row = &mut self.normal;
        let separating_velocity = row.relative_velocity(a, b);
        let lambda = -(separating_velocity - row.bias_velocity) * row.effective_mass;
        let new_total = (row.accumulated_impulse + lambda).max(0.0);
        let applied = new_total - row.accumulated_impulse;
        row.accumulated_impulse = new_total;
        row.apply_impulse(applied, a, b);
    }
}

/// Prestep data and running state for a convex-manifold contact (component
/// design §4.6/§4.7). One entry per colliding pair; the pair's up-to-four
/// contact points are solved together, friction bounded by each point's own
/// normal impulse.
pub struct ContactConstraint {
    body_a: crate::dynamics::body::BodyHandle,
    body_b: ConstrainedBody,
    points: ArrayVec<ContactPointConstraint, MAX_SOLVER_CONTACTS>,
}

/// Prestep data for a non-convex manifold: identical math, but each point
/// carries its own normal rather than sharing the manifold's.
pub struct ContactNonConvexConstraint {
    body_a: crate::dynamics::body::BodyHandle,
    body_b: ConstrainedBody,
    points: ArrayVec<ContactPointConstraint, MAX_SOLVER_CONTACTS>,
}

fn build_point(
    world_point_a: Vector,
    world_point_b: Vector,
    normal: Vector,
    depth: Real,
    friction_coefficient: Real,
    a: &BodyView,
    b: &BodyView,
    params: &IntegrationParameters,
) -> ContactPointConstraint {
    let r_a = world_point_a - a.position;
    let r_b = world_point_b - b.position;
    let (erp, cfm) = soft_constraint_coefficients(params.contact_natural_frequency, params.contact_damping_ratio, params.dt);
    // Penetration is corrected, separation (positive depth) is not: a
    // speculative contact must not pull bodies together before they touch.
    let bias_velocity = if depth < 0.0 {
        (-depth * erp / params.dt).min(params.max_recovery_velocity)
    } else {
        0.0
    };
    let normal_row = ContactRow::new(r_a, r_b, normal, a, b, bias_velocity, cfm);
    let [t1, t2] = normal.orthonormal_basis();
    ContactPointConstraint {
        normal: normal_row,
        friction: [
            ContactRow::new(r_a, r_b, t1, a, b, 0.0, 1.0),
            ContactRow::new(r_a, r_b, t2, a, b, 0.0, 1.0),
        ],
        friction_coefficient,
    }
}

impl ContactConstraint {
    /// The bodies this constraint references, for building the sleep
    /// island graph.
    pub fn bodies(&self) -> (crate::dynamics::body::BodyHandle, ConstrainedBody) {
        (self.body_a, self.body_b)
    }

    pub fn prestep(
        body_a_handle: crate::dynamics::body::BodyHandle,
        body_a: &crate::dynamics::body::RigidBody,
        body_b: ConstrainedBody,
        body_b_pose_or_dynamic: Result<&crate::dynamics::body::RigidBody, &Isometry>,
        normal: Vector,
        contacts: &[crate::geometry::contact::ConvexContact],
        friction_coefficient: Real,
        params: &IntegrationParameters,
    ) -> Self {
        let a = BodyView::dynamic(body_a);
        let b = match body_b_pose_or_dynamic {
            Ok(dyn_b) => BodyView::dynamic(dyn_b),
            Err(pose) => BodyView::fixed(pose),
        };
        let world_rotation_a = body_a.pose.rotation;
        let world_translation_b = b.position;
        let points = contacts
            .iter()
            .map(|c| {
                let world_point_a = world_rotation_a * c.local_point_a.coords + body_a.pose.translation.vector;
                let world_point_b = world_point_a - normal * c.depth.min(0.0);
                let _ = world_translation_b;
                build_point(world_point_a, world_point_b, normal, c.depth, friction_coefficient, &a, &b, params)
            })
            .collect();
        ContactConstraint {
            body_a: body_a_handle,
            body_b,
            points,
        }
    }

    /// Seeds each point's accumulated normal impulse from the pair cache's
    /// warm-start carry-over (component design §4.5, "Warm start
    /// carry-over"). Friction impulses always start at zero; only the
    /// normal impulse is carried across frames.
    pub fn seed_impulses(&mut self, normal_impulses: &[Real]) {
        for (point, &impulse) in self.points.iter_mut().zip(normal_impulses) {
            point.normal.accumulated_impulse = impulse;
        }
    }

    /// Each point's current accumulated normal impulse, in the same order
    /// the manifold's contacts were given to [`Self::prestep`]. Harvested
    /// after a solve to seed next frame's replacement constraint.
    pub fn normal_impulses(&self) -> Vec<Real> {
        self.points.iter().map(|p| p.normal.accumulated_impulse).collect()
    }

    pub fn warm_start(&mut self, bodies: &mut crate::dynamics::body::BodySet, statics: &crate::dynamics::body::StaticSet, params: &IntegrationParameters) {
        self.for_each_pair(bodies, statics, |p, a, b| p.warm_start(a, b, params.warm_start_coefficient));
    }

    pub fn solve(&mut self, bodies: &mut crate::dynamics::body::BodySet, statics: &crate::dynamics::body::StaticSet) {
        self.for_each_pair(bodies, statics, |p, a, b| p.solve(a, b));
    }

    fn for_each_pair(
        &mut self,
        bodies: &mut crate::dynamics::body::BodySet,
        statics: &crate::dynamics::body::StaticSet,
        mut f: impl FnMut(&mut ContactPointConstraint, &mut BodyView, &mut BodyView),
    ) {
        let mut a = BodyView::dynamic(bodies.get(self.body_a).expect("contact constraint body_a missing"));
        let mut b = match self.body_b {
            ConstrainedBody::Dynamic(h) => BodyView::dynamic(bodies.get(h).expect("contact constraint body_b missing")),
            ConstrainedBody::Static(h) => BodyView::fixed(&statics.get(h).expect("contact constraint static body_b missing").pose),
            ConstrainedBody::Kinematic(pose) => BodyView::fixed(&pose),
        };
        for point in &mut self.points {
            f(point, &mut a, &mut b);
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

impl ContactNonConvexConstraint {
    /// The bodies this constraint references, for building the sleep
    /// island graph.
    pub fn bodies(&self) -> (crate::dynamics::body::BodyHandle, ConstrainedBody) {
        (self.body_a, self.body_b)
    }

    pub fn prestep(
        body_a_handle: crate::dynamics::body::BodyHandle,
        body_a: &crate::dynamics::body::RigidBody,
        body_b: ConstrainedBody,
        body_b_pose_or_dynamic: Result<&crate::dynamics::body::RigidBody, &Isometry>,
        contacts: &[crate::geometry::contact::NonConvexContact],
        friction_coefficient: Real,
        params: &IntegrationParameters,
    ) -> Self {
        let a = BodyView::dynamic(body_a);
        let b = match body_b_pose_or_dynamic {
            Ok(dyn_b) => BodyView::dynamic(dyn_b),
            Err(pose) => BodyView::fixed(pose),
        };
        let world_rotation_a = body_a.pose.rotation;
        let points = contacts
            .iter()
            .map(|c| {
                let world_point_a = world_rotation_a * c.local_point_a.coords + body_a.pose.translation.vector;
                let world_point_b = world_point_a - c.normal * c.depth.min(0.0);
                build_point(world_point_a, world_point_b, c.normal, c.depth, friction_coefficient, &a, &b, params)
            })
            .collect();
        ContactNonConvexConstraint {
            body_a: body_a_handle,
            body_b,
            points,
        }
    }

    /// See [`ContactConstraint::seed_impulses`].
    pub fn seed_impulses(&mut self, normal_impulses: &[Real]) {
        for (point, &impulse) in self.points.iter_mut().zip(normal_impulses) {
            point.normal.accumulated_impulse = impulse;
        }
    }

    /// See [`ContactConstraint::normal_impulses`].
    pub fn normal_impulses(&self) -> Vec<Real> {
        self.points.iter().map(|p| p.normal.accumulated_impulse).collect()
    }

    pub fn warm_start(&mut self, bodies: &mut crate::dynamics::body::BodySet, statics: &crate::dynamics::body::StaticSet, params: &IntegrationParameters) {
        self.for_each_pair(bodies, statics, |p, a, b| p.warm_start(a, b, params.warm_start_coefficient));
    }

    pub fn solve(&mut self, bodies: &mut crate::dynamics::body::BodySet, statics: &crate::dynamics::body::StaticSet) {
        self.for_each_pair(bodies, statics, |p, a, b| p.solve(a, b));
    }

    fn for_each_pair(
        &mut self,
        bodies: &mut crate::dynamics::body::BodySet,
        statics: &crate::dynamics::body::StaticSet,
        mut f: impl FnMut(&mut ContactPointConstraint, &mut BodyView, &mut BodyView),
    ) {
        let mut a = BodyView::dynamic(bodies.get(self.body_a).expect("contact constraint body_a missing"));
        let mut b = match self.body_b {
            ConstrainedBody::Dynamic(h) => BodyView::dynamic(bodies.get(h).expect("contact constraint body_b missing")),
            ConstrainedBody::Static(h) => BodyView::fixed(&statics.get(h).expect("contact constraint static body_b missing").pose),
            ConstrainedBody::Kinematic(pose) => BodyView::fixed(&pose),
        };
        for point in &mut self.points {
            f(point, &mut a, &mut b);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::body::rigid_body::BodyDescription;
    use crate::geometry::contact::ConvexContact;

    fn resting_body(inverse_mass: Real, height: Real) -> crate::dynamics::body::RigidBody {
        let mut desc = BodyDescription::default();
        desc.inverse_mass = inverse_mass;
        desc.pose.translation.vector = Vector::new(0.0, height, 0.0);
        desc.build()
    }

    #[test]
    fn penetrating_contact_produces_positive_separating_bias() {
        let a = resting_body(1.0, 1.0);
        let ground_pose = Isometry::identity();
        let contacts = [ConvexContact {
            local_point_a: crate::math::Point::new(0.0, -0.5, 0.0),
            depth: -0.01,
            feature_id: 0,
        }];
        let params = IntegrationParameters::default();
        let handle = crate::dynamics::body::BodySet::new().add(&BodyDescription::default());
        let constraint = ContactConstraint::prestep(
            handle,
            &a,
            ConstrainedBody::Static(crate::dynamics::body::StaticSet::new().add(&crate::dynamics::body::StaticDescription {
                pose: ground_pose,
                collidable: None,
            })),
            Err(&ground_pose),
            Vector::new(0.0, 1.0, 0.0),
            &contacts,
            0.5,
            &params,
        );
        assert_eq!(constraint.points.len(), 1);
        assert!(constraint.points[0].normal.bias_velocity > 0.0);
    }

    #[test]
    fn non_convex_solve_pushes_a_penetrating_body_out() {
        use crate::geometry::contact::NonConvexContact;

        let mut bodies = crate::dynamics::body::BodySet::new();
        let mut desc = BodyDescription::default();
        desc.inverse_mass = 1.0;
        desc.pose.translation.vector = Vector::new(0.0, 1.0, 0.0);
        desc.linvel = Vector::new(0.0, -1.0, 0.0);
        let handle = bodies.add(&desc);

        let ground_pose = Isometry::identity();
        let mut statics = crate::dynamics::body::StaticSet::new();
        let contacts = [NonConvexContact {
            local_point_a: crate::math::Point::new(0.0, -0.5, 0.0),
            normal: Vector::new(0.0, 1.0, 0.0),
            depth: -0.01,
            feature_id: 0,
        }];
        let params = IntegrationParameters::default();
        let mut constraint = ContactNonConvexConstraint::prestep(
            handle,
            bodies.get(handle).unwrap(),
            ConstrainedBody::Static(statics.add(&crate::dynamics::body::StaticDescription { pose: ground_pose, collidable: None })),
            Err(&ground_pose),
            &contacts,
            0.5,
            &params,
        );

        let before = bodies.get(handle).unwrap().linvel.y;
        constraint.warm_start(&mut bodies, &statics, &params);
        constraint.solve(&mut bodies, &statics);
        let after = bodies.get(handle).unwrap().linvel.y;

        assert!(after > before, "solve should push the body away from the ground: {before} -> {after}");
    }

    #[test]
    fn separated_speculative_contact_has_zero_bias() {
        let a = resting_body(1.0, 1.0);
        let ground_pose = Isometry::identity();
        let contacts = [ConvexContact {
            local_point_a: crate::math::Point::new(0.0, -0.5, 0.0),
            depth: 0.01,
            feature_id: 0,
        }];
        let params = IntegrationParameters::default();
        let constraint = ContactConstraint::prestep(
            crate::dynamics::body::BodySet::new().add(&BodyDescription::default()),
            &a,
            ConstrainedBody::Static(crate::dynamics::body::StaticSet::new().add(&crate::dynamics::body::StaticDescription {
                pose: ground_pose,
                collidable: None,
            })),
            Err(&ground_pose),
            Vector::new(0.0, 1.0, 0.0),
            &contacts,
            0.5,
            &params,
        );
        assert_eq!(constraint.points[0].normal.bias_velocity, 0.0);
    }
}
