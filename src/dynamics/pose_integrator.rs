//! Advances bodies' poses and velocities, refreshes world inertia, runs the
//! user velocity callback, updates sleep candidacy, and predicts AABBs
//! (component design §4.4).

use crate::dynamics::body::rigid_body::RigidBody;
use crate::dynamics::integration_parameters::IntegrationParameters;
use crate::geometry::broad_phase::Aabb;
use crate::geometry::collidable::{ContinuityMode, ShapeHandle, ShapeType};
use crate::math::{AngVector, Real, Rotation, Vector, ANGULAR_VELOCITY_EPSILON};

/// User-supplied hooks for the pose integrator (external interfaces §6).
///
/// `local_half_extents` is not named in the original callback contract but
/// is required to make step 6 ("emit a predicted AABB") buildable: shape
/// geometry is out of scope for this crate (§1), so whatever owns shape
/// storage must supply a conservative local bound the same way it supplies
/// a narrow-phase tester.
pub trait PoseIntegratorCallbacks {
    /// Called once per step before any body is integrated, e.g. to refresh
    /// a time-varying gravity vector.
    fn prepare_for_integration(&mut self, _dt: Real) {}

    /// Applies external forces (typically gravity/drag) to one body's
    /// velocity. `worker` is reserved for multi-worker callers; single
    /// threaded integration always passes `0`.
    fn integrate_velocity(
        &mut self,
        body_index: usize,
        pose: &crate::math::Isometry,
        local_inertia: &crate::math::AngularInertia,
        worker: usize,
        linvel: &mut Vector,
        angvel: &mut AngVector,
    );

    /// Conservative local-space half-extents of a collidable's shape.
    fn local_half_extents(&self, shape: ShapeHandle, shape_type: ShapeType) -> Vector;
}

pub struct PoseIntegrator;

impl PoseIntegrator {
    /// Full integrate-and-predict: mutates pose, velocity, and world
    /// inertia, then returns predicted AABBs for every active body with a
    /// collidable.
    pub fn integrate<C: PoseIntegratorCallbacks>(
        bodies: &mut [RigidBody],
        params: &IntegrationParameters,
        callbacks: &mut C,
    ) -> Vec<(usize, Aabb)> {
        callbacks.prepare_for_integration(params.dt);
        let mut predicted = Vec::new();
        for (index, body) in bodies.iter_mut().enumerate() {
            Self::integrate_pose(body, params.dt);

            let mut linvel = body.linvel;
            let mut angvel = body.angvel;
            callbacks.integrate_velocity(index, &body.pose, &body.inverse_inertia_local, 0, &mut linvel, &mut angvel);
            body.linvel = linvel;
            body.angvel = angvel;

            body.activity.update(body.linvel, body.angvel);

            if let Some(collidable) = &body.collidable {
                let half_extents = callbacks.local_half_extents(collidable.shape, collidable.shape_type);
                predicted.push((index, predicted_aabb(body, half_extents, params.dt)));
            }
        }
        predicted
    }

    /// Predict-only variant (component design §4.4, "Two variants exist"):
    /// computes predicted AABBs without mutating pose, velocity, or world
    /// inertia. Used by timesteppers that integrate later in the step.
    pub fn predict<C: PoseIntegratorCallbacks>(
        bodies: &[RigidBody],
        params: &IntegrationParameters,
        callbacks: &C,
    ) -> Vec<(usize, Aabb)> {
        bodies
            .iter()
            .enumerate()
            .filter_map(|(index, body)| {
                body.collidable.as_ref().map(|c| {
                    let half_extents = callbacks.local_half_extents(c.shape, c.shape_type);
                    (index, predicted_aabb(body, half_extents, params.dt))
                })
            })
            .collect()
    }

    fn integrate_pose(body: &mut RigidBody, dt: Real) {
        body.pose.translation.vector += body.linvel * dt;

        if body.angvel.norm() > ANGULAR_VELOCITY_EPSILON {
            // `UnitQuaternion::new` of a scaled axis (axis * angle) applies
            // exactly the half-angle construction from component design
            // §4.4 step 2: q = (axis * sin(half_angle), cos(half_angle)).
            let delta: Rotation = Rotation::new(body.angvel * dt);
            body.pose.rotation = Rotation::new_normalize(body.pose.rotation.into_inner() * delta.into_inner());
        }

        body.update_world_inertia();
    }
}

fn predicted_aabb(body: &RigidBody, half_extents: Vector, dt: Real) -> Aabb {
    let collidable = body.collidable.as_ref().expect("predicted_aabb requires a collidable");
    let margin = Vector::new(
        collidable.speculative_margin,
        collidable.speculative_margin,
        collidable.speculative_margin,
    );
    let continuity_expansion = match collidable.continuity {
        ContinuityMode::Continuous => Vector::new(
            body.linvel.x.abs() * dt,
            body.linvel.y.abs() * dt,
            body.linvel.z.abs() * dt,
        ),
        ContinuityMode::Discrete => Vector::zeros(),
    };
    let half = half_extents + margin + continuity_expansion;
    let center = body.pose.translation.vector;
    Aabb::new(center - half, center + half)
}
