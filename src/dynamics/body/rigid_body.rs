//! A single dynamic body's state (component design §3, "Body").

use crate::geometry::collidable::{Collidable, ContinuityMode, ShapeHandle, ShapeType};
use crate::math::{AngVector, AngularInertia, Isometry, Real, Vector};

/// Per-body sleep bookkeeping (component design §4.4 step 5, §4.8).
#[derive(Debug, Clone, Copy)]
pub struct Activity {
    /// Squared-velocity threshold below which this body is a sleep
    /// candidate. Squared so the hot path avoids a `sqrt` (design notes,
    /// "sleep candidate epsilon").
    pub sleep_threshold: Real,
    pub min_steps_before_sleep: u32,
    pub steps_under_threshold: u32,
    pub sleep_candidate: bool,
}

impl Activity {
    pub fn new(sleep_threshold: Real, min_steps_before_sleep: u32) -> Self {
        Activity {
            sleep_threshold,
            min_steps_before_sleep,
            steps_under_threshold: 0,
            sleep_candidate: false,
        }
    }

    /// Component design §4.4 step 5.
    pub fn update(&mut self, linvel: Vector, angvel: AngVector) {
        let h = linvel.norm_squared() + angvel.norm_squared();
        if h > self.sleep_threshold {
            self.steps_under_threshold = 0;
            self.sleep_candidate = false;
        } else {
            self.steps_under_threshold += 1;
            if self.steps_under_threshold >= self.min_steps_before_sleep {
                self.sleep_candidate = true;
            }
        }
    }

    /// Resets the counters; used on user-driven wake (component design §4.8
    /// step 3, "reset-activity = true for user-driven wakes").
    pub fn reset(&mut self) {
        self.steps_under_threshold = 0;
        self.sleep_candidate = false;
    }
}

/// A dynamic rigid body: pose, velocity, local and world inertia, activity,
/// and an optional collidable.
#[derive(Debug, Clone)]
pub struct RigidBody {
    pub pose: Isometry,
    pub linvel: Vector,
    pub angvel: AngVector,
    pub inverse_mass: Real,
    pub inverse_inertia_local: AngularInertia,
    pub inverse_inertia_world: AngularInertia,
    pub activity: Activity,
    pub collidable: Option<Collidable>,
}

impl RigidBody {
    /// A kinematic body has zero inverse mass and zero inverse inertia: it
    /// participates in solves (so it can push dynamic bodies) but is never
    /// itself affected by an impulse (component design §4.2).
    pub fn is_kinematic(&self) -> bool {
        self.inverse_mass == 0.0 && self.inverse_inertia_local.is_zero()
    }

    /// Rotates the local inverse-inertia tensor into world space:
    /// `I⁻¹_world = R · I⁻¹_local · Rᵀ` (component design §4.4 step 3).
    pub fn update_world_inertia(&mut self) {
        use crate::utils::WAngularInertia as _;
        let r = self.pose.rotation.to_rotation_matrix();
        let rotated = self.inverse_inertia_local.transform_matrix(r.matrix()) * r.matrix().transpose();
        self.inverse_inertia_world = crate::utils::SdpMatrix3::from_matrix(&rotated);
    }
}

/// User-facing description of a body to create, per external interfaces §6.
#[derive(Debug, Clone)]
pub struct BodyDescription {
    pub pose: Isometry,
    pub linvel: Vector,
    pub angvel: AngVector,
    pub inverse_mass: Real,
    pub inverse_inertia_local: AngularInertia,
    pub collidable: Option<CollidableDescription>,
    pub sleep_threshold: Real,
    pub min_steps_before_sleep: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct CollidableDescription {
    pub shape: ShapeHandle,
    pub shape_type: ShapeType,
    pub speculative_margin: Real,
    pub continuity: ContinuityMode,
}

impl Default for BodyDescription {
    fn default() -> Self {
        BodyDescription {
            pose: Isometry::identity(),
            linvel: Vector::zeros(),
            angvel: AngVector::zeros(),
            inverse_mass: 1.0,
            inverse_inertia_local: AngularInertia::identity(),
            collidable: None,
            sleep_threshold: 0.01,
            min_steps_before_sleep: 60,
        }
    }
}

impl BodyDescription {
    pub fn build(&self) -> RigidBody {
        assert!(
            self.sleep_threshold >= 0.0,
            "sleep threshold must be non-negative"
        );
        assert!(
            self.min_steps_before_sleep >= 1,
            "minimum timesteps under threshold must be at least 1"
        );
        if let Some(c) = &self.collidable {
            assert!(
                c.speculative_margin >= 0.0,
                "speculative margin must be non-negative"
            );
        }
        let mut body = RigidBody {
            pose: self.pose,
            linvel: self.linvel,
            angvel: self.angvel,
            inverse_mass: self.inverse_mass,
            inverse_inertia_local: self.inverse_inertia_local,
            inverse_inertia_world: self.inverse_inertia_local,
            activity: Activity::new(self.sleep_threshold, self.min_steps_before_sleep),
            collidable: self
                .collidable
                .map(|c| Collidable::new(c.shape, c.shape_type, c.speculative_margin).with_continuity(c.continuity)),
        };
        body.update_world_inertia();
        body
    }
}
