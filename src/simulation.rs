//! The crate's top-level entry point (component design §6, "External
//! interfaces"): owns every piece of per-simulation state and wires them
//! together behind `add_body`/`add_static`/`solver.add`/`step`, so a caller
//! who doesn't want to own [`PhysicsPipeline`], [`BodySet`], [`SolverSet`]
//! etc. individually doesn't have to.

use crate::data::pool::Pool;
use crate::dynamics::body::rigid_body::BodyDescription;
use crate::dynamics::body::{BodyHandle, BodySet, StaticDescription, StaticHandle, StaticSet};
use crate::dynamics::integration_parameters::{AllocationHints, IntegrationParameters};
use crate::dynamics::pose_integrator::PoseIntegratorCallbacks;
use crate::dynamics::solver::joint_constraint::{angular_servo_motor, ball_socket, grab_servo, hinge, swing_limit, swivel_hinge, twist};
use crate::dynamics::solver::{ConstrainedBody, ConstraintHandle, ConstraintKind, SolverSet};
use crate::errors::EngineError;
use crate::geometry::broad_phase::{BroadPhase, DEFAULT_MARGIN};
use crate::geometry::collidable::{ShapeHandle, ShapeType};
use crate::geometry::narrow_phase::NarrowPhase;
use crate::geometry::pair_cache::{ColliderId, PairCache};
use crate::math::{Isometry, Real, Vector};
use crate::pipeline::hooks::NarrowPhaseHooks;
use crate::pipeline::{Counters, PhysicsPipeline};

/// Per-kind prestep fields for the two-body joint constraints (component
/// design §6: "descriptions enumerate exactly the prestep fields").
/// Grab-servo is intentionally not here — it anchors to a moving target
/// point rather than a second body, so it gets its own constructor
/// ([`Simulation::add_grab_servo`]) matching `grab_servo::build`'s own,
/// narrower signature.
#[derive(Debug, Clone, Copy)]
pub enum JointDescription {
    BallSocket { local_anchor_a: Vector, local_anchor_b: Vector },
    Hinge { local_anchor_a: Vector, local_anchor_b: Vector, local_axis_a: Vector, local_axis_b: Vector },
    SwivelHinge { local_anchor_a: Vector, local_anchor_b: Vector, local_axis_a: Vector, local_axis_b: Vector },
    SwingLimit { local_anchor_a: Vector, local_anchor_b: Vector, local_axis_a: Vector, local_axis_b: Vector, max_angle: Real },
    TwistLimit { local_anchor_a: Vector, local_anchor_b: Vector, local_axis_a: Vector, local_axis_b: Vector, min_angle: Real, max_angle: Real },
    AngularServoMotor { local_anchor_a: Vector, local_anchor_b: Vector, local_axis_a: Vector, local_axis_b: Vector, target_angle: Real, target_velocity: Real, max_torque: Real },
}

impl JointDescription {
    fn kind(&self) -> ConstraintKind {
        match self {
            JointDescription::BallSocket { .. } => ConstraintKind::BallSocket,
            JointDescription::Hinge { .. } => ConstraintKind::Hinge,
            JointDescription::SwivelHinge { .. } => ConstraintKind::SwivelHinge,
            JointDescription::SwingLimit { .. } => ConstraintKind::SwingLimit,
            JointDescription::TwistLimit { .. } => ConstraintKind::TwistLimit,
            JointDescription::AngularServoMotor { .. } => ConstraintKind::AngularServoMotor,
        }
    }
}

/// Monotonic allocator for opaque [`ShapeHandle`]s (component design §6,
/// `shapes.add`/`shapes.remove`). This crate never looks inside a shape
/// (see `geometry::collidable`'s module docs) so there is nothing to store
/// here beyond which handles are currently live; freed slots are recycled
/// the same way [`crate::data::pool::Pool`] recycles buffers.
#[derive(Debug, Default)]
struct ShapeTable {
    next: u32,
    free: Vec<u32>,
}

impl ShapeTable {
    fn add(&mut self) -> ShapeHandle {
        let id = self.free.pop().unwrap_or_else(|| {
            let id = self.next;
            self.next += 1;
            id
        });
        ShapeHandle(id)
    }

    fn remove(&mut self, handle: ShapeHandle) {
        self.free.push(handle.0);
    }
}

/// Owns every piece of simulation state: bodies, statics, the broad and
/// narrow phases, the pair cache, the constraint graph, and the pipeline
/// that steps them. Generic over the two callback contracts the embedding
/// application supplies (component design §6).
pub struct Simulation<PC: PoseIntegratorCallbacks, NH: NarrowPhaseHooks> {
    pub bodies: BodySet,
    pub statics: StaticSet,
    pub broad_phase: BroadPhase<ColliderId>,
    pub narrow_phase: NarrowPhase,
    pub pair_cache: PairCache,
    pub solver_set: SolverSet,
    pub params: IntegrationParameters,
    pool: Pool,
    shapes: ShapeTable,
    pipeline: PhysicsPipeline,
    pose_integrator_callbacks: PC,
    narrow_phase_hooks: NH,
}

impl<PC: PoseIntegratorCallbacks, NH: NarrowPhaseHooks> Simulation<PC, NH> {
    /// Builds a simulation, failing only if `params` itself is invalid
    /// (component design §7: everything else is a contract violation, this
    /// one path is genuinely fallible since `params` is often built from
    /// user-facing configuration). `allocation_hints` sizes the memory pool
    /// up front via [`AllocationHints::max_pool_power`], so a caller who
    /// knows roughly how many bodies/constraints it will create doesn't pay
    /// for pool growth mid-simulation.
    pub fn create(narrow_phase_hooks: NH, pose_integrator_callbacks: PC, allocation_hints: AllocationHints, params: IntegrationParameters) -> Result<Self, EngineError> {
        params.validate()?;
        Ok(Simulation {
            bodies: BodySet::new(),
            statics: StaticSet::new(),
            broad_phase: BroadPhase::new(DEFAULT_MARGIN),
            narrow_phase: NarrowPhase::new(),
            pair_cache: PairCache::new(),
            solver_set: SolverSet::new(),
            params,
            pool: Pool::new(allocation_hints.max_pool_power()),
            shapes: ShapeTable::default(),
            pipeline: PhysicsPipeline::new(),
            pose_integrator_callbacks,
            narrow_phase_hooks,
        })
    }

    /// The last step's per-phase timing breakdown.
    pub fn counters(&self) -> &Counters {
        &self.pipeline.counters
    }

    /// The memory pool backing this simulation's ephemeral allocations
    /// (component design §5). Exposed for the embedder's own pooled
    /// allocations and for debug accounting (property 6: outstanding
    /// buffers per power).
    pub fn pool_mut(&mut self) -> &mut Pool {
        &mut self.pool
    }

    /// Allocates a fresh opaque shape handle (component design §6,
    /// `shapes.add`). The embedding application is responsible for
    /// associating it with actual shape geometry in its own storage.
    pub fn add_shape(&mut self) -> ShapeHandle {
        self.shapes.add()
    }

    /// Releases a shape handle for reuse (component design §6,
    /// `shapes.remove`). The caller must not reference `handle` from any
    /// live collidable afterward.
    pub fn remove_shape(&mut self, handle: ShapeHandle) {
        self.shapes.remove(handle);
    }

    pub fn add_body(&mut self, description: &BodyDescription) -> BodyHandle {
        self.bodies.add(description)
    }

    pub fn remove_body(&mut self, handle: BodyHandle) -> bool {
        self.bodies.remove(handle).is_some()
    }

    pub fn add_static(&mut self, description: &StaticDescription) -> StaticHandle {
        self.statics.add(description)
    }

    pub fn remove_static(&mut self, handle: StaticHandle) -> bool {
        self.statics.remove(handle).is_some()
    }

    /// Adds a two-body joint constraint (component design §6, `solver.add`).
    /// `body_b` may be another dynamic body, a static body, or a fixed
    /// kinematic pose.
    pub fn add_joint(&mut self, body_a: BodyHandle, body_b: ConstrainedBody, description: JointDescription) -> ConstraintHandle {
        let kind = description.kind();
        let a = self.bodies.get(body_a).expect("add_joint: unknown body_a handle");
        let kinematic_pose;
        let b_source: Result<&crate::dynamics::body::RigidBody, &Isometry> = match body_b {
            ConstrainedBody::Dynamic(h) => Ok(self.bodies.get(h).expect("add_joint: unknown body_b handle")),
            ConstrainedBody::Static(h) => Err(&self.statics.get(h).expect("add_joint: unknown static handle").pose),
            ConstrainedBody::Kinematic(pose) => {
                kinematic_pose = pose;
                Err(&kinematic_pose)
            }
        };
        let constraint = match description {
            JointDescription::BallSocket { local_anchor_a, local_anchor_b } => ball_socket::build(body_a, a, body_b, b_source, local_anchor_a, local_anchor_b, &self.params),
            JointDescription::Hinge { local_anchor_a, local_anchor_b, local_axis_a, local_axis_b } => {
                hinge::build(body_a, a, body_b, b_source, local_anchor_a, local_anchor_b, local_axis_a, local_axis_b, &self.params)
            }
            JointDescription::SwivelHinge { local_anchor_a, local_anchor_b, local_axis_a, local_axis_b } => {
                swivel_hinge::build(body_a, a, body_b, b_source, local_anchor_a, local_anchor_b, local_axis_a, local_axis_b, &self.params)
            }
            JointDescription::SwingLimit { local_anchor_a, local_anchor_b, local_axis_a, local_axis_b, max_angle } => {
                swing_limit::build(body_a, a, body_b, b_source, local_anchor_a, local_anchor_b, local_axis_a, local_axis_b, max_angle, &self.params)
            }
            JointDescription::TwistLimit { local_anchor_a, local_anchor_b, local_axis_a, local_axis_b, min_angle, max_angle } => {
                twist::build(body_a, a, body_b, b_source, local_anchor_a, local_anchor_b, local_axis_a, local_axis_b, min_angle, max_angle, &self.params)
            }
            JointDescription::AngularServoMotor {
                local_anchor_a,
                local_anchor_b,
                local_axis_a,
                local_axis_b,
                target_angle,
                target_velocity,
                max_torque,
            } => angular_servo_motor::build(body_a, a, body_b, b_source, local_anchor_a, local_anchor_b, local_axis_a, local_axis_b, target_angle, target_velocity, max_torque, &self.params),
        };
        self.solver_set.add_joint(kind, body_a, body_b.as_dynamic(), constraint)
    }

    /// Adds a grab-servo constraint: drags `body_a`'s anchor toward a moving
    /// world-space target point, e.g. a mouse-picked body (component design
    /// §6). See `grab_servo::build`'s doc comment for why this takes a
    /// target point rather than a second body.
    pub fn add_grab_servo(&mut self, body_a: BodyHandle, local_anchor_a: Vector, target_world_point: Vector, max_force: Real) -> ConstraintHandle {
        let a = self.bodies.get(body_a).expect("add_grab_servo: unknown body_a handle");
        let constraint = grab_servo::build(body_a, a, local_anchor_a, target_world_point, max_force, &self.params);
        self.solver_set.add_joint(ConstraintKind::GrabServo, body_a, None, constraint)
    }

    pub fn remove_constraint(&mut self, handle: ConstraintHandle) -> bool {
        self.solver_set.remove(handle)
    }

    /// Registers a narrow-phase collision tester for a shape-type pair
    /// (component design §4.5). Fails if one is already registered for this
    /// pair.
    pub fn register_tester(&mut self, a: ShapeType, b: ShapeType, tester: Box<dyn crate::geometry::narrow_phase::PairTester>) -> Result<(), EngineError> {
        self.narrow_phase.register(a, b, tester)
    }

    /// Advances the simulation by `dt` (component design §6, `step`).
    /// `dt` overwrites `self.params.dt` for this and subsequent steps, so a
    /// caller driving a variable timestep doesn't need to rebuild `params`
    /// every frame.
    pub fn step(&mut self, dt: Real) {
        self.params.dt = dt;
        self.pipeline.step(
            &self.params,
            &mut self.bodies,
            &mut self.statics,
            &mut self.broad_phase,
            &self.narrow_phase,
            &mut self.pair_cache,
            &mut self.solver_set,
            &mut self.pose_integrator_callbacks,
            &self.narrow_phase_hooks,
        );
    }

    /// Wakes a sleeping set explicitly, e.g. in response to a user action
    /// applied directly to one of its bodies rather than a new constraint.
    pub fn wake(&mut self, set_id: crate::dynamics::body::SetId) {
        PhysicsPipeline::wake(&mut self.bodies, &mut self.statics, &mut self.broad_phase, set_id);
    }
}
