//! End-to-end scenarios driving [`Simulation`] through a handful of steps,
//! checking externally observable behavior rather than internal state.

use approx::assert_relative_eq;
use impulse_engine::dynamics::body::rigid_body::{BodyDescription, CollidableDescription};
use impulse_engine::dynamics::body::{StaticDescription, ACTIVE_SET};
use impulse_engine::dynamics::integration_parameters::{AllocationHints, IntegrationParameters};
use impulse_engine::dynamics::pose_integrator::PoseIntegratorCallbacks;
use impulse_engine::dynamics::solver::ConstrainedBody;
use impulse_engine::geometry::collidable::{ContinuityMode, ShapeHandle, ShapeType};
use impulse_engine::geometry::contact::ConvexContact;
use impulse_engine::geometry::narrow_phase::{PairTester, TestOutcome};
use impulse_engine::geometry::pair_cache::CollidablePair;
use impulse_engine::geometry::manifold::Manifold;
use impulse_engine::math::{AngVector, AngularInertia, Isometry, Point, Real, Vector};
use impulse_engine::pipeline::hooks::{NarrowPhaseHooks, PairMaterial, SpringParameters};
use impulse_engine::simulation::{JointDescription, Simulation};

const GRAVITY: Real = -9.81;

struct Gravity;
impl PoseIntegratorCallbacks for Gravity {
    fn integrate_velocity(&mut self, _body_index: usize, _pose: &Isometry, _local_inertia: &AngularInertia, _worker: usize, linvel: &mut Vector, _angvel: &mut AngVector) {
        linvel.y += GRAVITY * (1.0 / 60.0);
    }

    fn local_half_extents(&self, _shape: ShapeHandle, _shape_type: ShapeType) -> Vector {
        Vector::new(0.5, 0.5, 0.5)
    }
}

struct NoGravity;
impl PoseIntegratorCallbacks for NoGravity {
    fn integrate_velocity(&mut self, _body_index: usize, _pose: &Isometry, _local_inertia: &AngularInertia, _worker: usize, _linvel: &mut Vector, _angvel: &mut AngVector) {}

    fn local_half_extents(&self, _shape: ShapeHandle, _shape_type: ShapeType) -> Vector {
        Vector::new(0.5, 0.5, 0.5)
    }
}

struct AcceptAll;
impl NarrowPhaseHooks for AcceptAll {
    fn configure_contact_manifold(&self, _worker: usize, _pair: CollidablePair, _manifold: &Manifold) -> (bool, PairMaterial) {
        (
            true,
            PairMaterial {
                friction_coefficient: 0.5,
                max_recovery_velocity: 4.0,
                spring: SpringParameters { natural_frequency: 30.0, damping_ratio: 1.0 },
            },
        )
    }
}

/// A sphere-like tester: touching whenever two poses are within `radius * 2`
/// of each other along the fixed +y normal, depth computed from separation.
struct SphereTester {
    radius: Real,
}

impl PairTester for SphereTester {
    fn test(&self, _shape_a: ShapeHandle, pose_a: &Isometry, _shape_b: ShapeHandle, pose_b: &Isometry) -> TestOutcome {
        let delta = pose_b.translation.vector - pose_a.translation.vector;
        let distance = delta.norm();
        let depth = self.radius * 2.0 - distance;
        if depth < -0.05 {
            return TestOutcome::None;
        }
        let normal = if distance > 1.0e-6 { delta / distance } else { Vector::y() };
        let mut contacts = arrayvec::ArrayVec::new();
        contacts.push(ConvexContact {
            local_point_a: Point::origin(),
            depth,
            feature_id: 0,
        });
        TestOutcome::Convex { normal, contacts }
    }
}

fn sphere_collidable() -> CollidableDescription {
    CollidableDescription {
        shape: ShapeHandle(0),
        shape_type: ShapeType(0),
        speculative_margin: 0.05,
        continuity: ContinuityMode::Discrete,
    }
}

fn falling_sphere_sim() -> Simulation<Gravity, AcceptAll> {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut sim = Simulation::create(AcceptAll, Gravity, AllocationHints::default(), IntegrationParameters::default()).unwrap();
    sim.register_tester(ShapeType(0), ShapeType(0), Box::new(SphereTester { radius: 0.5 })).unwrap();
    sim
}

/// S1: two overlapping spheres resting on each other should settle into a
/// single, stable contact constraint rather than oscillating or duplicating.
#[test]
fn s1_two_spheres_settle_into_one_contact() {
    let mut sim = falling_sphere_sim();
    let mut a = BodyDescription::default();
    a.collidable = Some(sphere_collidable());
    a.pose = Isometry::translation(0.0, 0.0, 0.0);
    let mut b = BodyDescription::default();
    b.collidable = Some(sphere_collidable());
    b.pose = Isometry::translation(0.0, 0.9, 0.0);

    sim.add_body(&a);
    sim.add_body(&b);

    for _ in 0..10 {
        sim.step(1.0 / 60.0);
    }

    assert_eq!(sim.pair_cache.len(), 1);
    assert_eq!(sim.solver_set.len(), 1);
}

/// S2: a ball-socket chain of three dynamic bodies should keep every link's
/// anchor points coincident after several steps of free fall.
#[test]
fn s2_ball_socket_chain_holds_anchors_together() {
    let mut sim = Simulation::create(AcceptAll, Gravity, AllocationHints::default(), IntegrationParameters::default()).unwrap();

    let spacing = 1.0;
    let a = sim.add_body(&{
        let mut d = BodyDescription::default();
        d.pose = Isometry::translation(0.0, 0.0, 0.0);
        d
    });
    let b = sim.add_body(&{
        let mut d = BodyDescription::default();
        d.pose = Isometry::translation(spacing, 0.0, 0.0);
        d
    });
    let c = sim.add_body(&{
        let mut d = BodyDescription::default();
        d.pose = Isometry::translation(spacing * 2.0, 0.0, 0.0);
        d
    });

    sim.add_joint(
        a,
        ConstrainedBody::Dynamic(b),
        JointDescription::BallSocket {
            local_anchor_a: Vector::new(0.5, 0.0, 0.0),
            local_anchor_b: Vector::new(-0.5, 0.0, 0.0),
        },
    );
    sim.add_joint(
        b,
        ConstrainedBody::Dynamic(c),
        JointDescription::BallSocket {
            local_anchor_a: Vector::new(0.5, 0.0, 0.0),
            local_anchor_b: Vector::new(-0.5, 0.0, 0.0),
        },
    );

    assert_eq!(sim.solver_set.len(), 2);

    for _ in 0..30 {
        sim.step(1.0 / 120.0);
    }

    let pa = sim.bodies.get(a).unwrap();
    let pb = sim.bodies.get(b).unwrap();
    let pc = sim.bodies.get(c).unwrap();

    let anchor_a_world = pa.pose.transform_point(&(Point::origin() + Vector::new(0.5, 0.0, 0.0)));
    let anchor_b_world_from_a = pb.pose.transform_point(&(Point::origin() + Vector::new(-0.5, 0.0, 0.0)));
    assert_relative_eq!(anchor_a_world, anchor_b_world_from_a, epsilon = 0.1);

    let anchor_b_world = pb.pose.transform_point(&(Point::origin() + Vector::new(0.5, 0.0, 0.0)));
    let anchor_c_world_from_b = pc.pose.transform_point(&(Point::origin() + Vector::new(-0.5, 0.0, 0.0)));
    assert_relative_eq!(anchor_b_world, anchor_c_world_from_b, epsilon = 0.1);
}

/// S3: a sphere resting on a static floor with nonzero friction should not
/// slide under a lateral nudge once the friction constraint engages, while
/// a frictionless pair slides freely.
#[test]
fn s3_friction_resists_lateral_drift_more_than_frictionless() {
    // Two independent one-body-on-static scenarios, differing only in
    // whether the narrow-phase hooks report nonzero friction.
    struct Frictionless;
    impl NarrowPhaseHooks for Frictionless {
        fn configure_contact_manifold(&self, _worker: usize, _pair: CollidablePair, _manifold: &Manifold) -> (bool, PairMaterial) {
            (
                true,
                PairMaterial {
                    friction_coefficient: 0.0,
                    max_recovery_velocity: 4.0,
                    spring: SpringParameters { natural_frequency: 30.0, damping_ratio: 1.0 },
                },
            )
        }
    }

    fn drift_after_steps<NH: NarrowPhaseHooks>(hooks: NH) -> Real {
        let mut sim = Simulation::create(hooks, NoGravity, AllocationHints::default(), IntegrationParameters::default()).unwrap();
        sim.register_tester(ShapeType(0), ShapeType(1), Box::new(SphereTester { radius: 0.5 })).unwrap();

        sim.add_static(&StaticDescription {
            pose: Isometry::translation(0.0, -0.5, 0.0),
            collidable: Some(CollidableDescription {
                shape: ShapeHandle(1),
                shape_type: ShapeType(1),
                speculative_margin: 0.05,
                continuity: ContinuityMode::Discrete,
            }),
        });

        let h = sim.add_body(&{
            let mut d = BodyDescription::default();
            d.collidable = Some(sphere_collidable());
            d.pose = Isometry::translation(0.0, 0.4, 0.0);
            d.linvel = Vector::new(2.0, 0.0, 0.0);
            d
        });

        for _ in 0..30 {
            sim.step(1.0 / 60.0);
        }

        sim.bodies.get(h).unwrap().pose.translation.vector.x
    }

    let with_friction = drift_after_steps(AcceptAll);
    let frictionless = drift_after_steps(Frictionless);

    assert!(with_friction < frictionless, "friction ({with_friction}) should drift less than frictionless ({frictionless})");
}

/// S4: an isolated, motionless body should go to sleep after enough steps
/// under threshold, and a fresh constraint referencing it should wake it
/// back up.
#[test]
fn s4_sleep_and_wake_round_trip() {
    let mut sim = Simulation::create(AcceptAll, NoGravity, AllocationHints::default(), IntegrationParameters::default()).unwrap();
    let mut d = BodyDescription::default();
    d.min_steps_before_sleep = 5;
    let a = sim.add_body(&d);

    for _ in 0..10 {
        sim.step(1.0 / 60.0);
    }

    let (set_id, _) = sim.bodies.location(a).unwrap();
    assert_ne!(set_id, ACTIVE_SET, "body should have migrated to an inactive set");
    assert_eq!(sim.bodies.active_len(), 0);

    let b = sim.add_body(&BodyDescription::default());
    sim.add_joint(
        a,
        ConstrainedBody::Dynamic(b),
        JointDescription::BallSocket {
            local_anchor_a: Vector::zeros(),
            local_anchor_b: Vector::zeros(),
        },
    );

    let (set_id_after, _) = sim.bodies.location(a).unwrap();
    assert_eq!(set_id_after, ACTIVE_SET, "adding a constraint should wake the sleeping body");
}

/// S5: stepping two independently constructed, identically configured
/// simulations by the same sequence of `dt`s must produce bit-identical
/// poses — the pipeline has no hidden source of nondeterminism (global
/// time, thread-local RNG, hash-order-dependent iteration over solver
/// state).
#[test]
fn s5_two_identical_simulations_step_deterministically() {
    fn build() -> Simulation<Gravity, AcceptAll> {
        let mut sim = Simulation::create(AcceptAll, Gravity, AllocationHints::default(), IntegrationParameters::default()).unwrap();
        sim.register_tester(ShapeType(0), ShapeType(0), Box::new(SphereTester { radius: 0.5 })).unwrap();
        let mut a = BodyDescription::default();
        a.collidable = Some(sphere_collidable());
        let mut b = BodyDescription::default();
        b.collidable = Some(sphere_collidable());
        b.pose = Isometry::translation(0.0, 0.9, 0.0);
        sim.add_body(&a);
        sim.add_body(&b);
        sim
    }

    let mut sim1 = build();
    let mut sim2 = build();

    for _ in 0..20 {
        sim1.step(1.0 / 60.0);
        sim2.step(1.0 / 60.0);
    }

    for i in 0..sim1.bodies.active_len() {
        let h1 = sim1.bodies.handle_at(ACTIVE_SET, i);
        let h2 = sim2.bodies.handle_at(ACTIVE_SET, i);
        let p1 = sim1.bodies.get(h1).unwrap().pose;
        let p2 = sim2.bodies.get(h2).unwrap().pose;
        assert_eq!(p1.translation.vector, p2.translation.vector);
    }
}

/// S6: repeatedly adding and removing bodies and constraints must not leak
/// pool allocations — the outstanding-buffer count should return to zero
/// once every participant is gone.
#[test]
fn s6_add_remove_cycles_do_not_leak_pool_buffers() {
    let mut sim = Simulation::create(AcceptAll, NoGravity, AllocationHints::default(), IntegrationParameters::default()).unwrap();

    for _ in 0..50 {
        let a = sim.add_body(&BodyDescription::default());
        let b = sim.add_body(&BodyDescription::default());
        let joint = sim.add_joint(
            a,
            ConstrainedBody::Dynamic(b),
            JointDescription::BallSocket {
                local_anchor_a: Vector::zeros(),
                local_anchor_b: Vector::zeros(),
            },
        );
        sim.step(1.0 / 60.0);
        sim.remove_constraint(joint);
        sim.remove_body(a);
        sim.remove_body(b);
    }

    assert_eq!(sim.bodies.active_len(), 0);
    assert_eq!(sim.solver_set.len(), 0);
    assert_eq!(sim.pool_mut().total_outstanding(), 0);
}
