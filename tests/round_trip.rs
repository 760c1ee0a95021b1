//! Round-trip laws independent of any one scenario: handle bijection, pose
//! integrator identity/normalization, and warm-start convergence.

use approx::assert_relative_eq;
use impulse_engine::dynamics::body::rigid_body::{BodyDescription, CollidableDescription};
use impulse_engine::dynamics::integration_parameters::{AllocationHints, IntegrationParameters};
use impulse_engine::dynamics::pose_integrator::PoseIntegratorCallbacks;
use impulse_engine::geometry::collidable::{ContinuityMode, ShapeHandle, ShapeType};
use impulse_engine::geometry::contact::ConvexContact;
use impulse_engine::geometry::narrow_phase::{PairTester, TestOutcome};
use impulse_engine::geometry::pair_cache::{CollidablePair, ColliderId};
use impulse_engine::geometry::manifold::Manifold;
use impulse_engine::math::{AngVector, AngularInertia, Isometry, Point, Real, Vector};
use impulse_engine::pipeline::hooks::{NarrowPhaseHooks, PairMaterial, SpringParameters};
use impulse_engine::simulation::Simulation;

struct NoOp;
impl PoseIntegratorCallbacks for NoOp {
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

fn sim() -> Simulation<NoOp, AcceptAll> {
    Simulation::create(AcceptAll, NoOp, AllocationHints::default(), IntegrationParameters::default()).unwrap()
}

/// Property 1: every handle currently held resolves to exactly the body it
/// was returned for, through any number of unrelated adds/removes.
#[test]
fn handle_bijection_survives_interleaved_add_remove() {
    let mut sim = sim();
    let mut live = Vec::new();
    for i in 0..20 {
        let mut d = BodyDescription::default();
        d.pose = Isometry::translation(i as Real, 0.0, 0.0);
        live.push((i, sim.add_body(&d)));
    }

    // Remove every third body.
    let mut kept = Vec::new();
    for (i, h) in live {
        if i % 3 == 0 {
            sim.remove_body(h);
        } else {
            kept.push((i, h));
        }
    }

    for (i, h) in &kept {
        let body = sim.bodies.get(*h).expect("surviving handle must still resolve");
        assert_eq!(body.pose.translation.vector.x, *i as Real);
    }
}

/// Properties 7/8: with `dt == 0` the pose integrator is the identity
/// (no drift from a zero-length step), and after many nonzero steps the
/// orientation quaternion stays normalized (no unbounded drift from
/// repeated small-angle updates).
#[test]
fn pose_integrator_identity_at_zero_dt_and_stays_normalized() {
    let mut sim = sim();
    let mut d = BodyDescription::default();
    d.angvel = Vector::new(0.3, 0.1, 0.2);
    let h = sim.add_body(&d);

    let before = sim.bodies.get(h).unwrap().pose;
    sim.step(0.0);
    let after = sim.bodies.get(h).unwrap().pose;
    assert_eq!(before.translation.vector, after.translation.vector);
    assert_relative_eq!(before.rotation.angle_to(&after.rotation), 0.0, epsilon = 1.0e-9);

    for _ in 0..500 {
        sim.step(1.0 / 60.0);
    }
    let rotation = sim.bodies.get(h).unwrap().pose.rotation;
    assert_relative_eq!(rotation.norm(), 1.0, epsilon = 1.0e-4);
}

struct StationaryTouching;
impl PairTester for StationaryTouching {
    fn test(&self, _shape_a: ShapeHandle, _pose_a: &Isometry, _shape_b: ShapeHandle, _pose_b: &Isometry) -> TestOutcome {
        let mut contacts = arrayvec::ArrayVec::new();
        contacts.push(ConvexContact { local_point_a: Point::origin(), depth: 0.02, feature_id: 0 });
        TestOutcome::Convex { normal: Vector::y(), contacts }
    }
}

/// Property 9: warm-starting a manifold whose geometry never changes
/// converges to a stable accumulated impulse rather than oscillating step
/// to step once the solver has had a chance to settle.
#[test]
fn warm_start_converges_for_an_unchanging_manifold() {
    let mut sim = sim();
    sim.register_tester(ShapeType(0), ShapeType(0), Box::new(StationaryTouching)).unwrap();

    let collidable = CollidableDescription {
        shape: ShapeHandle(0),
        shape_type: ShapeType(0),
        speculative_margin: 0.05,
        continuity: ContinuityMode::Discrete,
    };
    let mut a = BodyDescription::default();
    a.collidable = Some(collidable);
    a.inverse_mass = 0.0;
    a.inverse_inertia_local = impulse_engine::math::AngularInertia::zero();
    let mut b = BodyDescription::default();
    b.collidable = Some(collidable);
    b.pose = Isometry::translation(0.0, 0.95, 0.0);
    b.linvel = Vector::new(0.0, -1.0, 0.0);

    let handle_a = sim.add_body(&a);
    let handle_b = sim.add_body(&b);
    let pair = CollidablePair::new(ColliderId::Body(handle_a), ColliderId::Body(handle_b));

    for _ in 0..5 {
        sim.step(1.0 / 60.0);
    }
    let entry = sim.pair_cache.get(pair).expect("pair should be cached after settling");
    let c = sim.solver_set.get_contact(entry.constraint_handle).expect("expected a contact constraint after settling");
    let settled: Vec<Real> = c.normal_impulses();

    sim.step(1.0 / 60.0);
    let entry = sim.pair_cache.get(pair).expect("pair should still be cached");
    let c = sim.solver_set.get_contact(entry.constraint_handle).expect("expected a contact constraint after one more step");
    let next: Vec<Real> = c.normal_impulses();

    for (s, n) in settled.iter().zip(next.iter()) {
        assert!((s - n).abs() < 0.05 * s.abs().max(1.0), "impulse should have converged: {s} vs {n}");
    }
}
