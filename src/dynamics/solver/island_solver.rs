//! Runs one island's (or the whole active set's) velocity solve: warm
//! start every constraint once, then iterate `num_solver_iterations` times,
//! batch by batch (component design §4.7 steps 2-3).
//!
//! Constraints in the same batch reference disjoint bodies by construction
//! ([`crate::dynamics::solver::batch`]): a batch's at-most-three
//! [`TypeBatchStorage`] kinds (`Contact`, `ContactNonConvex`, `Joint`) are
//! checked for disjointness against the *whole* batch, not per kind, so no
//! two of them ever touch the same body. With the `parallel` feature this
//! crate dispatches a batch's kinds across `rayon` workers on that
//! guarantee, mirroring the teacher's own raw-pointer worker dispatch in its
//! parallel island solver. Batches themselves still run in sequence: unlike
//! the kinds within one batch, sibling batches are free to share bodies.

#[cfg(feature = "parallel")]
use std::sync::atomic::{AtomicPtr, Ordering};

use crate::dynamics::body::BodySet;
use crate::dynamics::body::StaticSet;
use crate::dynamics::integration_parameters::IntegrationParameters;
#[cfg(feature = "parallel")]
use crate::dynamics::solver::batch::Batch;
use crate::dynamics::solver::batch::TypeBatchStorage;
use crate::dynamics::solver::solver_set::SolverSet;

pub struct IslandSolver;

impl IslandSolver {
    pub fn solve(solver_set: &mut SolverSet, bodies: &mut BodySet, statics: &StaticSet, params: &IntegrationParameters) {
        warm_start_all(solver_set, bodies, statics, params);
        for _ in 0..params.num_solver_iterations {
            iterate_all(solver_set, bodies, statics);
        }
    }

    /// Same two-phase solve as [`Self::solve`], but each batch's type
    /// storages are warm-started/iterated concurrently on `rayon` workers
    /// instead of one after another. Batches are still processed in
    /// sequence.
    #[cfg(feature = "parallel")]
    pub fn solve_parallel(solver_set: &mut SolverSet, bodies: &mut BodySet, statics: &StaticSet, params: &IntegrationParameters) {
        for batch in solver_set.batches_mut() {
            warm_start_batch_parallel(batch, bodies, statics, params);
        }
        for _ in 0..params.num_solver_iterations {
            for batch in solver_set.batches_mut() {
                iterate_batch_parallel(batch, bodies, statics);
            }
        }
    }
}

/// Shares `bodies` with the spawned workers via a raw pointer: a batch's
/// type storages are disjoint by construction (see the module doc comment),
/// so each worker only ever reaches bodies no other worker in this scope
/// touches. `AtomicPtr` is used purely for its built-in `Send`/`Sync`, not
/// for its atomicity — there is no contended access to the pointer itself.
#[cfg(feature = "parallel")]
fn warm_start_batch_parallel(batch: &mut Batch, bodies: &mut BodySet, statics: &StaticSet, params: &IntegrationParameters) {
    let bodies_raw: *mut BodySet = bodies;
    rayon::scope(|scope| {
        for storage in batch.type_batches.values_mut() {
            let bodies_ptr = AtomicPtr::new(bodies_raw);
            scope.spawn(move |_| {
                let bodies: &mut BodySet = unsafe { &mut *bodies_ptr.load(Ordering::Relaxed) };
                warm_start_storage(storage, bodies, statics, params);
            });
        }
    });
}

/// See [`warm_start_batch_parallel`] for the soundness argument.
#[cfg(feature = "parallel")]
fn iterate_batch_parallel(batch: &mut Batch, bodies: &mut BodySet, statics: &StaticSet) {
    let bodies_raw: *mut BodySet = bodies;
    rayon::scope(|scope| {
        for storage in batch.type_batches.values_mut() {
            let bodies_ptr = AtomicPtr::new(bodies_raw);
            scope.spawn(move |_| {
                let bodies: &mut BodySet = unsafe { &mut *bodies_ptr.load(Ordering::Relaxed) };
                iterate_storage(storage, bodies, statics);
            });
        }
    });
}

fn warm_start_all(solver_set: &mut SolverSet, bodies: &mut BodySet, statics: &StaticSet, params: &IntegrationParameters) {
    for batch in solver_set.batches_mut() {
        for storage in batch.type_batches.values_mut() {
            warm_start_storage(storage, bodies, statics, params);
        }
    }
}

fn warm_start_storage(storage: &mut TypeBatchStorage, bodies: &mut BodySet, statics: &StaticSet, params: &IntegrationParameters) {
    match storage {
        TypeBatchStorage::Contact(entries) => {
            for (_, c) in entries.iter_mut() {
                c.warm_start(bodies, statics, params);
            }
        }
        TypeBatchStorage::ContactNonConvex(entries) => {
            for (_, c) in entries.iter_mut() {
                c.warm_start(bodies, statics, params);
            }
        }
        TypeBatchStorage::Joint(entries) => {
            for (_, j) in entries.iter_mut() {
                j.warm_start(bodies, statics, params.warm_start_coefficient);
            }
        }
    }
}

fn iterate_all(solver_set: &mut SolverSet, bodies: &mut BodySet, statics: &StaticSet) {
    for batch in solver_set.batches_mut() {
        for storage in batch.type_batches.values_mut() {
            iterate_storage(storage, bodies, statics);
        }
    }
}

fn iterate_storage(storage: &mut TypeBatchStorage, bodies: &mut BodySet, statics: &StaticSet) {
    match storage {
        TypeBatchStorage::Contact(entries) => {
            for (_, c) in entries.iter_mut() {
                c.solve(bodies, statics);
            }
        }
        TypeBatchStorage::ContactNonConvex(entries) => {
            for (_, c) in entries.iter_mut() {
                c.solve(bodies, statics);
            }
        }
        TypeBatchStorage::Joint(entries) => {
            for (_, j) in entries.iter_mut() {
                j.solve(bodies, statics);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::body::rigid_body::BodyDescription;
    use crate::dynamics::solver::constrained_body::ConstrainedBody;
    use crate::dynamics::solver::constraint_kind::ConstraintKind;
    use crate::dynamics::solver::joint_constraint::ball_socket;
    use crate::math::Vector;

    #[test]
    fn ball_socket_converges_anchors_toward_each_other() {
        let mut bodies = BodySet::new();
        let mut desc_a = BodyDescription::default();
        desc_a.pose.translation.vector = Vector::new(-1.0, 0.0, 0.0);
        desc_a.inverse_mass = 1.0;
        let a = bodies.add(&desc_a);

        let mut desc_b = BodyDescription::default();
        desc_b.pose.translation.vector = Vector::new(1.0, 0.0, 0.0);
        desc_b.inverse_mass = 1.0;
        let b = bodies.add(&desc_b);

        let statics = StaticSet::new();
        let params = IntegrationParameters::default();

        let joint = ball_socket::build(
            a,
            bodies.get(a).unwrap(),
            ConstrainedBody::Dynamic(b),
            Ok(bodies.get(b).unwrap()),
            Vector::new(1.0, 0.0, 0.0),
            Vector::new(-1.0, 0.0, 0.0),
            &params,
        );

        let mut solver = SolverSet::new();
        solver.add_joint(ConstraintKind::BallSocket, a, Some(b), joint);

        IslandSolver::solve(&mut solver, &mut bodies, &statics, &params);

        // Pulling the anchors (which start 2 units apart in world space)
        // together should leave the bodies moving toward each other.
        assert!(bodies.get(a).unwrap().linvel.x > 0.0);
        assert!(bodies.get(b).unwrap().linvel.x < 0.0);
    }

    #[test]
    #[cfg(feature = "parallel")]
    fn solve_parallel_matches_sequential_solve_for_a_single_batch() {
        let mut bodies = BodySet::new();
        let mut desc_a = BodyDescription::default();
        desc_a.pose.translation.vector = Vector::new(-1.0, 0.0, 0.0);
        desc_a.inverse_mass = 1.0;
        let a = bodies.add(&desc_a);

        let mut desc_b = BodyDescription::default();
        desc_b.pose.translation.vector = Vector::new(1.0, 0.0, 0.0);
        desc_b.inverse_mass = 1.0;
        let b = bodies.add(&desc_b);

        let statics = StaticSet::new();
        let params = IntegrationParameters::default();

        let joint = ball_socket::build(
            a,
            bodies.get(a).unwrap(),
            ConstrainedBody::Dynamic(b),
            Ok(bodies.get(b).unwrap()),
            Vector::new(1.0, 0.0, 0.0),
            Vector::new(-1.0, 0.0, 0.0),
            &params,
        );

        let mut solver = SolverSet::new();
        solver.add_joint(ConstraintKind::BallSocket, a, Some(b), joint);

        IslandSolver::solve_parallel(&mut solver, &mut bodies, &statics, &params);

        assert!(bodies.get(a).unwrap().linvel.x > 0.0);
        assert!(bodies.get(b).unwrap().linvel.x < 0.0);
    }
}
