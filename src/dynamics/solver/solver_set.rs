//! Owns one body set's constraints: the batches, their type batches, and
//! the handle→location map that lets any constraint be looked up or
//! removed in O(1) (component design §4.7, mirroring [`BodySet`]'s handle
//! scheme).

use crate::data::arena::Arena;
use crate::dynamics::body::BodyHandle;
use crate::dynamics::solver::batch::{find_or_create_batch, reserve_slot, Batch, ConstraintHandle, TypeBatchStorage};
use crate::dynamics::solver::constraint_kind::ConstraintKind;
use crate::dynamics::solver::contact_constraint::{ContactConstraint, ContactNonConvexConstraint};
use crate::dynamics::solver::joint_constraint::JointConstraint;

#[derive(Clone, Copy)]
struct ConstraintLocation {
    batch: usize,
    kind: ConstraintKind,
    index: usize,
}

pub struct SolverSet {
    handle_to_location: Arena<ConstraintLocation>,
    pub(crate) batches: Vec<Batch>,
}

impl Default for SolverSet {
    fn default() -> Self {
        Self::new()
    }
}

impl SolverSet {
    pub fn new() -> Self {
        SolverSet {
            handle_to_location: Arena::new(),
            batches: Vec::new(),
        }
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    pub fn len(&self) -> usize {
        self.batches.iter().map(Batch::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn add_contact(&mut self, a: BodyHandle, b: Option<BodyHandle>, constraint: ContactConstraint) -> ConstraintHandle {
        let batch_index = find_or_create_batch(&mut self.batches, a, b);
        let storage = reserve_slot(&mut self.batches, batch_index, ConstraintKind::Contact, a, b);
        match storage {
            TypeBatchStorage::Contact(v) => {
                let index = v.len();
                let handle = ConstraintHandle(self.handle_to_location.insert(ConstraintLocation {
                    batch: batch_index,
                    kind: ConstraintKind::Contact,
                    index,
                }));
                v.push((handle, constraint));
                handle
            }
            _ => unreachable!("reserve_slot created the wrong storage kind"),
        }
    }

    pub fn add_contact_non_convex(&mut self, a: BodyHandle, b: Option<BodyHandle>, constraint: ContactNonConvexConstraint) -> ConstraintHandle {
        let batch_index = find_or_create_batch(&mut self.batches, a, b);
        let storage = reserve_slot(&mut self.batches, batch_index, ConstraintKind::ContactNonConvex, a, b);
        match storage {
            TypeBatchStorage::ContactNonConvex(v) => {
                let index = v.len();
                let handle = ConstraintHandle(self.handle_to_location.insert(ConstraintLocation {
                    batch: batch_index,
                    kind: ConstraintKind::ContactNonConvex,
                    index,
                }));
                v.push((handle, constraint));
                handle
            }
            _ => unreachable!("reserve_slot created the wrong storage kind"),
        }
    }

    pub fn add_joint(&mut self, kind: ConstraintKind, a: BodyHandle, b: Option<BodyHandle>, constraint: JointConstraint) -> ConstraintHandle {
        debug_assert!(!kind.is_contact());
        let batch_index = find_or_create_batch(&mut self.batches, a, b);
        let storage = reserve_slot(&mut self.batches, batch_index, kind, a, b);
        match storage {
            TypeBatchStorage::Joint(v) => {
                let index = v.len();
                let handle = ConstraintHandle(self.handle_to_location.insert(ConstraintLocation { batch: batch_index, kind, index }));
                v.push((handle, constraint));
                handle
            }
            _ => unreachable!("reserve_slot created the wrong storage kind"),
        }
    }

    /// Removes a constraint, patching the handle of whatever sibling
    /// constraint was moved into its vacated slot (swap-remove, same
    /// pattern as [`BodySet::remove`]).
    pub fn remove(&mut self, handle: ConstraintHandle) -> bool {
        let Some(location) = self.handle_to_location.remove(handle.0) else {
            return false;
        };
        if let Some((moved_handle, new_index)) = crate::dynamics::solver::batch::remove_slot(&mut self.batches, location.batch, location.kind, location.index) {
            self.handle_to_location[moved_handle.0].index = new_index;
        }
        true
    }

    /// Looks up a convex contact constraint by handle, e.g. to harvest its
    /// post-solve impulses before replacing it with next frame's manifold.
    pub fn get_contact(&self, handle: ConstraintHandle) -> Option<&ContactConstraint> {
        let location = self.handle_to_location.get(handle.0)?;
        match self.batches[location.batch].type_batch(location.kind)? {
            TypeBatchStorage::Contact(v) => v.get(location.index).map(|(_, c)| c),
            _ => None,
        }
    }

    /// See [`Self::get_contact`].
    pub fn get_contact_non_convex(&self, handle: ConstraintHandle) -> Option<&ContactNonConvexConstraint> {
        let location = self.handle_to_location.get(handle.0)?;
        match self.batches[location.batch].type_batch(location.kind)? {
            TypeBatchStorage::ContactNonConvex(v) => v.get(location.index).map(|(_, c)| c),
            _ => None,
        }
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn batches_mut(&mut self) -> &mut [Batch] {
        &mut self.batches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::body::rigid_body::BodyDescription;
    use crate::dynamics::body::BodySet;
    use crate::dynamics::integration_parameters::IntegrationParameters;
    use crate::dynamics::solver::constrained_body::ConstrainedBody;
    use crate::dynamics::solver::joint_constraint::ball_socket;
    use crate::math::Vector;

    fn handle(bodies: &mut BodySet) -> BodyHandle {
        bodies.add(&BodyDescription::default())
    }

    fn ball_socket_between(bodies: &BodySet, a: BodyHandle, b: BodyHandle, params: &IntegrationParameters) -> JointConstraint {
        ball_socket::build(
            a,
            bodies.get(a).unwrap(),
            ConstrainedBody::Dynamic(b),
            Ok(bodies.get(b).unwrap()),
            Vector::zeros(),
            Vector::zeros(),
            params,
        )
    }

    #[test]
    fn removing_a_constraint_patches_the_moved_sibling() {
        let mut bodies = BodySet::new();
        let a = handle(&mut bodies);
        let b = handle(&mut bodies);
        let c = handle(&mut bodies);
        let d = handle(&mut bodies);
        let params = IntegrationParameters::default();

        let mut solver = SolverSet::new();
        let joint1 = solver.add_joint(ConstraintKind::BallSocket, a, Some(b), ball_socket_between(&bodies, a, b, &params));
        let joint2 = solver.add_joint(ConstraintKind::BallSocket, c, Some(d), ball_socket_between(&bodies, c, d, &params));

        assert!(solver.remove(joint1));
        assert!(solver.remove(joint2));
        assert_eq!(solver.len(), 0);
    }

    #[test]
    fn reused_handle_after_removal_is_not_stale() {
        let mut bodies = BodySet::new();
        let a = handle(&mut bodies);
        let b = handle(&mut bodies);
        let params = IntegrationParameters::default();

        let mut solver = SolverSet::new();
        let joint = solver.add_joint(ConstraintKind::BallSocket, a, Some(b), ball_socket_between(&bodies, a, b, &params));
        assert!(solver.remove(joint));
        assert!(!solver.remove(joint), "removing twice must not succeed");
    }

    #[test]
    fn independent_pairs_share_a_single_batch() {
        let mut bodies = BodySet::new();
        let a = handle(&mut bodies);
        let b = handle(&mut bodies);
        let c = handle(&mut bodies);
        let d = handle(&mut bodies);
        let params = IntegrationParameters::default();

        let mut solver = SolverSet::new();
        solver.add_joint(ConstraintKind::BallSocket, a, Some(b), ball_socket_between(&bodies, a, b, &params));
        solver.add_joint(ConstraintKind::BallSocket, c, Some(d), ball_socket_between(&bodies, c, d, &params));
        assert_eq!(solver.batch_count(), 1);
    }
}
