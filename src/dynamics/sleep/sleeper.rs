//! Finds connected islands of active bodies that are all sleep candidates
//! and migrates them into a fresh inactive set (component design §4.8,
//! "Sleep").
//!
//! The full procedure additionally migrates each island's constraints and
//! pair-cache entries into per-set inactive storage so a sleeping island's
//! maintenance cost drops to zero. This crate keeps constraints in one
//! global [`SolverSet`] regardless of which bodies are asleep — solving a
//! handful of already-at-rest constraints every step is cheap, and every
//! constraint already resolves its bodies through [`BodySet::get`], which
//! does not care which set a body lives in. Only the externally observable
//! half of sleep — a body's pose stops advancing once the whole island
//! using it is asleep — is implemented. See `DESIGN.md`.

use rustc_hash::FxHashMap;

use crate::dynamics::body::{BodyHandle, BodySet, SetId};
use crate::dynamics::solver::batch::TypeBatchStorage;
use crate::dynamics::solver::constrained_body::ConstrainedBody;
use crate::dynamics::solver::solver_set::SolverSet;

/// A disjoint-set-union over active body handles, built from the edges the
/// constraint graph implies (two bodies sharing a constraint land in the
/// same island).
struct UnionFind {
    parent: FxHashMap<BodyHandle, BodyHandle>,
}

impl UnionFind {
    fn new() -> Self {
        UnionFind { parent: FxHashMap::default() }
    }

    fn make(&mut self, h: BodyHandle) {
        self.parent.entry(h).or_insert(h);
    }

    fn find(&mut self, h: BodyHandle) -> BodyHandle {
        let p = *self.parent.get(&h).expect("make() not called for handle");
        if p == h {
            h
        } else {
            let root = self.find(p);
            self.parent.insert(h, root);
            root
        }
    }

    fn union(&mut self, a: BodyHandle, b: BodyHandle) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent.insert(ra, rb);
        }
    }
}

/// Every constraint edge currently in `solver_set`, restricted to the
/// dynamic-dynamic pairs that actually link two bodies together.
fn constraint_edges(solver_set: &SolverSet) -> Vec<(BodyHandle, BodyHandle)> {
    let mut edges = Vec::new();
    for batch in solver_set.batches() {
        for storage in batch.type_batches.values() {
            match storage {
                TypeBatchStorage::Contact(entries) => {
                    edges.extend(entries.iter().filter_map(|(_, c)| dynamic_edge(c.bodies())));
                }
                TypeBatchStorage::ContactNonConvex(entries) => {
                    edges.extend(entries.iter().filter_map(|(_, c)| dynamic_edge(c.bodies())));
                }
                TypeBatchStorage::Joint(entries) => {
                    edges.extend(entries.iter().filter_map(|(_, j)| dynamic_edge(j.bodies())));
                }
            }
        }
    }
    edges
}

fn dynamic_edge(pair: (BodyHandle, ConstrainedBody)) -> Option<(BodyHandle, BodyHandle)> {
    match pair.1 {
        ConstrainedBody::Dynamic(b) => Some((pair.0, b)),
        ConstrainedBody::Static(_) | ConstrainedBody::Kinematic(_) => None,
    }
}

/// Groups every active body into connected islands (bodies linked directly
/// or transitively by a constraint), including singleton islands for bodies
/// that reference none.
fn active_islands(bodies: &BodySet, solver_set: &SolverSet) -> Vec<Vec<BodyHandle>> {
    let mut uf = UnionFind::new();
    for i in 0..bodies.active_len() {
        uf.make(bodies.handle_at(crate::dynamics::body::ACTIVE_SET, i));
    }
    for (a, b) in constraint_edges(solver_set) {
        // A constraint may reference a body that has since left the active
        // set (e.g. it woke into a different island already); skip those.
        if uf.parent.contains_key(&a) && uf.parent.contains_key(&b) {
            uf.union(a, b);
        }
    }

    let mut islands: FxHashMap<BodyHandle, Vec<BodyHandle>> = FxHashMap::default();
    for i in 0..bodies.active_len() {
        let handle = bodies.handle_at(crate::dynamics::body::ACTIVE_SET, i);
        let root = uf.find(handle);
        islands.entry(root).or_default().push(handle);
    }
    islands.into_values().collect()
}

/// Returns the subset of `active_islands` where every member body is a
/// sleep candidate (component design §4.4 step 5, §4.8 "Sleep").
pub fn find_sleepy_islands(bodies: &BodySet, solver_set: &SolverSet) -> Vec<Vec<BodyHandle>> {
    active_islands(bodies, solver_set)
        .into_iter()
        .filter(|island| island.iter().all(|&h| bodies.get(h).map_or(false, |b| b.activity.sleep_candidate)))
        .collect()
}

/// Migrates every island in `islands` into its own fresh inactive set and
/// returns the allocated set ids.
pub fn sleep_islands(bodies: &mut BodySet, islands: &[Vec<BodyHandle>]) -> Vec<SetId> {
    islands.iter().map(|island| bodies.migrate_to_inactive(island)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::body::rigid_body::BodyDescription;
    use crate::dynamics::integration_parameters::IntegrationParameters;
    use crate::dynamics::solver::constraint_kind::ConstraintKind;
    use crate::dynamics::solver::joint_constraint::ball_socket;
    use crate::math::Vector;

    fn settled_body(bodies: &mut BodySet, params: &IntegrationParameters) -> BodyHandle {
        let h = bodies.add(&BodyDescription::default());
        let b = bodies.get_mut(h).unwrap();
        for _ in 0..params.default_min_steps_before_sleep + 1 {
            b.activity.update(Vector::zeros(), crate::math::AngVector::zeros());
        }
        h
    }

    #[test]
    fn isolated_resting_body_is_its_own_sleepy_island() {
        let params = IntegrationParameters::default();
        let mut bodies = BodySet::new();
        let a = settled_body(&mut bodies, &params);
        let solver = SolverSet::new();

        let islands = find_sleepy_islands(&bodies, &solver);
        assert_eq!(islands.len(), 1);
        assert_eq!(islands[0], vec![a]);
    }

    #[test]
    fn one_awake_body_keeps_its_whole_island_awake() {
        let params = IntegrationParameters::default();
        let mut bodies = BodySet::new();
        let a = settled_body(&mut bodies, &params);
        let b = bodies.add(&BodyDescription::default()); // never settles

        let joint = ball_socket::build(a, bodies.get(a).unwrap(), crate::dynamics::solver::constrained_body::ConstrainedBody::Dynamic(b), Ok(bodies.get(b).unwrap()), Vector::zeros(), Vector::zeros(), &params);
        let mut solver = SolverSet::new();
        solver.add_joint(ConstraintKind::BallSocket, a, Some(b), joint);

        assert!(find_sleepy_islands(&bodies, &solver).is_empty());
    }

    #[test]
    fn sleeping_an_island_migrates_its_bodies() {
        let params = IntegrationParameters::default();
        let mut bodies = BodySet::new();
        let a = settled_body(&mut bodies, &params);
        let solver = SolverSet::new();

        let islands = find_sleepy_islands(&bodies, &solver);
        let set_ids = sleep_islands(&mut bodies, &islands);

        assert_eq!(set_ids.len(), 1);
        assert_eq!(bodies.active_len(), 0);
        assert_eq!(bodies.inactive_len(set_ids[0]), 1);
        assert_eq!(bodies.location(a).unwrap().0, set_ids[0]);
    }
}
