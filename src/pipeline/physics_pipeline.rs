//! Advances a whole simulation by one step: pose integration, broad-phase
//! refresh, overlap enumeration, narrow phase and constraint-graph update,
//! the batched solve, and sleep detection, in that order (component design
//! §4.1 "Step outline", §5 "ordering guarantees").

use crate::dynamics::body::{BodySet, StaticSet, ACTIVE_SET};
use crate::dynamics::integration_parameters::IntegrationParameters;
use crate::dynamics::pose_integrator::{PoseIntegrator, PoseIntegratorCallbacks};
use crate::dynamics::solver::{ConstrainedBody, ConstraintKind, ContactConstraint, ContactNonConvexConstraint, IslandSolver, SolverSet};
use crate::geometry::broad_phase::{Aabb, BroadPhase, LeafId, Tree};
use crate::geometry::collidable::{ShapeHandle, ShapeType};
use crate::geometry::contact::FeatureId;
use crate::geometry::manifold::{self, Manifold};
use crate::geometry::narrow_phase::NarrowPhase;
use crate::geometry::pair_cache::{CollidablePair, ColliderId, PairCache, PairCacheEntry, PairUpdate};
use crate::math::{Isometry, Real};
use crate::pipeline::counters::{time, Counters};
use crate::pipeline::hooks::NarrowPhaseHooks;

/// Runs a simulation's per-step pipeline and keeps the last step's timing
/// breakdown (component design §4.9).
pub struct PhysicsPipeline {
    pub counters: Counters,
}

impl Default for PhysicsPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsPipeline {
    pub fn new() -> Self {
        PhysicsPipeline { counters: Counters::new() }
    }

    /// Advances the whole simulation by `params.dt`.
    #[allow(clippy::too_many_arguments)]
    pub fn step<PC: PoseIntegratorCallbacks, NH: NarrowPhaseHooks>(
        &mut self,
        params: &IntegrationParameters,
        bodies: &mut BodySet,
        statics: &mut StaticSet,
        broad_phase: &mut BroadPhase<ColliderId>,
        narrow_phase: &NarrowPhase,
        pair_cache: &mut PairCache,
        solver_set: &mut SolverSet,
        pose_integrator_callbacks: &mut PC,
        narrow_phase_hooks: &NH,
    ) {
        self.counters.reset();

        log::debug!("step: pose integration");
        let predicted = time(&mut self.counters.pose_integration, || PoseIntegrator::integrate(bodies.active_bodies_mut(), params, pose_integrator_callbacks));

        log::debug!("step: broad phase refresh ({} predicted aabbs)", predicted.len());
        time(&mut self.counters.broad_phase, || refresh_active_leaves(bodies, broad_phase, &predicted));

        log::debug!("step: overlap enumeration");
        let candidates = time(&mut self.counters.overlap_enumeration, || enumerate_candidate_pairs(broad_phase));

        log::debug!("step: narrow phase ({} candidate pairs)", candidates.len());
        time(&mut self.counters.narrow_phase, || {
            for (a, b) in candidates {
                update_pair(a, b, bodies, statics, broad_phase, narrow_phase, pair_cache, solver_set, narrow_phase_hooks, params);
            }
        });

        log::debug!("step: solve ({} constraints)", solver_set.len());
        time(&mut self.counters.solver, || {
            #[cfg(feature = "parallel")]
            IslandSolver::solve_parallel(solver_set, bodies, statics, params);
            #[cfg(not(feature = "parallel"))]
            IslandSolver::solve(solver_set, bodies, statics, params);
        });

        log::debug!("step: sleep detection");
        time(&mut self.counters.sleep, || put_sleepy_islands_to_sleep(bodies, solver_set, broad_phase, statics));
    }

    /// Wakes an inactive set, migrating its bodies' broadphase leaves back
    /// into the active tree (component design §4.8, "Activate"). Exposed
    /// for callers driving a user-requested wake outside of [`Self::step`];
    /// used internally whenever a fresh constraint references a sleeping
    /// body.
    pub fn wake(bodies: &mut BodySet, statics: &mut StaticSet, broad_phase: &mut BroadPhase<ColliderId>, set_id: crate::dynamics::body::SetId) {
        let moved = crate::dynamics::sleep::wake_set(bodies, set_id);
        for handle in moved {
            migrate_leaf(ColliderId::Body(handle), &mut broad_phase.statics, &mut broad_phase.active, bodies, statics);
        }
    }
}

fn refresh_active_leaves(bodies: &mut BodySet, broad_phase: &mut BroadPhase<ColliderId>, predicted: &[(usize, Aabb)]) {
    for &(index, aabb) in predicted {
        let handle = bodies.handle_at(ACTIVE_SET, index);
        if let Some(body) = bodies.get_mut(handle) {
            if let Some(collidable) = body.collidable.as_mut() {
                match collidable.leaf {
                    Some(leaf) => broad_phase.active.update(leaf, aabb),
                    None => collidable.leaf = Some(broad_phase.active.add(aabb, ColliderId::Body(handle))),
                }
            }
        }
    }
}

fn enumerate_candidate_pairs(broad_phase: &BroadPhase<ColliderId>) -> Vec<(ColliderId, ColliderId)> {
    let mut pairs = Vec::new();
    broad_phase.active.self_overlaps(|a, b| pairs.push((broad_phase.active.user_data(a), broad_phase.active.user_data(b))));
    broad_phase
        .active
        .cross_overlaps(&broad_phase.statics, |a, b| pairs.push((broad_phase.active.user_data(a), broad_phase.statics.user_data(b))));
    pairs
}

fn shape_info(collider: ColliderId, bodies: &BodySet, statics: &StaticSet) -> Option<(ShapeType, ShapeHandle, Isometry)> {
    match collider {
        ColliderId::Body(h) => {
            let body = bodies.get(h)?;
            let c = body.collidable.as_ref()?;
            Some((c.shape_type, c.shape, body.pose))
        }
        ColliderId::Static(h) => {
            let s = statics.get(h)?;
            let c = s.collidable.as_ref()?;
            Some((c.shape_type, c.shape, s.pose))
        }
    }
}

/// If `collider` is a body currently asleep, wakes its whole set and
/// migrates its leaf from the static tree back to the active one
/// (component design §4.6, "Newly added constraints... trigger a wake").
fn wake_if_inactive(collider: ColliderId, bodies: &mut BodySet, statics: &mut StaticSet, broad_phase: &mut BroadPhase<ColliderId>) {
    let ColliderId::Body(handle) = collider else { return };
    let Some((set_id, _)) = bodies.location(handle) else { return };
    if set_id == ACTIVE_SET {
        return;
    }
    log::debug!("waking set {set_id} for a new constraint reference");
    let moved = crate::dynamics::sleep::wake_set(bodies, set_id);
    for h in moved {
        migrate_leaf(ColliderId::Body(h), &mut broad_phase.statics, &mut broad_phase.active, bodies, statics);
    }
}

fn patch_backref(collider: ColliderId, new_leaf: LeafId, bodies: &mut BodySet, statics: &mut StaticSet) {
    match collider {
        ColliderId::Body(h) => {
            if let Some(c) = bodies.get_mut(h).and_then(|b| b.collidable.as_mut()) {
                c.leaf = Some(new_leaf);
            }
        }
        ColliderId::Static(h) => {
            if let Some(c) = statics.get_mut(h).and_then(|s| s.collidable.as_mut()) {
                c.leaf = Some(new_leaf);
            }
        }
    }
}

/// Moves `collider`'s broadphase leaf from `from` to `to`, patching
/// whichever leaf `from.remove` relocated into the vacated slot (component
/// design §4.3, "remove may relocate another leaf").
fn migrate_leaf(collider: ColliderId, from: &mut Tree<ColliderId>, to: &mut Tree<ColliderId>, bodies: &mut BodySet, statics: &mut StaticSet) {
    let leaf = match collider {
        ColliderId::Body(h) => bodies.get(h).and_then(|b| b.collidable.as_ref()).and_then(|c| c.leaf),
        ColliderId::Static(h) => statics.get(h).and_then(|s| s.collidable.as_ref()).and_then(|c| c.leaf),
    };
    let Some(leaf) = leaf else { return };
    let bounds = from.bounds(leaf);
    if let Some((relocated_leaf, relocated_owner)) = from.remove(leaf) {
        patch_backref(relocated_owner, relocated_leaf, bodies, statics);
    }
    let new_leaf = to.add(bounds, collider);
    patch_backref(collider, new_leaf, bodies, statics);
}

/// Runs the narrow phase for one broad-phase candidate pair and folds the
/// result into the constraint graph and pair cache (component design §4.5,
/// §4.6). `a` is always a body (both `self_overlaps` and `cross_overlaps`
/// are enumerated with the active tree first); `b` is a body or a static.
#[allow(clippy::too_many_arguments)]
fn update_pair<NH: NarrowPhaseHooks>(
    a: ColliderId,
    b: ColliderId,
    bodies: &mut BodySet,
    statics: &mut StaticSet,
    broad_phase: &mut BroadPhase<ColliderId>,
    narrow_phase: &NarrowPhase,
    pair_cache: &mut PairCache,
    solver_set: &mut SolverSet,
    hooks: &NH,
    params: &IntegrationParameters,
) {
    if !hooks.allow_contact_generation(0, a, b) {
        return;
    }
    let pair = CollidablePair::new(a, b);
    let Some((shape_type_a, shape_a, pose_a)) = shape_info(a, bodies, statics) else { return };
    let Some((shape_type_b, shape_b, pose_b)) = shape_info(b, bodies, statics) else { return };

    let Some(manifold) = narrow_phase.test(shape_type_a, shape_a, &pose_a, shape_type_b, shape_b, &pose_b) else {
        pair_cache.remove(pair);
        return;
    };

    let (accept, material) = hooks.configure_contact_manifold(0, pair, &manifold);
    if !accept {
        pair_cache.remove(pair);
        return;
    }

    let kind = manifold.constraint_kind();
    let existing = pair_cache.get(pair).map(|e| (e.constraint_handle, e.constraint_kind, e.collision_cache.clone()));
    let previous_impulses = harvest_previous_impulses(&existing, solver_set);

    match pair_cache.classify(pair, kind) {
        PairUpdate::Create => {}
        PairUpdate::UpdateInPlace { handle, .. } => {
            solver_set.remove(handle);
        }
        PairUpdate::ReplaceKind { old_handle } => {
            solver_set.remove(old_handle);
        }
    }

    let ColliderId::Body(body_a_handle) = a else {
        log::warn!("narrow phase pair with a non-body first participant; skipping");
        return;
    };

    wake_if_inactive(a, bodies, statics, broad_phase);
    wake_if_inactive(b, bodies, statics, broad_phase);

    let Some(body_a) = bodies.get(body_a_handle) else { return };
    let (constrained_b, body_b_for_prestep) = match b {
        ColliderId::Body(hb) => {
            let Some(body_b) = bodies.get(hb) else { return };
            (ConstrainedBody::Dynamic(hb), Ok(body_b))
        }
        ColliderId::Static(hs) => {
            let Some(static_b) = statics.get(hs) else { return };
            (ConstrainedBody::Static(hs), Err(&static_b.pose))
        }
    };

    // `material.spring`/`material.max_recovery_velocity` are accepted from
    // the hooks but not yet threaded into `prestep`'s softness math, which
    // still reads the simulation-wide `IntegrationParameters`; only
    // friction is applied per pair. See `DESIGN.md`.
    let (handle, feature_ids, seeded) = match &manifold {
        Manifold::Convex { normal, contacts } => {
            let feature_ids: Vec<FeatureId> = contacts.iter().map(|c| c.feature_id).collect();
            let seeded = manifold::carry_warm_start(&feature_ids, &previous_impulses);
            let mut constraint = ContactConstraint::prestep(body_a_handle, body_a, constrained_b, body_b_for_prestep, *normal, contacts, material.friction_coefficient, params);
            constraint.seed_impulses(&seeded);
            let handle = solver_set.add_contact(body_a_handle, constrained_b.as_dynamic(), constraint);
            (handle, feature_ids, seeded)
        }
        Manifold::NonConvex { contacts } => {
            let feature_ids: Vec<FeatureId> = contacts.iter().map(|c| c.feature_id).collect();
            let seeded = manifold::carry_warm_start(&feature_ids, &previous_impulses);
            let mut constraint = ContactNonConvexConstraint::prestep(body_a_handle, body_a, constrained_b, body_b_for_prestep, contacts, material.friction_coefficient, params);
            constraint.seed_impulses(&seeded);
            let handle = solver_set.add_contact_non_convex(body_a_handle, constrained_b.as_dynamic(), constraint);
            (handle, feature_ids, seeded)
        }
    };

    pair_cache.insert(
        pair,
        PairCacheEntry {
            constraint_handle: handle,
            constraint_kind: kind,
            collision_cache: feature_ids.into_iter().zip(seeded).collect(),
        },
    );
}

/// Reads the currently-stored constraint's post-solve normal impulses
/// (i.e. the result of *last* step's solve, still live in `solver_set`
/// since this runs before this step's removal), paired with the feature
/// ids they belonged to, for warm-start matching against this step's fresh
/// manifold.
fn harvest_previous_impulses(existing: &Option<(crate::dynamics::solver::ConstraintHandle, ConstraintKind, Vec<(FeatureId, Real)>)>, solver_set: &SolverSet) -> Vec<(FeatureId, Real)> {
    let Some((handle, kind, collision_cache)) = existing else {
        return Vec::new();
    };
    let impulses = match kind {
        ConstraintKind::Contact => solver_set.get_contact(*handle).map(|c| c.normal_impulses()),
        ConstraintKind::ContactNonConvex => solver_set.get_contact_non_convex(*handle).map(|c| c.normal_impulses()),
        _ => None,
    };
    match impulses {
        Some(impulses) => collision_cache.iter().map(|(fid, _)| *fid).zip(impulses).collect(),
        None => Vec::new(),
    }
}

fn put_sleepy_islands_to_sleep(bodies: &mut BodySet, solver_set: &SolverSet, broad_phase: &mut BroadPhase<ColliderId>, statics: &mut StaticSet) {
    let islands = crate::dynamics::sleep::find_sleepy_islands(bodies, solver_set);
    if islands.is_empty() {
        return;
    }
    log::debug!("putting {} island(s) to sleep", islands.len());
    for island in &islands {
        for &handle in island {
            migrate_leaf(ColliderId::Body(handle), &mut broad_phase.active, &mut broad_phase.statics, bodies, statics);
        }
    }
    crate::dynamics::sleep::sleep_islands(bodies, &islands);
}
