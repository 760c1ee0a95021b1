//! Contact manifolds and non-convex manifold reduction (component design
//! §4.5).

use arrayvec::ArrayVec;

use crate::geometry::contact::{ConvexContact, FeatureId, NonConvexContact};
use crate::math::{Real, Vector};

/// A fixed, non-axis-aligned direction used to pick a stable starting
/// contact when reducing a non-convex manifold (component design §4.5 step
/// 1). The exact numbers are a tunable constant, not a value with semantic
/// meaning — see the open question in the design notes: the property that
/// matters is "fixed and non-axis-aligned", not these particular digits.
pub const EXTREMITY_AXIS: Vector = Vector::new(0.4362, 0.7081, 0.6753);

/// Candidates past this count in a non-convex manifold always get reduced.
pub const MAX_NONCONVEX_CONTACTS: usize = 8;
pub const MAX_CONVEX_CONTACTS: usize = 4;
/// Both manifold kinds are reduced down to this many contacts before being
/// handed to the solver.
pub const MAX_SOLVER_CONTACTS: usize = 4;

/// Penalty multiplier applied to a speculative (negative-depth) contact's
/// residual score during reduction, so touching contacts are strongly
/// preferred over merely-predicted ones.
const SPECULATIVE_PENALTY: Real = 0.2;

/// A contact manifold for one collidable pair, as produced by a narrow-phase
/// tester and (for the non-convex case) already reduced to at most
/// [`MAX_SOLVER_CONTACTS`] points.
#[derive(Debug, Clone)]
pub enum Manifold {
    Convex {
        normal: Vector,
        contacts: ArrayVec<ConvexContact, MAX_CONVEX_CONTACTS>,
    },
    NonConvex {
        contacts: ArrayVec<NonConvexContact, MAX_SOLVER_CONTACTS>,
    },
}

impl Manifold {
    pub fn constraint_kind(&self) -> crate::dynamics::solver::constraint_kind::ConstraintKind {
        use crate::dynamics::solver::constraint_kind::ConstraintKind;
        match self {
            Manifold::Convex { .. } => ConstraintKind::Contact,
            Manifold::NonConvex { .. } => ConstraintKind::ContactNonConvex,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Manifold::Convex { contacts, .. } => contacts.is_empty(),
            Manifold::NonConvex { contacts } => contacts.is_empty(),
        }
    }
}

/// Reduces an arbitrarily long list of non-convex candidate contacts (e.g.
/// from overlapping compound children) down to at most
/// [`MAX_SOLVER_CONTACTS`], by most-constraining-subset selection
/// (component design §4.5).
pub fn reduce_non_convex(
    candidates: &[NonConvexContact],
) -> ArrayVec<NonConvexContact, MAX_SOLVER_CONTACTS> {
    let mut chosen: ArrayVec<NonConvexContact, MAX_SOLVER_CONTACTS> = ArrayVec::new();
    if candidates.is_empty() {
        return chosen;
    }

    let mut remaining: Vec<usize> = (0..candidates.len()).collect();

    // Step 1: starting contact via extremity heuristic + depth, strongly
    // preferring non-speculative contacts, with an index bias so ties break
    // the same way across frames.
    let start = remaining
        .iter()
        .copied()
        .max_by(|&a, &b| start_score(&candidates[a], a).total_cmp(&start_score(&candidates[b], b)))
        .unwrap();
    chosen.push(candidates[start]);
    remaining.retain(|&i| i != start);

    // Steps 2-3: repeatedly add the candidate with the largest residual
    // impulse against the already-chosen subset, stopping at capacity or
    // once nothing remains.
    while chosen.len() < MAX_SOLVER_CONTACTS && !remaining.is_empty() {
        let best = remaining
            .iter()
            .copied()
            .max_by(|&a, &b| {
                residual_score(&candidates[a], &chosen).total_cmp(&residual_score(&candidates[b], &chosen))
            })
            .unwrap();
        chosen.push(candidates[best]);
        remaining.retain(|&i| i != best);
    }

    chosen
}

fn start_score(c: &NonConvexContact, index: usize) -> Real {
    let projection = c.local_point_a.coords.dot(&EXTREMITY_AXIS);
    let non_speculative_bonus = if c.depth >= 0.0 { 1000.0 } else { 0.0 };
    // Tiny, strictly-decreasing-in-index term: stable tie-break only, never
    // large enough to overturn a genuine depth/projection difference.
    let tie_break = -(index as Real) * 1e-6;
    projection + non_speculative_bonus + c.depth + tie_break
}

/// Approximates the impulse a contact would still need to apply after an
/// idealized unit-mass solve has already resolved `chosen`: depth minus the
/// portion already "explained" by how aligned this contact's normal is with
/// the normals already selected.
fn residual_score(c: &NonConvexContact, chosen: &[NonConvexContact]) -> Real {
    let mut residual = c.depth.max(0.0);
    for other in chosen {
        let alignment = c.normal.dot(&other.normal).max(0.0);
        residual -= alignment * other.depth.max(0.0);
    }
    if c.depth < 0.0 {
        residual *= SPECULATIVE_PENALTY;
    }
    residual
}

/// Matches each of `new_feature_ids` against `previous` by feature id for
/// warm-start seeding (component design §4.6); unmatched new contacts start
/// at zero accumulated impulse.
///
/// With the `redistribute-unmatched-impulse` feature, impulse carried by a
/// previous-frame contact whose feature id matches none of
/// `new_feature_ids` is spread evenly across the matched contacts instead of
/// being discarded — an open design question resolved off-by-default, see
/// `DESIGN.md`.
pub fn carry_warm_start(
    new_feature_ids: &[FeatureId],
    previous: &[(FeatureId, Real)],
) -> Vec<Real> {
    let seeded: Vec<Real> = new_feature_ids
        .iter()
        .map(|id| {
            previous
                .iter()
                .find(|(prev_id, _)| prev_id == id)
                .map(|(_, impulse)| *impulse)
                .unwrap_or(0.0)
        })
        .collect();

    #[cfg(feature = "redistribute-unmatched-impulse")]
    let seeded = {
        let mut seeded = seeded;
        let unmatched: Real = previous
            .iter()
            .filter(|(prev_id, _)| !new_feature_ids.contains(prev_id))
            .map(|(_, impulse)| *impulse)
            .sum();
        let matched: Vec<usize> = new_feature_ids
            .iter()
            .enumerate()
            .filter(|(_, id)| previous.iter().any(|(prev_id, _)| prev_id == *id))
            .map(|(i, _)| i)
            .collect();
        if unmatched != 0.0 && !matched.is_empty() {
            let share = unmatched / matched.len() as Real;
            for i in matched {
                seeded[i] += share;
            }
        }
        seeded
    };

    seeded
}
