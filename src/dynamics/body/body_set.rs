//! Active/inactive body storage, handle↔location mapping, and the (simpler)
//! static body store (component design §3 "Body"/"Static", §4.2, §4.8).

use rustc_hash::FxHashMap;

use crate::data::arena::{Arena, Index};
use crate::dynamics::body::rigid_body::{BodyDescription, RigidBody};
use crate::geometry::collidable::Collidable;
use crate::math::Isometry;

/// Stable handle to a dynamic body. Survives moves between sets (sleep and
/// wake); the `(set, index)` it resolves to does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle(pub(crate) Index);

/// Stable handle to a static body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StaticHandle(pub(crate) Index);

impl BodyHandle {
    #[cfg(test)]
    pub(crate) fn for_test(index: Index) -> Self {
        BodyHandle(index)
    }
}

/// Id of a body set: `0` is always the active set; any other value names a
/// currently-asleep island, allocated by [`BodySet::migrate_to_inactive`].
pub type SetId = u32;
pub const ACTIVE_SET: SetId = 0;

#[derive(Clone, Copy)]
struct Location {
    set_id: SetId,
    index: usize,
}

struct Set {
    bodies: Vec<RigidBody>,
    handles: Vec<BodyHandle>,
}

impl Set {
    fn empty() -> Self {
        Set {
            bodies: Vec::new(),
            handles: Vec::new(),
        }
    }
}

/// Owns every dynamic body, partitioned into the active set and zero or more
/// inactive (sleeping) sets, plus the handle→location map that lets any
/// other subsystem resolve a [`BodyHandle`] in O(1).
pub struct BodySet {
    handle_to_location: Arena<Location>,
    active: Set,
    inactive: FxHashMap<SetId, Set>,
    next_inactive_set_id: SetId,
}

impl Default for BodySet {
    fn default() -> Self {
        Self::new()
    }
}

impl BodySet {
    pub fn new() -> Self {
        BodySet {
            handle_to_location: Arena::new(),
            active: Set::empty(),
            inactive: FxHashMap::default(),
            next_inactive_set_id: 1,
        }
    }

    /// Creates a body into the active set (component design §3 lifecycle).
    pub fn add(&mut self, description: &BodyDescription) -> BodyHandle {
        let body = description.build();
        let index = self.active.bodies.len();
        let handle = BodyHandle(self.handle_to_location.insert(Location {
            set_id: ACTIVE_SET,
            index,
        }));
        self.active.bodies.push(body);
        self.active.handles.push(handle);
        handle
    }

    /// Removes a body from whichever set currently holds it.
    pub fn remove(&mut self, handle: BodyHandle) -> Option<RigidBody> {
        let location = self.handle_to_location.remove(handle.0)?;
        let set = self.set_mut(location.set_id);
        let removed = set.bodies.swap_remove(location.index);
        set.handles.swap_remove(location.index);
        if location.index < set.bodies.len() {
            let moved_handle = set.handles[location.index];
            self.handle_to_location[moved_handle.0].index = location.index;
        }
        Some(removed)
    }

    fn set(&self, set_id: SetId) -> &Set {
        if set_id == ACTIVE_SET {
            &self.active
        } else {
            self.inactive.get(&set_id).expect("invalid inactive set id")
        }
    }

    fn set_mut(&mut self, set_id: SetId) -> &mut Set {
        if set_id == ACTIVE_SET {
            &mut self.active
        } else {
            self.inactive.get_mut(&set_id).expect("invalid inactive set id")
        }
    }

    pub fn get(&self, handle: BodyHandle) -> Option<&RigidBody> {
        let location = self.handle_to_location.get(handle.0)?;
        Some(&self.set(location.set_id).bodies[location.index])
    }

    pub fn get_mut(&mut self, handle: BodyHandle) -> Option<&mut RigidBody> {
        let location = *self.handle_to_location.get(handle.0)?;
        Some(&mut self.set_mut(location.set_id).bodies[location.index])
    }

    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.handle_to_location.contains(handle.0)
    }

    /// The `(set, index)` a handle currently resolves to. Exposed so the
    /// solver can build body-reference bundles without copying full bodies.
    pub fn location(&self, handle: BodyHandle) -> Option<(SetId, usize)> {
        self.handle_to_location
            .get(handle.0)
            .map(|l| (l.set_id, l.index))
    }

    pub fn handle_at(&self, set_id: SetId, index: usize) -> BodyHandle {
        self.set(set_id).handles[index]
    }

    pub fn active_bodies(&self) -> &[RigidBody] {
        &self.active.bodies
    }

    pub fn active_bodies_mut(&mut self) -> &mut [RigidBody] {
        &mut self.active.bodies
    }

    pub fn active_len(&self) -> usize {
        self.active.bodies.len()
    }

    pub fn inactive_set_ids(&self) -> impl Iterator<Item = SetId> + '_ {
        self.inactive.keys().copied()
    }

    pub fn inactive_bodies(&self, set_id: SetId) -> &[RigidBody] {
        &self.inactive[&set_id].bodies
    }

    pub fn inactive_len(&self, set_id: SetId) -> usize {
        self.inactive.get(&set_id).map_or(0, |s| s.bodies.len())
    }

    /// Moves `handles` (which must currently all be active) into a freshly
    /// allocated inactive set, rewriting `handle_to_location` for both the
    /// moved bodies and any active-set bodies displaced by the removals.
    /// Component design §4.8 "sleep" (stated for symmetry with activation).
    pub fn migrate_to_inactive(&mut self, handles: &[BodyHandle]) -> SetId {
        let set_id = self.next_inactive_set_id;
        self.next_inactive_set_id += 1;

        let mut pairs: Vec<(BodyHandle, usize)> = handles
            .iter()
            .map(|&h| (h, self.handle_to_location[h.0].index))
            .collect();
        // Descending by index so each swap_remove only ever disturbs indices
        // we have not yet processed.
        pairs.sort_by(|a, b| b.1.cmp(&a.1));

        let mut new_set = Set {
            bodies: Vec::with_capacity(handles.len()),
            handles: Vec::with_capacity(handles.len()),
        };
        for (handle, index) in pairs {
            let body = self.active.bodies.swap_remove(index);
            self.active.handles.swap_remove(index);
            if index < self.active.bodies.len() {
                let moved = self.active.handles[index];
                self.handle_to_location[moved.0].index = index;
            }
            let new_index = new_set.bodies.len();
            self.handle_to_location[handle.0] = Location { set_id, index: new_index };
            new_set.bodies.push(body);
            new_set.handles.push(handle);
        }
        self.inactive.insert(set_id, new_set);
        set_id
    }

    /// Moves every body of inactive set `set_id` back into the active set,
    /// freeing the inactive set's storage and returning the handles moved
    /// (in their new active-set order), for the caller to use when
    /// migrating constraints and broadphase leaves (component design §4.8
    /// step 3 "Body region copy").
    pub fn migrate_to_active(&mut self, set_id: SetId) -> Vec<BodyHandle> {
        let set = self
            .inactive
            .remove(&set_id)
            .expect("invalid inactive set id");
        let mut moved = Vec::with_capacity(set.bodies.len());
        for (body, handle) in set.bodies.into_iter().zip(set.handles.into_iter()) {
            let new_index = self.active.bodies.len();
            self.handle_to_location[handle.0] = Location {
                set_id: ACTIVE_SET,
                index: new_index,
            };
            self.active.bodies.push(body);
            self.active.handles.push(handle);
            moved.push(handle);
        }
        moved
    }
}

/// A static body: pose and collidable only, no velocity or inertia
/// (component design §3 "Static"). Always lives in a single flat list.
#[derive(Debug, Clone)]
pub struct StaticBody {
    pub pose: Isometry,
    pub collidable: Option<Collidable>,
}

#[derive(Debug, Clone)]
pub struct StaticDescription {
    pub pose: Isometry,
    pub collidable: Option<crate::dynamics::body::rigid_body::CollidableDescription>,
}

pub struct StaticSet {
    handle_to_index: Arena<usize>,
    bodies: Vec<StaticBody>,
    handles: Vec<StaticHandle>,
}

impl Default for StaticSet {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticSet {
    pub fn new() -> Self {
        StaticSet {
            handle_to_index: Arena::new(),
            bodies: Vec::new(),
            handles: Vec::new(),
        }
    }

    pub fn add(&mut self, description: &StaticDescription) -> StaticHandle {
        let index = self.bodies.len();
        let handle = StaticHandle(self.handle_to_index.insert(index));
        self.bodies.push(StaticBody {
            pose: description.pose,
            collidable: description.collidable.map(|c| {
                Collidable::new(c.shape, c.shape_type, c.speculative_margin).with_continuity(c.continuity)
            }),
        });
        self.handles.push(handle);
        handle
    }

    pub fn remove(&mut self, handle: StaticHandle) -> Option<StaticBody> {
        let index = self.handle_to_index.remove(handle.0)?;
        let removed = self.bodies.swap_remove(index);
        self.handles.swap_remove(index);
        if index < self.bodies.len() {
            let moved_handle = self.handles[index];
            self.handle_to_index[moved_handle.0] = index;
        }
        Some(removed)
    }

    pub fn get(&self, handle: StaticHandle) -> Option<&StaticBody> {
        let index = *self.handle_to_index.get(handle.0)?;
        Some(&self.bodies[index])
    }

    pub fn get_mut(&mut self, handle: StaticHandle) -> Option<&mut StaticBody> {
        let index = *self.handle_to_index.get(handle.0)?;
        Some(&mut self.bodies[index])
    }

    pub fn handle_at(&self, index: usize) -> StaticHandle {
        self.handles[index]
    }

    pub fn bodies(&self) -> &[StaticBody] {
        &self.bodies
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc() -> BodyDescription {
        BodyDescription::default()
    }

    #[test]
    fn handle_bijection() {
        let mut set = BodySet::new();
        let a = set.add(&desc());
        let b = set.add(&desc());
        let (set_id, index) = set.location(a).unwrap();
        assert_eq!(set.handle_at(set_id, index), a);
        let (set_id, index) = set.location(b).unwrap();
        assert_eq!(set.handle_at(set_id, index), b);
    }

    #[test]
    fn remove_relocates_swapped_body_and_fixes_handle() {
        let mut set = BodySet::new();
        let a = set.add(&desc());
        let b = set.add(&desc());
        let c = set.add(&desc());
        set.remove(a).unwrap();
        // `c` (previously last) should now be wherever `a` was; its handle
        // must resolve to its new index.
        let (set_id, index) = set.location(c).unwrap();
        assert_eq!(set.handle_at(set_id, index), c);
        assert!(set.get(a).is_none());
        assert!(set.get(b).is_some());
    }

    #[test]
    fn sleep_then_wake_round_trip_preserves_handles() {
        let mut set = BodySet::new();
        let a = set.add(&desc());
        let b = set.add(&desc());
        let island = set.migrate_to_inactive(&[a, b]);
        assert_eq!(set.active_len(), 0);
        assert_eq!(set.inactive_len(island), 2);
        let moved = set.migrate_to_active(island);
        assert_eq!(moved.len(), 2);
        assert_eq!(set.active_len(), 2);
        for h in [a, b] {
            let (set_id, index) = set.location(h).unwrap();
            assert_eq!(set_id, ACTIVE_SET);
            assert_eq!(set.handle_at(set_id, index), h);
        }
    }

    #[test]
    fn static_set_round_trips() {
        let mut statics = StaticSet::new();
        let s1 = statics.add(&StaticDescription {
            pose: Isometry::identity(),
            collidable: None,
        });
        let s2 = statics.add(&StaticDescription {
            pose: Isometry::identity(),
            collidable: None,
        });
        statics.remove(s1).unwrap();
        assert_eq!(statics.handle_at(0), s2);
    }
}
