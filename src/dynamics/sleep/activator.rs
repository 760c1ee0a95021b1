//! Wakes an inactive body set (component design §4.8, "Activate").
//!
//! The full procedure reserves capacity across the active body set,
//! broadphase, solver set, and pair cache in one pre-pass, then runs two
//! barrier-separated phases of parallel jobs (pair-cache activation,
//! referenced-handle merge, body region copy; then broadphase migration and
//! constraint region copy). Because this crate's [`SolverSet`] is never
//! split per body set (see `sleeper.rs`), there is no constraint or
//! pair-cache storage to migrate back — waking a set only needs
//! [`BodySet::migrate_to_active`], plus resetting the woken bodies'
//! activity counters so they are not immediately re-flagged as sleep
//! candidates. "Single-threaded execution uses the same job lists but runs
//! them sequentially" reduces, in this simplified architecture, to a single
//! sequential pass over the moved handles.

use crate::dynamics::body::{BodyHandle, BodySet, SetId, ACTIVE_SET};

/// Wakes every body in inactive set `set_id`, resetting their sleep
/// counters ("reset-activity = true for user-driven wakes"), and returns
/// the handles that moved.
pub fn wake_set(bodies: &mut BodySet, set_id: SetId) -> Vec<BodyHandle> {
    let moved = bodies.migrate_to_active(set_id);
    for &handle in &moved {
        if let Some(body) = bodies.get_mut(handle) {
            body.activity.reset();
        }
    }
    moved
}

/// If `handle` currently lives in an inactive set, wakes that whole set and
/// returns its former id. Used when a newly added constraint or a fresh
/// collision references a sleeping body (component design §4.6, "Newly
/// added constraints that reference any body in an inactive set trigger a
/// wake of those sets before integration into the active solver sets").
pub fn wake_if_inactive(bodies: &mut BodySet, handle: BodyHandle) -> Option<SetId> {
    let (set_id, _) = bodies.location(handle)?;
    if set_id == ACTIVE_SET {
        return None;
    }
    wake_set(bodies, set_id);
    Some(set_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::body::rigid_body::BodyDescription;

    #[test]
    fn waking_a_sleeping_body_returns_it_to_the_active_set() {
        let mut bodies = BodySet::new();
        let a = bodies.add(&BodyDescription::default());
        let set_id = bodies.migrate_to_inactive(&[a]);
        assert!(bodies.location(a).unwrap().0 != ACTIVE_SET);

        let woken = wake_if_inactive(&mut bodies, a);
        assert_eq!(woken, Some(set_id));
        assert_eq!(bodies.location(a).unwrap().0, ACTIVE_SET);
    }

    #[test]
    fn waking_resets_sleep_counters() {
        let mut bodies = BodySet::new();
        let a = bodies.add(&BodyDescription::default());
        {
            let body = bodies.get_mut(a).unwrap();
            body.activity.steps_under_threshold = 1000;
            body.activity.sleep_candidate = true;
        }
        let set_id = bodies.migrate_to_inactive(&[a]);
        wake_set(&mut bodies, set_id);

        let body = bodies.get(a).unwrap();
        assert_eq!(body.activity.steps_under_threshold, 0);
        assert!(!body.activity.sleep_candidate);
    }

    #[test]
    fn an_already_active_body_is_left_alone() {
        let mut bodies = BodySet::new();
        let a = bodies.add(&BodyDescription::default());
        assert_eq!(wake_if_inactive(&mut bodies, a), None);
    }
}
