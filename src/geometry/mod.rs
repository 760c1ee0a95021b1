//! Collidables, broad phase, contacts, manifolds, narrow phase, and the
//! pair cache (component design §3, §4.3, §4.5, §4.6).

pub mod broad_phase;
pub mod collidable;
pub mod contact;
pub mod manifold;
pub mod narrow_phase;
pub mod pair_cache;

pub use broad_phase::{Aabb, BroadPhase, LeafId, Tree};
pub use collidable::{Collidable, ContinuityMode, ShapeHandle, ShapeType};
pub use contact::{mix_feature_id, ConvexContact, FeatureId, NonConvexContact};
pub use manifold::Manifold;
pub use narrow_phase::{NarrowPhase, PairTester, TestOutcome};
pub use pair_cache::{ColliderId, CollidablePair, PairCache, PairCacheEntry, PairUpdate};
