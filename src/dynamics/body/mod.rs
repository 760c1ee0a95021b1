//! Body storage: active/inactive sets and statics.

pub mod body_set;
pub mod rigid_body;

pub use body_set::{ACTIVE_SET, BodyHandle, BodySet, SetId, StaticBody, StaticDescription, StaticHandle, StaticSet};
pub use rigid_body::{Activity, BodyDescription, CollidableDescription, RigidBody};
