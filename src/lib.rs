//! A real-time rigid-body physics core: pose integration, broad and narrow
//! phase collision detection, a constraint graph with a pair cache, a
//! batched iterative solver, and sleep management.
//!
//! Concrete collision geometry is out of scope (see [`geometry::collidable`]
//! and [`geometry::narrow_phase`]): the embedding application supplies shape
//! storage and collision testers, keyed by an opaque [`geometry::collidable::ShapeType`].
//! Everything from there on — broad phase, narrow phase dispatch, the
//! constraint graph, and the solver — lives in this crate.
//!
//! [`simulation::Simulation`] is the entry point most applications want;
//! [`pipeline::PhysicsPipeline`] is the lower-level per-step procedure it
//! wraps, for callers that want to own body/constraint storage themselves.

extern crate nalgebra as na;

pub mod data;
pub mod dynamics;
pub mod errors;
pub mod geometry;
pub mod math;
pub mod pipeline;
pub mod simulation;
pub mod utils;

pub use errors::EngineError;
pub use simulation::Simulation;
