//! Glues body storage, the broad and narrow phases, the pair cache, and the
//! solver into one per-step procedure (component design §4.1, §5).

pub mod counters;
pub mod hooks;
pub mod physics_pipeline;

pub use counters::Counters;
pub use hooks::{NarrowPhaseHooks, PairMaterial, SpringParameters};
pub use physics_pipeline::PhysicsPipeline;
