//! Low-level storage primitives shared by the rest of the crate.

pub mod arena;
pub mod pool;

pub use arena::{Arena, Index};
pub use pool::{Buffer, Pool, ScopedBuffer};
