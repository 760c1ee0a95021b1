//! The batched iterative constraint solver (component design §4.7): batch
//! assignment, per-kind constraint math, and the island-wide solve loop.

pub mod batch;
pub mod constrained_body;
pub mod constraint_kind;
pub mod contact_constraint;
pub mod island_solver;
pub mod joint_constraint;
pub mod solver_set;

pub use batch::ConstraintHandle;
pub use constrained_body::ConstrainedBody;
pub use constraint_kind::ConstraintKind;
pub use contact_constraint::{ContactConstraint, ContactNonConvexConstraint};
pub use island_solver::IslandSolver;
pub use solver_set::SolverSet;
