//! Body storage, pose integration, the constraint solver, and sleep
//! management — everything that advances a simulation's dynamic state.

pub mod body;
pub mod integration_parameters;
pub mod pose_integrator;
pub mod sleep;
pub mod solver;

pub use integration_parameters::{AllocationHints, IntegrationParameters};
pub use pose_integrator::{PoseIntegrator, PoseIntegratorCallbacks};
pub use sleep::{find_sleepy_islands, sleep_islands, wake_if_inactive, wake_set};
