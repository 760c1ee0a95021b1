//! Simulation-wide tunables.
//!
//! Grounded on the teacher's `dynamics::integration_parameters` module: this
//! is the one struct in the crate documented field-by-field, matching the
//! teacher's own density of documentation for it (most other structs here
//! get a one-line summary, this one doesn't).

use crate::math::Real;

/// Timestep, solver, and activity tunables consumed by every phase of
/// [`crate::pipeline::physics_pipeline::PhysicsPipeline::step`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct IntegrationParameters {
    /// The timestep length, in seconds, used by [`crate::dynamics::pose_integrator`].
    pub dt: Real,

    /// Number of velocity-solver iterations run per step (component design
    /// §4.7 step 3). Default: 8.
    pub num_solver_iterations: u32,

    /// Scales the previous frame's accumulated impulse applied during warm
    /// start (component design §4.7 step 2). `1.0` applies it in full; `0.0`
    /// disables warm starting entirely (useful for isolating its effect in
    /// tests).
    pub warm_start_coefficient: Real,

    /// Upper bound on the bias velocity a constraint may request to correct
    /// positional error, in meters/second. Prevents deep-penetration pops.
    pub max_recovery_velocity: Real,

    /// Natural frequency, in Hz, of the implicit spring used to derive CFM
    /// softness for ordinary (non-joint) contacts.
    pub contact_natural_frequency: Real,

    /// Damping ratio of that same implicit spring. `1.0` is critically
    /// damped.
    pub contact_damping_ratio: Real,

    /// Distance, in meters, a contact may be "speculative" (negative depth)
    /// and still be kept for solving, giving the solver foresight for
    /// continuous behavior.
    pub prediction_distance: Real,

    /// Squared-velocity threshold below which a body is a sleep candidate
    /// (component design §4.4 step 5, §9 "sleep candidate epsilon"). A
    /// per-body override can still be supplied in its activity description;
    /// this is only the engine-wide default.
    pub default_sleep_threshold: Real,

    /// Minimum number of consecutive steps a body (and, transitively, its
    /// island) must stay under `default_sleep_threshold` before it becomes
    /// eligible to sleep.
    pub default_min_steps_before_sleep: u32,

    /// When set, forces single-threaded solve paths so that a multithreaded
    /// build still produces bit-identical results across runs (design notes
    /// §9, "cross-thread determinism ... is a policy choice").
    pub deterministic: bool,
}

impl Default for IntegrationParameters {
    fn default() -> Self {
        IntegrationParameters {
            dt: 1.0 / 60.0,
            num_solver_iterations: 8,
            warm_start_coefficient: 1.0,
            max_recovery_velocity: 4.0,
            contact_natural_frequency: 30.0,
            contact_damping_ratio: 1.0,
            prediction_distance: 0.002,
            default_sleep_threshold: 0.01,
            default_min_steps_before_sleep: 60,
            deterministic: false,
        }
    }
}

impl IntegrationParameters {
    /// Validates fields that have no well-defined recovery and would
    /// otherwise produce silent nonsense (e.g. NaNs cascading through the
    /// solver). Everything else in this crate treats bad input as a contract
    /// violation; this one path is fallible on purpose, since callers often
    /// build this struct from user-facing configuration.
    pub fn validate(&self) -> Result<(), crate::errors::EngineError> {
        if !(self.dt > 0.0) {
            return Err(crate::errors::EngineError::InvalidIntegrationParameters(
                "dt must be positive",
            ));
        }
        if self.num_solver_iterations == 0 {
            return Err(crate::errors::EngineError::InvalidIntegrationParameters(
                "num_solver_iterations must be at least 1",
            ));
        }
        if self.default_min_steps_before_sleep == 0 {
            return Err(crate::errors::EngineError::InvalidIntegrationParameters(
                "default_min_steps_before_sleep must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Pre-sizing hints consumed by [`crate::simulation::Simulation::create`] so
/// the first step of a simulation doesn't pay for a cascade of pool growth.
/// Purely a performance hint: under-provisioning only costs a few extra
/// pool allocations, never a correctness issue.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllocationHints {
    pub expected_body_count: usize,
    pub expected_static_count: usize,
    pub expected_constraint_count: usize,
    pub expected_contact_pair_count: usize,
}

impl AllocationHints {
    /// Largest power of two, in bytes, the memory pool backing a simulation
    /// built with these hints should support.
    pub fn max_pool_power(&self) -> u32 {
        let total = self.expected_body_count
            + self.expected_static_count
            + self.expected_constraint_count * 4
            + self.expected_contact_pair_count * 4;
        let bytes = (total.max(64) * 256) as u64;
        (64 - bytes.leading_zeros()).max(12)
    }
}
