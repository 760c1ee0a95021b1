//! Read-only per-phase timing diagnostics (component design §4.9, grounded
//! on rapier's `Counters`). Not a metrics/telemetry system — just the
//! wall-clock time the last [`crate::pipeline::PhysicsPipeline::step`] spent
//! in each phase, for a caller's own profiling overlay.

use instant::Duration;

#[derive(Debug, Clone, Copy, Default)]
pub struct Counters {
    pub pose_integration: Duration,
    pub broad_phase: Duration,
    pub overlap_enumeration: Duration,
    pub narrow_phase: Duration,
    pub solver: Duration,
    pub sleep: Duration,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> Duration {
        self.pose_integration + self.broad_phase + self.overlap_enumeration + self.narrow_phase + self.solver + self.sleep
    }

    pub(crate) fn reset(&mut self) {
        *self = Counters::default();
    }
}

/// Times one phase's closure and stores the elapsed duration into `field`.
pub(crate) fn time<R>(field: &mut Duration, f: impl FnOnce() -> R) -> R {
    let start = instant::Instant::now();
    let result = f();
    *field = start.elapsed();
    result
}
