//! Per-call performance metrics for the episode controller.

/// Timing data for the most recent reset or step.
///
/// All durations are in microseconds of wall-clock time. They are for
/// telemetry only; episode length never depends on them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepMetrics {
    /// Wall-clock time for the whole call, in microseconds.
    pub total_us: u64,
    /// Time spent bringing up physics (reset or recompile), in
    /// microseconds. Zero for steps.
    pub episode_setup_us: u64,
    /// Physics steps taken by the call.
    pub physics_steps: u32,
}
