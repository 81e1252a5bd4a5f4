//! Timestep validation and episode timing.

use kinema_core::ConfigError;

/// How far `control / physics` may sit from an integer and still count
/// as one. Absorbs binary rounding such as `0.025 / 0.005 = 5.000000000000001`.
pub const RATIO_TOLERANCE: f64 = 1e-6;

fn check_timestep(which: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositiveTimestep { which, value })
    }
}

/// Snap `x` to the nearest integer when within [`RATIO_TOLERANCE`].
fn snap(x: f64) -> Option<f64> {
    let nearest = x.round();
    ((x - nearest).abs() <= RATIO_TOLERANCE).then_some(nearest)
}

/// Check that `control` is a positive integer multiple of `physics` and
/// return that multiple (physics steps per control step).
///
/// # Errors
///
/// - [`ConfigError::NonPositiveTimestep`] if either value is NaN,
///   infinite, zero, or negative.
/// - [`ConfigError::NonIntegerRatio`] if the ratio is not within
///   [`RATIO_TOLERANCE`] of an integer ≥ 1.
///
/// # Examples
///
/// ```
/// use kinema_task::validate_timesteps;
///
/// assert_eq!(validate_timesteps(0.005, 0.025).unwrap(), 5);
/// assert!(validate_timesteps(0.002, 0.005).is_err());
/// ```
pub fn validate_timesteps(physics: f64, control: f64) -> Result<u32, ConfigError> {
    check_timestep("physics_timestep", physics)?;
    check_timestep("control_timestep", control)?;
    let ratio = control / physics;
    match snap(ratio) {
        Some(n) if n >= 1.0 && n <= f64::from(u32::MAX) => Ok(n as u32),
        _ => Err(ConfigError::NonIntegerRatio {
            physics_timestep: physics,
            control_timestep: control,
            ratio,
        }),
    }
}

/// Episode duration in simulated time.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum TimeLimit {
    /// Episodes end only when the task terminates them.
    #[default]
    Unbounded,
    /// Episodes are truncated after this many simulated seconds.
    Seconds(f64),
}

impl TimeLimit {
    /// The number of control steps this limit allows, or `None` when
    /// unbounded. A limit that is not a whole number of control steps
    /// rounds up. `Seconds(f64::INFINITY)` counts as unbounded.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidTimeLimit`] for NaN, zero, or negative
    /// seconds.
    pub fn step_limit(self, control_timestep: f64) -> Result<Option<u64>, ConfigError> {
        match self {
            TimeLimit::Unbounded => Ok(None),
            TimeLimit::Seconds(s) if s == f64::INFINITY => Ok(None),
            TimeLimit::Seconds(s) if s.is_finite() && s > 0.0 => {
                let steps = s / control_timestep;
                let steps = snap(steps).unwrap_or_else(|| steps.ceil());
                Ok(Some(steps.max(1.0) as u64))
            }
            TimeLimit::Seconds(value) => Err(ConfigError::InvalidTimeLimit { value }),
        }
    }
}

/// The timing half of an episode's configuration.
///
/// # Examples
///
/// ```
/// use kinema_task::{EpisodeConfig, TimeLimit};
///
/// let timing = EpisodeConfig {
///     physics_timestep: 0.005,
///     control_timestep: 0.025,
///     time_limit: TimeLimit::Seconds(1.0),
/// }
/// .validate()
/// .unwrap();
/// assert_eq!(timing.n_sub_steps, 5);
/// assert_eq!(timing.step_limit, Some(40));
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EpisodeConfig {
    /// Seconds advanced by one physics step.
    pub physics_timestep: f64,
    /// Seconds between agent actions.
    pub control_timestep: f64,
    /// Episode duration.
    pub time_limit: TimeLimit,
}

impl EpisodeConfig {
    /// Validate and derive integer step counts.
    ///
    /// # Errors
    ///
    /// Any error from [`validate_timesteps`] or
    /// [`TimeLimit::step_limit`].
    pub fn validate(&self) -> Result<Timing, ConfigError> {
        let n_sub_steps = validate_timesteps(self.physics_timestep, self.control_timestep)?;
        let step_limit = self.time_limit.step_limit(self.control_timestep)?;
        Ok(Timing {
            physics_timestep: self.physics_timestep,
            control_timestep: self.control_timestep,
            n_sub_steps,
            step_limit,
        })
    }
}

/// Validated episode timing. Episode length is counted in control steps,
/// never in accumulated floating-point time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Timing {
    /// Seconds advanced by one physics step.
    pub physics_timestep: f64,
    /// Seconds between agent actions.
    pub control_timestep: f64,
    /// Physics steps per control step.
    pub n_sub_steps: u32,
    /// Control steps per episode, if bounded.
    pub step_limit: Option<u64>,
}
