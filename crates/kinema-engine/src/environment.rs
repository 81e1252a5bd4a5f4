//! The object-safe environment interface.

use kinema_core::{ActionSpec, StepError};
use kinema_obs::ObservationSpec;

use crate::controller::EpisodeController;
use crate::timestep::TimeStep;

/// A resettable, steppable episode source with erased task state.
///
/// Registry factories return `Box<dyn Environment>` so tasks with
/// different state types can be loaded by name. Implementations must be
/// [`Send`] so each rollout worker can own one; they need not be `Sync`.
pub trait Environment: Send {
    /// Human-readable task name.
    fn name(&self) -> &str;

    /// Start a new episode.
    ///
    /// # Errors
    ///
    /// As for [`EpisodeController::reset`].
    fn reset(&mut self) -> Result<TimeStep, StepError>;

    /// Reseed, then start a new episode.
    ///
    /// # Errors
    ///
    /// As for [`EpisodeController::reset`].
    fn reset_with_seed(&mut self, seed: u64) -> Result<TimeStep, StepError>;

    /// Advance one control step.
    ///
    /// # Errors
    ///
    /// As for [`EpisodeController::step`].
    fn step(&mut self, action: &[f64]) -> Result<TimeStep, StepError>;

    /// Actuator names and bounds.
    fn action_spec(&self) -> &ActionSpec;

    /// Observation names and dimensions.
    ///
    /// # Errors
    ///
    /// As for [`EpisodeController::observation_spec`].
    fn observation_spec(&self) -> Result<ObservationSpec, StepError>;
}

impl<S: Send> Environment for EpisodeController<S> {
    fn name(&self) -> &str {
        self.task().name()
    }

    fn reset(&mut self) -> Result<TimeStep, StepError> {
        EpisodeController::reset(self)
    }

    fn reset_with_seed(&mut self, seed: u64) -> Result<TimeStep, StepError> {
        EpisodeController::reset_with_seed(self, seed)
    }

    fn step(&mut self, action: &[f64]) -> Result<TimeStep, StepError> {
        EpisodeController::step(self, action)
    }

    fn action_spec(&self) -> &ActionSpec {
        EpisodeController::action_spec(self)
    }

    fn observation_spec(&self) -> Result<ObservationSpec, StepError> {
        EpisodeController::observation_spec(self)
    }
}
