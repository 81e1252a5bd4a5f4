//! Time steps returned by reset and step.

use kinema_obs::Observation;

/// Position of a time step within its episode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StepType {
    /// Returned by reset. Carries no reward or discount.
    First,
    /// Any step that is neither first nor last.
    Mid,
    /// The final step, by termination or time limit.
    Last,
}

/// One environment transition.
///
/// `reward` and `discount` are `None` on the first step and `Some` on
/// every other.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeStep {
    /// First, mid, or last.
    pub step_type: StepType,
    /// Reward for the transition into this step.
    pub reward: Option<f64>,
    /// Discount for the transition into this step. `1.0` on truncation
    /// by time limit; the task's discount on termination.
    pub discount: Option<f64>,
    /// Observation of the state this step lands in.
    pub observation: Observation,
}

impl TimeStep {
    /// The step returned by reset.
    pub fn first(observation: Observation) -> Self {
        Self {
            step_type: StepType::First,
            reward: None,
            discount: None,
            observation,
        }
    }

    /// Whether this step starts an episode.
    pub fn is_first(&self) -> bool {
        self.step_type == StepType::First
    }

    /// Whether this step is mid-episode.
    pub fn is_mid(&self) -> bool {
        self.step_type == StepType::Mid
    }

    /// Whether this step ends an episode.
    pub fn is_last(&self) -> bool {
        self.step_type == StepType::Last
    }
}
