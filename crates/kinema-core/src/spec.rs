//! Action specification.

/// Shape and bounds of the action vector a task accepts.
///
/// One entry per actuator, in compiled-model order. Unbounded actuators
/// report `f64::NEG_INFINITY` / `f64::INFINITY`.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct ActionSpec {
    /// Actuator names, one per action component.
    pub names: Vec<String>,
    /// Lower bound per component.
    pub minimum: Vec<f64>,
    /// Upper bound per component.
    pub maximum: Vec<f64>,
}

impl ActionSpec {
    /// Number of action components.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the task takes no actions.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Whether every component of `action` lies within bounds.
    ///
    /// Returns `false` on a length mismatch.
    pub fn contains(&self, action: &[f64]) -> bool {
        action.len() == self.len()
            && action
                .iter()
                .zip(self.minimum.iter().zip(&self.maximum))
                .all(|(&a, (&lo, &hi))| a >= lo && a <= hi)
    }
}
