//! The physics stepper interface.

use kinema_core::{ActionSpec, Category, CompositionError, PhysicsError, Value};
use kinema_model::Model;

/// Named access to compiled physics state.
///
/// This is what hooks and observables see. It deliberately has no
/// stepping method: only the episode sequencer advances simulated time.
pub trait PhysicsData: Send {
    /// Simulated time in seconds since the last reset.
    fn time(&self) -> f64;

    /// The physics timestep this data was compiled with.
    fn timestep(&self) -> f64;

    /// Read a named quantity.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::UnknownName`] if no element of the category's
    /// kind has this name.
    fn read_named(&self, category: Category, name: &str) -> Result<Value, PhysicsError>;

    /// Overwrite a named quantity. Derived quantities are recomputed
    /// before this returns.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::ReadOnly`] for derived categories,
    /// [`PhysicsError::UnknownName`], or [`PhysicsError::ShapeMismatch`].
    fn write_named(
        &mut self,
        category: Category,
        name: &str,
        value: &[f64],
    ) -> Result<(), PhysicsError>;

    /// Set the whole control vector, one entry per actuator in
    /// declaration order.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::ActionShape`] if the length does not match.
    fn set_control(&mut self, ctrl: &[f64]) -> Result<(), PhysicsError>;

    /// The current control vector.
    fn control(&self) -> &[f64];

    /// Actuator names and control bounds.
    fn action_spec(&self) -> &ActionSpec;
}

/// Compiled, steppable physics.
pub trait Physics: PhysicsData {
    /// Advance simulated time by one physics timestep.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::Diverged`] if the state became non-finite.
    fn step(&mut self) -> Result<(), PhysicsError>;

    /// Restore the compiled initial state: zero positions, velocities,
    /// and controls at time zero.
    fn reset(&mut self);

    /// View as hook-facing data.
    fn as_data(&self) -> &dyn PhysicsData;

    /// Mutable view as hook-facing data.
    fn as_data_mut(&mut self) -> &mut dyn PhysicsData;
}

/// Compiles models into [`Physics`] instances.
///
/// Backends must be `Send` so a controller can move to a worker thread.
/// Each compile produces an independent instance; nothing is shared.
pub trait PhysicsBackend: Send {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Compile a validated model.
    ///
    /// # Errors
    ///
    /// Any [`CompositionError`] from validation, or from attributes the
    /// backend cannot interpret.
    fn compile(&self, model: &Model, timestep: f64) -> Result<Box<dyn Physics>, CompositionError>;
}
