//! Tasks and the episode lifecycle sequencer for Kinema.
//!
//! - [`timing`]: control/physics timestep validation and step limits.
//! - [`entity`]: composable model units with namespaced observables and
//!   per-entity hooks.
//! - [`task`]: the [`Task`] capability record and its validating
//!   [`TaskBuilder`].
//! - [`sequencer`]: the [`HookSequencer`], which owns the compiled
//!   physics and drives hooks around it through the
//!   [`Phase`](kinema_core::Phase) machine.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod entity;
pub mod sequencer;
pub mod task;
pub mod timing;

pub use entity::{Entity, EntityHooks, EntityInitFn, EntityModifyFn};
pub use sequencer::{HookSequencer, StepReport};
pub use task::{
    AfterStepFn, BeforeStepFn, HookFlags, Hooks, InitializeEpisodeFn, ModifyModelFn,
    ObservationFn, RewardFn, Task, TaskBuilder, TaskRng, TaskStyle, Termination, TerminationFn,
};
pub use timing::{validate_timesteps, EpisodeConfig, TimeLimit, Timing, RATIO_TOLERANCE};
