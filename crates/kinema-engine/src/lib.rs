//! Episode execution for Kinema tasks.
//!
//! Provides the [`EpisodeController`] that drives a task's episodes
//! through reset and step, counting control steps against the time limit,
//! plus the object-safe [`Environment`] trait, an explicit
//! [`TaskRegistry`] of environment factories, and rollout helpers that
//! replicate environments across worker threads.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod controller;
pub mod environment;
pub mod metrics;
pub mod registry;
pub mod rollout;
pub mod timestep;

pub use controller::{EpisodeController, EpisodeState};
pub use environment::Environment;
pub use metrics::StepMetrics;
pub use registry::{EnvFactory, LoadOptions, RegistryError, TaskRegistry};
pub use rollout::{
    parallel_rollouts, run_episode, EpisodeSummary, Policy, RandomPolicy, RolloutError,
};
pub use timestep::{StepType, TimeStep};
