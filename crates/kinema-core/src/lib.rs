//! Core types and traits for the Kinema episode framework.
//!
//! This is the leaf crate with no internal dependencies. It defines the
//! vocabulary shared by every other crate in the workspace: episode IDs,
//! the lifecycle [`Phase`] machine, named physics access categories,
//! action specs, and the error taxonomy.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod id;
pub mod named;
pub mod phase;
pub mod spec;

pub use error::{
    CompositionError, ConfigError, HookError, ObsError, PhysicsError, StepError,
};
pub use id::EpisodeId;
pub use named::{Category, Value};
pub use phase::{HookKind, Phase};
pub use spec::ActionSpec;
