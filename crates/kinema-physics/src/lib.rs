//! Physics backend interface for Kinema.
//!
//! The episode machinery only ever talks to physics through three traits:
//!
//! - [`PhysicsBackend`] compiles a [`Model`](kinema_model::Model) into
//!   runnable physics.
//! - [`PhysicsData`] is named read/write access to state. Hooks receive
//!   `&mut dyn PhysicsData`, which cannot step.
//! - [`Physics`] adds stepping and reset; only the sequencer holds one.
//!
//! [`ReferenceBackend`] is a small deterministic joint-space integrator
//! used by the example tasks and tests. It has no contacts and treats
//! each joint's dynamics independently.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod layout;
pub mod reference;
pub mod traits;

pub use reference::{ReferenceBackend, ReferencePhysics, GRAVITY};
pub use traits::{Physics, PhysicsBackend, PhysicsData};
