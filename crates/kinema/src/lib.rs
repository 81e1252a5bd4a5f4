//! Kinema: an episode execution controller for physics-based
//! reinforcement learning tasks.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Kinema sub-crates.
//!
//! # Quick start
//!
//! ```rust
//! use kinema::prelude::*;
//! use kinema::model::{Element, ElementKind, Model};
//!
//! fn height(_: &(), physics: &dyn PhysicsData) -> Result<f64, HookError> {
//!     Ok(physics.read_named(Category::Qpos, "slide")?[0])
//! }
//!
//! // One body on a vertical slide joint.
//! let mut model = Model::new("box");
//! let body = model.add(Element::named(ElementKind::Body, "body")).unwrap();
//! body.add(
//!     Element::named(ElementKind::Joint, "slide")
//!         .with("type", "slide")
//!         .with("axis", [0.0, 0.0, 1.0]),
//! )
//! .unwrap();
//! body.add(Element::named(ElementKind::Geom, "geom")).unwrap();
//!
//! let root = Entity::new(model)
//!     .with_observable(Observable::named("height", Category::Qpos, "slide"))
//!     .unwrap();
//! let task = TaskBuilder::new("drop", root, ())
//!     .physics_timestep(0.005)
//!     .control_timestep(0.025)
//!     .reward(height)
//!     .enable_observable("height")
//!     .build()
//!     .unwrap();
//!
//! let mut env = EpisodeController::new(task, Box::new(ReferenceBackend), TimeLimit::Seconds(1.0))
//!     .unwrap();
//! let mut ts = env.reset().unwrap();
//! let mut steps = 0;
//! while !ts.is_last() {
//!     ts = env.step(&[]).unwrap();
//!     steps += 1;
//! }
//! assert_eq!(steps, 40);
//! // The body fell under gravity.
//! assert!(ts.observation.get("height").unwrap()[0] < 0.0);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `kinema-core` | Phases, named categories, errors, action spec |
//! | [`model`] | `kinema-model` | Model trees, namespacing, attachment |
//! | [`physics`] | `kinema-physics` | Backend traits and the reference backend |
//! | [`obs`] | `kinema-obs` | Observables and ordered observations |
//! | [`task`] | `kinema-task` | Tasks, entities, timing, the hook sequencer |
//! | [`engine`] | `kinema-engine` | Episode controller, registry, rollouts |
//! | [`suite`] | `kinema-suite` | Pendulum and reach-target tasks, shaping |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Phases, named-access categories, errors, and the action spec
/// (`kinema-core`).
pub use kinema_core as types;

/// Model element trees and namespaced attachment (`kinema-model`).
pub use kinema_model as model;

/// Physics backend traits and [`physics::ReferenceBackend`]
/// (`kinema-physics`).
pub use kinema_physics as physics;

/// Observables and observations (`kinema-obs`).
pub use kinema_obs as obs;

/// Tasks, entities, timestep validation, and the lifecycle hook
/// sequencer (`kinema-task`).
pub use kinema_task as task;

/// The episode controller, environment registry, and rollouts
/// (`kinema-engine`).
///
/// [`engine::EpisodeController`] drives episodes;
/// [`engine::TaskRegistry`] loads them by name.
pub use kinema_engine as engine;

/// Example tasks and reward shaping (`kinema-suite`).
pub use kinema_suite as suite;

/// Common imports for typical Kinema usage.
///
/// ```rust
/// use kinema::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use kinema_core::{ActionSpec, Category, EpisodeId, HookKind, Phase, Value};

    // Errors
    pub use kinema_core::{
        CompositionError, ConfigError, HookError, ObsError, PhysicsError, StepError,
    };

    // Physics
    pub use kinema_physics::{Physics, PhysicsBackend, PhysicsData, ReferenceBackend};

    // Observation
    pub use kinema_obs::{Observable, Observation, ObservationSpec};

    // Tasks
    pub use kinema_task::{
        Entity, EntityHooks, Task, TaskBuilder, TaskRng, Termination, TimeLimit,
    };

    // Engine
    pub use kinema_engine::{
        EpisodeController, Environment, LoadOptions, Policy, RandomPolicy, StepType,
        TaskRegistry, TimeStep,
    };
}
