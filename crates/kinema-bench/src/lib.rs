//! Benchmark profiles for the Kinema episode controller.
//!
//! - [`slider_profile`]: a one-joint task with trivial dynamics,
//!   dominated by controller and hook overhead
//! - [`balance_profile`]: pendulum balance on the reference backend
//!   (physics reused across episodes)
//! - [`reach_profile`]: reach-target on the reference backend (model
//!   edited and recompiled every episode)

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use kinema_core::{Category, HookError};
use kinema_engine::{EpisodeController, LoadOptions};
use kinema_obs::Observable;
use kinema_physics::{PhysicsData, ReferenceBackend};
use kinema_suite::pendulum::{self, Pendulum, Variant};
use kinema_suite::reach::{self, ReachTarget};
use kinema_task::{Entity, TaskBuilder, TimeLimit};
use kinema_test_utils::fixtures;

fn position(_: &(), physics: &dyn PhysicsData) -> Result<f64, HookError> {
    Ok(physics.read_named(Category::Qpos, "slide")?[0])
}

/// Slider task: physics 0.005 s, control 0.025 s, `seconds` per
/// episode, two enabled observables.
pub fn slider_profile(seconds: f64) -> EpisodeController<()> {
    let root = Entity::new(fixtures::slider_model("slider"))
        .with_observable(Observable::named("position", Category::Qpos, "slide"))
        .unwrap()
        .with_observable(Observable::named("velocity", Category::Qvel, "slide"))
        .unwrap();
    let task = TaskBuilder::new("bench/slider", root, ())
        .physics_timestep(0.005)
        .control_timestep(0.025)
        .reward(position)
        .enable_observable("position")
        .enable_observable("velocity")
        .build()
        .unwrap();
    EpisodeController::new(
        task,
        Box::new(ReferenceBackend),
        TimeLimit::Seconds(seconds),
    )
    .unwrap()
}

fn options(seed: u64, seconds: f64) -> LoadOptions {
    LoadOptions {
        seed: Some(seed),
        time_limit: Some(TimeLimit::Seconds(seconds)),
    }
}

/// Pendulum balance with `seconds` per episode.
pub fn balance_profile(seed: u64, seconds: f64) -> EpisodeController<Pendulum> {
    pendulum::environment(Variant::Balance, &options(seed, seconds)).unwrap()
}

/// Reach-target with `seconds` per episode.
pub fn reach_profile(seed: u64, seconds: f64) -> EpisodeController<ReachTarget> {
    reach::environment(&options(seed, seconds)).unwrap()
}
