//! Pendulum balance and swing-up (Suite style).
//!
//! A single pole on a hinge, driven by one torque motor. The task builds
//! its observation directly and never edits the model, so the compiled
//! physics is reused across episodes.

use kinema_core::{Category, CompositionError, ConfigError, HookError};
use kinema_engine::{EpisodeController, LoadOptions};
use kinema_model::{Element, ElementKind, Model};
use kinema_obs::Observation;
use kinema_physics::{PhysicsData, ReferenceBackend};
use kinema_task::{Entity, Task, TaskBuilder, TaskRng, TimeLimit};
use rand::Rng;
use smallvec::smallvec;

use crate::noise::standard_normal;
use crate::shaping::{tolerance, Sigmoid, Tolerance};

/// Physics and control timestep, in seconds. One sub-step per action.
pub const TIMESTEP: f64 = 0.02;

/// `cos(angle)` above which the pole counts as upright for the sparse
/// reward.
pub const UPRIGHT_COSINE: f64 = 0.995;

/// Angular speed below which the pole counts as still for the sparse
/// reward, in rad/s.
pub const STILL_VELOCITY: f64 = 0.5;

/// Which pendulum task to build.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Variant {
    /// Start near upright; smooth reward.
    Balance,
    /// Start hanging down; smooth reward.
    Swingup,
    /// Start hanging down; reward only when upright and still.
    SwingupSparse,
}

impl Variant {
    /// Registry name.
    pub fn name(self) -> &'static str {
        match self {
            Variant::Balance => "pendulum/balance",
            Variant::Swingup => "pendulum/swingup",
            Variant::SwingupSparse => "pendulum/swingup_sparse",
        }
    }

    /// Whether episodes start with the pole hanging down.
    pub fn swing_up(self) -> bool {
        !matches!(self, Variant::Balance)
    }

    /// Whether the reward is the binary upright-and-still indicator.
    pub fn sparse(self) -> bool {
        matches!(self, Variant::SwingupSparse)
    }

    /// 10 s for balance, 20 s for the swing-up variants.
    pub fn default_time_limit(self) -> TimeLimit {
        match self {
            Variant::Balance => TimeLimit::Seconds(10.0),
            Variant::Swingup | Variant::SwingupSparse => TimeLimit::Seconds(20.0),
        }
    }
}

/// Task state: just the variant.
#[derive(Clone, Copy, Debug)]
pub struct Pendulum {
    variant: Variant,
}

impl Pendulum {
    /// The variant this task was built for.
    pub fn variant(&self) -> Variant {
        self.variant
    }
}

/// The pendulum model: pole `pole` pivoting on hinge `hinge` (y axis)
/// 1 m above the floor, tip geom `tip` 0.5 m from the pivot, motor
/// `torque` with control range ±1.
///
/// # Errors
///
/// Only if the element tree is malformed, which would be a bug here.
pub fn model() -> Result<Model, CompositionError> {
    let mut m = Model::new("pendulum");
    m.add(Element::named(ElementKind::Light, "light").with("pos", [0.0, 0.0, 3.0]))?;
    m.add(
        Element::named(ElementKind::Geom, "floor")
            .with("type", "plane")
            .with("size", [2.0, 2.0, 0.1]),
    )?;
    let pole = m.add(Element::named(ElementKind::Body, "pole").with("pos", [0.0, 0.0, 1.0]))?;
    pole.add(
        Element::named(ElementKind::Joint, "hinge")
            .with("type", "hinge")
            .with("axis", [0.0, 1.0, 0.0])
            .with("damping", 0.1),
    )?;
    pole.add(
        Element::named(ElementKind::Geom, "pole_geom")
            .with("type", "capsule")
            .with("pos", [0.0, 0.0, 0.25])
            .with("mass", 0.1),
    )?;
    pole.add(
        Element::named(ElementKind::Geom, "tip")
            .with("type", "sphere")
            .with("pos", [0.0, 0.0, 0.5])
            .with("mass", 1.0),
    )?;
    m.add(
        Element::named(ElementKind::Motor, "torque")
            .with("joint", "hinge")
            .with("gear", 1.0)
            .with("ctrlrange", [-1.0, 1.0]),
    )?;
    Ok(m)
}

// ── Physics accessors ───────────────────────────────────────────

fn angle(physics: &dyn PhysicsData) -> Result<f64, HookError> {
    Ok(physics.read_named(Category::Qpos, "hinge")?[0])
}

fn angular_velocity(physics: &dyn PhysicsData) -> Result<f64, HookError> {
    Ok(physics.read_named(Category::Qvel, "hinge")?[0])
}

fn tip_height(physics: &dyn PhysicsData) -> Result<f64, HookError> {
    Ok(physics.read_named(Category::GeomXpos, "tip")?[2])
}

// ── Hooks ───────────────────────────────────────────────────────

fn initialize_episode(
    state: &mut Pendulum,
    physics: &mut dyn PhysicsData,
    rng: &mut TaskRng,
) -> Result<(), HookError> {
    let qpos = if state.variant.swing_up() {
        std::f64::consts::PI + 0.01 * standard_normal(rng)
    } else {
        rng.random_range(-0.1..0.1)
    };
    physics.write_named(Category::Qpos, "hinge", &[qpos])?;
    physics.write_named(Category::Qvel, "hinge", &[0.01 * standard_normal(rng)])?;
    Ok(())
}

fn observation(_: &Pendulum, physics: &dyn PhysicsData) -> Result<Observation, HookError> {
    let theta = angle(physics)?;
    let mut obs = Observation::new();
    obs.insert("angle_cos", smallvec![theta.cos()]);
    obs.insert("angle_sin", smallvec![theta.sin()]);
    obs.insert("velocity", smallvec![angular_velocity(physics)?]);
    obs.insert("tip_height", smallvec![tip_height(physics)?]);
    Ok(obs)
}

fn reward(state: &Pendulum, physics: &dyn PhysicsData) -> Result<f64, HookError> {
    let cos = angle(physics)?.cos();
    let omega = angular_velocity(physics)?;
    if state.variant.sparse() {
        let upright = f64::from(u8::from(cos > UPRIGHT_COSINE));
        let still = f64::from(u8::from(omega.abs() < STILL_VELOCITY));
        return Ok(upright * still);
    }

    let ctrl = physics
        .control()
        .first()
        .copied()
        .ok_or_else(|| HookError::failed("pendulum has no actuator"))?;
    let upright = (cos + 1.0) / 2.0;
    let centered = tolerance(
        cos,
        &Tolerance::within(0.99, 1.0).falloff(1.0, Sigmoid::Linear, 0.0),
    )?;
    let small = Tolerance::default().falloff(5.0, Sigmoid::Quadratic, 0.0);
    let small_velocity = tolerance(omega, &small)?;
    let small_control = tolerance(ctrl, &small)?;
    Ok(upright * (1.0 + centered + small_velocity + small_control) / 4.0)
}

// ── Construction ────────────────────────────────────────────────

/// Build the task for `variant`, seeded with `seed` if given.
///
/// # Errors
///
/// [`ConfigError`] from model construction or task validation.
pub fn task(variant: Variant, seed: Option<u64>) -> Result<Task<Pendulum>, ConfigError> {
    let root = Entity::walker(model()?, &["torque"], &["hinge"])?;
    let mut builder = TaskBuilder::new(variant.name(), root, Pendulum { variant })
        .physics_timestep(TIMESTEP)
        .control_timestep(TIMESTEP)
        .initialize_episode(initialize_episode)
        .observation(observation)
        .reward(reward);
    if let Some(seed) = seed {
        builder = builder.seed(seed);
    }
    builder.build()
}

/// A ready environment for `variant` on the reference backend.
///
/// # Errors
///
/// As for [`task`], plus an invalid time limit in `options`.
pub fn environment(
    variant: Variant,
    options: &LoadOptions,
) -> Result<EpisodeController<Pendulum>, ConfigError> {
    EpisodeController::new(
        task(variant, options.seed)?,
        Box::new(ReferenceBackend),
        options
            .time_limit
            .unwrap_or_else(|| variant.default_time_limit()),
    )
}
