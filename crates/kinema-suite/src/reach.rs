//! Reach a target (Composer style).
//!
//! A point-mass walker slides on the floor of a walled arena towards a
//! target site. The target moves every episode, so the model is edited
//! and recompiled at each reset; the walker scatters itself around the
//! spawn site through its own entity hook.

use std::f64::consts::TAU;

use kinema_core::{Category, CompositionError, ConfigError, HookError};
use kinema_engine::{EpisodeController, LoadOptions};
use kinema_model::{Element, ElementKind, Model, Namespace};
use kinema_obs::Observable;
use kinema_physics::{PhysicsData, ReferenceBackend};
use kinema_task::{Entity, EntityHooks, Task, TaskBuilder, TaskRng, Termination, TimeLimit};
use rand::Rng;

use crate::shaping::{tolerance, Sigmoid, Tolerance};

/// Registry name.
pub const NAME: &str = "reach/target";

/// Half-width of the arena floor, in metres.
pub const ARENA_SIZE: f64 = 10.0;

/// Initial target distance, also the reward's fall-off margin.
pub const DEFAULT_TARGET_DISTANCE: f64 = 5.0;

/// Planar distance under which the target counts as reached.
pub const REACH_RADIUS: f64 = 0.5;

/// Height of the target marker above the floor.
const TARGET_HEIGHT: f64 = 0.3;

/// Physics timestep, in seconds.
pub const PHYSICS_TIMESTEP: f64 = 0.005;

/// Control timestep, in seconds (five physics steps).
pub const CONTROL_TIMESTEP: f64 = 0.025;

// ── Entities ────────────────────────────────────────────────────

/// A floor of half-width `size`, four boundary walls, a light, and a
/// `spawn` site at the origin.
///
/// # Errors
///
/// Only if the element tree is malformed.
pub fn simple_arena(size: f64) -> Result<Entity, ConfigError> {
    let mut m = Model::new("simple_arena");
    m.add(Element::named(ElementKind::Light, "light").with("pos", [0.0, 0.0, 4.0]))?;
    m.add(
        Element::named(ElementKind::Geom, "floor")
            .with("type", "plane")
            .with("size", [size, size, 0.1]),
    )?;
    let walls = [
        ([size, 0.0], [0.1, size]),
        ([-size, 0.0], [0.1, size]),
        ([0.0, size], [size, 0.1]),
        ([0.0, -size], [size, 0.1]),
    ];
    for (i, ([x, y], [sx, sy])) in walls.into_iter().enumerate() {
        m.add(
            Element::named(ElementKind::Geom, format!("wall_{i}"))
                .with("type", "box")
                .with("pos", [x, y, 0.5])
                .with("size", [sx, sy, 0.5]),
        )?;
    }
    m.add(Element::named(ElementKind::Site, "spawn").with("pos", [0.0, 0.0, 0.0]))?;
    Ok(Entity::new(m))
}

fn walker_model() -> Result<Model, CompositionError> {
    let mut m = Model::new("simple_walker");
    let body = m.add(
        Element::named(ElementKind::Body, "walker_body").with("pos", [0.0, 0.0, 0.5]),
    )?;
    for (joint, axis) in [("slide_x", [1.0, 0.0, 0.0]), ("slide_y", [0.0, 1.0, 0.0])] {
        body.add(
            Element::named(ElementKind::Joint, joint)
                .with("type", "slide")
                .with("axis", axis)
                .with("damping", 0.5),
        )?;
    }
    body.add(
        Element::named(ElementKind::Geom, "body_geom")
            .with("type", "sphere")
            .with("size", [0.2])
            .with("mass", 1.0),
    )?;
    for (motor, joint) in [("move_x", "slide_x"), ("move_y", "slide_y")] {
        m.add(
            Element::named(ElementKind::Motor, motor)
                .with("joint", joint)
                .with("gear", 5.0)
                .with("ctrlrange", [-10.0, 10.0]),
        )?;
    }
    Ok(m)
}

/// Offset the walker by up to 0.5 m along each axis.
fn scatter_walker(
    ns: &Namespace,
    physics: &mut dyn PhysicsData,
    rng: &mut TaskRng,
) -> Result<(), HookError> {
    for joint in ["slide_x", "slide_y"] {
        let offset = rng.random_range(-0.5..0.5);
        physics.write_named(Category::Qpos, &ns.qualify(joint), &[offset])?;
    }
    Ok(())
}

/// A sphere on two slide joints with one motor per axis.
///
/// Declares observables `position` and `velocity` of `walker_body`,
/// both disabled until a task enables them.
///
/// # Errors
///
/// Only if the element tree is malformed.
pub fn simple_walker() -> Result<Entity, ConfigError> {
    Ok(
        Entity::walker(walker_model()?, &["move_x", "move_y"], &["slide_x", "slide_y"])?
            .with_observable(Observable::named("position", Category::Xpos, "walker_body"))?
            // Linear velocity only: `Xvel` is the body origin's world-frame
            // point velocity, three components with no angular half.
            .with_observable(Observable::named("velocity", Category::Xvel, "walker_body"))?
            .with_hooks(EntityHooks {
                modify_model: None,
                initialize_episode: Some(scatter_walker),
            }),
    )
}

// ── Task ────────────────────────────────────────────────────────

/// Task state.
#[derive(Clone, Debug)]
pub struct ReachTarget {
    target_distance: f64,
    target: [f64; 2],
    walker_body: String,
}

impl ReachTarget {
    /// Planar position of the current target.
    pub fn target(&self) -> [f64; 2] {
        self.target
    }

    /// Reward fall-off margin.
    pub fn target_distance(&self) -> f64 {
        self.target_distance
    }

    fn distance(&self, physics: &dyn PhysicsData) -> Result<f64, HookError> {
        let pos = physics.read_named(Category::Xpos, &self.walker_body)?;
        Ok((pos[0] - self.target[0]).hypot(pos[1] - self.target[1]))
    }
}

fn place_target(
    state: &mut ReachTarget,
    model: &mut Model,
    rng: &mut TaskRng,
) -> Result<(), HookError> {
    let angle = rng.random_range(0.0..TAU);
    let distance = rng.random_range(3.0..7.0);
    state.target = [distance * angle.cos(), distance * angle.sin()];
    model
        .require_mut("target")?
        .set("pos", [state.target[0], state.target[1], TARGET_HEIGHT]);
    Ok(())
}

fn reward(state: &ReachTarget, physics: &dyn PhysicsData) -> Result<f64, HookError> {
    let shape = Tolerance::within(0.0, REACH_RADIUS).falloff(
        state.target_distance,
        Sigmoid::Linear,
        0.0,
    );
    Ok(tolerance(state.distance(physics)?, &shape)?)
}

fn termination(state: &ReachTarget, physics: &dyn PhysicsData) -> Result<Termination, HookError> {
    if state.distance(physics)? < REACH_RADIUS {
        Ok(Termination::Terminal { discount: 1.0 })
    } else {
        Ok(Termination::Continue)
    }
}

/// Build the task: a [`simple_walker`] attached at the spawn site of a
/// [`simple_arena`], with a `target` site starting `target_distance`
/// along x.
///
/// # Errors
///
/// [`ConfigError`] from model construction or task validation.
pub fn task(target_distance: f64, seed: Option<u64>) -> Result<Task<ReachTarget>, ConfigError> {
    let mut arena = simple_arena(ARENA_SIZE)?;
    arena.model_mut().add(
        Element::named(ElementKind::Site, "target")
            .with("pos", [target_distance, 0.0, TARGET_HEIGHT]),
    )?;
    let walker = arena.attach("spawn", &simple_walker()?)?;
    let state = ReachTarget {
        target_distance,
        target: [target_distance, 0.0],
        walker_body: walker.qualify("walker_body"),
    };
    let mut builder = TaskBuilder::new(NAME, arena, state)
        .physics_timestep(PHYSICS_TIMESTEP)
        .control_timestep(CONTROL_TIMESTEP)
        .modify_model(place_target)
        .reward(reward)
        .termination(termination)
        .enable_observable(walker.qualify("position"))
        .enable_observable(walker.qualify("velocity"));
    if let Some(seed) = seed {
        builder = builder.seed(seed);
    }
    builder.build()
}

/// A ready environment on the reference backend. The default time limit
/// is 20 s.
///
/// # Errors
///
/// As for [`task`], plus an invalid time limit in `options`.
pub fn environment(options: &LoadOptions) -> Result<EpisodeController<ReachTarget>, ConfigError> {
    EpisodeController::new(
        task(DEFAULT_TARGET_DISTANCE, options.seed)?,
        Box::new(ReferenceBackend),
        options.time_limit.unwrap_or(TimeLimit::Seconds(20.0)),
    )
}
