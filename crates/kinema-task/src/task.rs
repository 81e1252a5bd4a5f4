//! The task capability record and its builder.
//!
//! A task is a root [`Entity`] plus task state `S` plus a [`Hooks`]
//! record of plain function pointers over `S`. Which hooks are present
//! is fixed at construction and summarized once in [`HookFlags`].

use std::fmt;

use kinema_core::{ConfigError, HookError, HookKind};
use kinema_model::Model;
use kinema_obs::Observation;
use kinema_physics::PhysicsData;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::entity::Entity;
use crate::timing::validate_timesteps;

/// The task-owned random source. Seeded once at construction and
/// optionally reseeded between episodes; hooks draw only from it.
pub type TaskRng = ChaCha8Rng;

/// Task hook: structural edits on a fresh copy of the root model.
pub type ModifyModelFn<S> = fn(&mut S, &mut Model, &mut TaskRng) -> Result<(), HookError>;

/// Task hook: dynamic initial state on freshly compiled or reset physics.
pub type InitializeEpisodeFn<S> =
    fn(&mut S, &mut dyn PhysicsData, &mut TaskRng) -> Result<(), HookError>;

/// Task hook: translate the agent's action before physics sub-steps.
pub type BeforeStepFn<S> =
    fn(&mut S, &mut dyn PhysicsData, &[f64], &mut TaskRng) -> Result<(), HookError>;

/// Task hook: bookkeeping after physics sub-steps.
pub type AfterStepFn<S> = fn(&mut S, &mut dyn PhysicsData, &mut TaskRng) -> Result<(), HookError>;

/// Task hook: the reward for the step just taken.
pub type RewardFn<S> = fn(&S, &dyn PhysicsData) -> Result<f64, HookError>;

/// Task hook: whether the episode ends after the step just taken.
pub type TerminationFn<S> = fn(&S, &dyn PhysicsData) -> Result<Termination, HookError>;

/// Task hook: build the observation directly (Suite-style tasks).
pub type ObservationFn<S> = fn(&S, &dyn PhysicsData) -> Result<Observation, HookError>;

/// Outcome of the termination check.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Termination {
    /// Keep going.
    #[default]
    Continue,
    /// End the episode with this final discount (0.0 for a true
    /// terminal state).
    Terminal {
        /// Discount reported on the final time step.
        discount: f64,
    },
}

impl Termination {
    /// Whether the episode ends.
    pub fn is_terminal(self) -> bool {
        matches!(self, Termination::Terminal { .. })
    }
}

/// The hooks a task supplies. Only `reward` is required.
pub struct Hooks<S> {
    /// Per-episode structural edits.
    pub modify_model: Option<ModifyModelFn<S>>,
    /// Per-episode initial state.
    pub initialize_episode: Option<InitializeEpisodeFn<S>>,
    /// Action translation. Without it the action is written to the
    /// actuators as-is.
    pub before_step: Option<BeforeStepFn<S>>,
    /// Post-step bookkeeping.
    pub after_step: Option<AfterStepFn<S>>,
    /// Reward. Required.
    pub reward: Option<RewardFn<S>>,
    /// Termination. Without it episodes end only at the time limit.
    pub termination: Option<TerminationFn<S>>,
    /// Direct observation. Present makes the task Suite-style; absent,
    /// observations come from the root entity's observables.
    pub observation: Option<ObservationFn<S>>,
}

// Manual impls: derives would require `S: Clone` / `S: Default`.
impl<S> Clone for Hooks<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for Hooks<S> {}

impl<S> Default for Hooks<S> {
    fn default() -> Self {
        Self {
            modify_model: None,
            initialize_episode: None,
            before_step: None,
            after_step: None,
            reward: None,
            termination: None,
            observation: None,
        }
    }
}

impl<S> fmt::Debug for Hooks<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("modify_model", &self.modify_model.is_some())
            .field("initialize_episode", &self.initialize_episode.is_some())
            .field("before_step", &self.before_step.is_some())
            .field("after_step", &self.after_step.is_some())
            .field("reward", &self.reward.is_some())
            .field("termination", &self.termination.is_some())
            .field("observation", &self.observation.is_some())
            .finish()
    }
}

/// How a task produces observations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskStyle {
    /// A fixed model; the task builds observations itself.
    Suite,
    /// Composed entities; observations come from enabled observables.
    Composer,
}

/// Which hooks exist anywhere in the task, computed once at build.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HookFlags {
    /// The task or any entity modifies the model per episode. When
    /// false, the compiled model is reused across episodes.
    pub has_model_hooks: bool,
    /// The task or any entity initializes episodes. When false, the
    /// per-episode initialization pass is skipped.
    pub has_init_hooks: bool,
}

impl HookFlags {
    fn compute<S>(hooks: &Hooks<S>, root: &Entity) -> Self {
        Self {
            has_model_hooks: hooks.modify_model.is_some() || root.has_model_hooks(),
            has_init_hooks: hooks.initialize_episode.is_some() || root.has_init_hooks(),
        }
    }
}

/// A validated task. Build with [`TaskBuilder`].
pub struct Task<S> {
    pub(crate) name: String,
    pub(crate) root: Entity,
    pub(crate) state: S,
    pub(crate) hooks: Hooks<S>,
    pub(crate) reward: RewardFn<S>,
    pub(crate) flags: HookFlags,
    pub(crate) style: TaskStyle,
    pub(crate) rng: TaskRng,
    pub(crate) seed: u64,
    pub(crate) physics_timestep: f64,
    pub(crate) control_timestep: f64,
    pub(crate) n_sub_steps: u32,
}

impl<S> Task<S> {
    /// The task's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The root entity holding the pristine model.
    pub fn root(&self) -> &Entity {
        &self.root
    }

    /// Task state.
    pub fn state(&self) -> &S {
        &self.state
    }

    /// The supplied hooks. The reward hook moves out at build, so
    /// `hooks().reward` is always `None`; see [`Task::reward`].
    pub fn hooks(&self) -> &Hooks<S> {
        &self.hooks
    }

    /// The reward hook.
    pub fn reward(&self) -> RewardFn<S> {
        self.reward
    }

    /// Which hooks exist.
    pub fn flags(&self) -> HookFlags {
        self.flags
    }

    /// Suite or Composer.
    pub fn style(&self) -> TaskStyle {
        self.style
    }

    /// The seed the RNG was last seeded with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Seconds per physics step.
    pub fn physics_timestep(&self) -> f64 {
        self.physics_timestep
    }

    /// Seconds per control step.
    pub fn control_timestep(&self) -> f64 {
        self.control_timestep
    }

    /// Physics steps per control step.
    pub fn n_sub_steps(&self) -> u32 {
        self.n_sub_steps
    }

    /// Restart the RNG stream from `seed`.
    pub fn reseed(&mut self, seed: u64) {
        self.seed = seed;
        self.rng = TaskRng::seed_from_u64(seed);
    }
}

impl<S: fmt::Debug> fmt::Debug for Task<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("style", &self.style)
            .field("flags", &self.flags)
            .field("seed", &self.seed)
            .field("n_sub_steps", &self.n_sub_steps)
            .field("state", &self.state)
            .finish()
    }
}

/// Validating builder for [`Task`].
///
/// # Examples
///
/// ```
/// use kinema_core::HookError;
/// use kinema_physics::PhysicsData;
/// use kinema_task::{Entity, TaskBuilder};
/// use kinema_model::Model;
///
/// fn reward(_: &(), _: &dyn PhysicsData) -> Result<f64, HookError> {
///     Ok(1.0)
/// }
///
/// let task = TaskBuilder::new("idle", Entity::new(Model::new("empty")), ())
///     .physics_timestep(0.005)
///     .control_timestep(0.025)
///     .reward(reward)
///     .build()
///     .unwrap();
/// assert_eq!(task.n_sub_steps(), 5);
/// ```
pub struct TaskBuilder<S> {
    name: String,
    root: Entity,
    state: S,
    hooks: Hooks<S>,
    physics_timestep: f64,
    control_timestep: Option<f64>,
    seed: u64,
    enabled: Vec<String>,
}

impl<S> TaskBuilder<S> {
    /// Physics timestep used when none is set.
    pub const DEFAULT_PHYSICS_TIMESTEP: f64 = 0.002;

    /// Start a task around `root` with initial state `state`.
    pub fn new(name: impl Into<String>, root: Entity, state: S) -> Self {
        Self {
            name: name.into(),
            root,
            state,
            hooks: Hooks::default(),
            physics_timestep: Self::DEFAULT_PHYSICS_TIMESTEP,
            control_timestep: None,
            seed: 0,
            enabled: Vec::new(),
        }
    }

    /// Seconds per physics step.
    pub fn physics_timestep(mut self, dt: f64) -> Self {
        self.physics_timestep = dt;
        self
    }

    /// Seconds per control step. Defaults to the physics timestep.
    pub fn control_timestep(mut self, dt: f64) -> Self {
        self.control_timestep = Some(dt);
        self
    }

    /// RNG seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the model-modification hook.
    pub fn modify_model(mut self, f: ModifyModelFn<S>) -> Self {
        self.hooks.modify_model = Some(f);
        self
    }

    /// Set the episode-initialization hook.
    pub fn initialize_episode(mut self, f: InitializeEpisodeFn<S>) -> Self {
        self.hooks.initialize_episode = Some(f);
        self
    }

    /// Set the before-step hook.
    pub fn before_step(mut self, f: BeforeStepFn<S>) -> Self {
        self.hooks.before_step = Some(f);
        self
    }

    /// Set the after-step hook.
    pub fn after_step(mut self, f: AfterStepFn<S>) -> Self {
        self.hooks.after_step = Some(f);
        self
    }

    /// Set the reward hook.
    pub fn reward(mut self, f: RewardFn<S>) -> Self {
        self.hooks.reward = Some(f);
        self
    }

    /// Set the termination hook.
    pub fn termination(mut self, f: TerminationFn<S>) -> Self {
        self.hooks.termination = Some(f);
        self
    }

    /// Set the observation hook, making the task Suite-style.
    pub fn observation(mut self, f: ObservationFn<S>) -> Self {
        self.hooks.observation = Some(f);
        self
    }

    /// Enable a root-entity observable by qualified name.
    pub fn enable_observable(mut self, name: impl Into<String>) -> Self {
        self.enabled.push(name.into());
        self
    }

    /// Validate and build.
    ///
    /// # Errors
    ///
    /// - Any timestep error from [`validate_timesteps`].
    /// - [`ConfigError::MissingHook`] if no reward hook was set.
    /// - [`ConfigError::Observables`] if an enabled observable is not
    ///   declared by the root entity.
    pub fn build(self) -> Result<Task<S>, ConfigError> {
        let control_timestep = self.control_timestep.unwrap_or(self.physics_timestep);
        let n_sub_steps = validate_timesteps(self.physics_timestep, control_timestep)?;
        let mut hooks = self.hooks;
        let reward = hooks.reward.take().ok_or(ConfigError::MissingHook {
            hook: HookKind::Reward,
        })?;

        let mut root = self.root;
        for name in &self.enabled {
            root.observables_mut().enable(name)?;
        }

        let flags = HookFlags::compute(&hooks, &root);
        let style = if hooks.observation.is_some() {
            TaskStyle::Suite
        } else {
            TaskStyle::Composer
        };
        tracing::debug!(
            task = %self.name,
            n_sub_steps,
            style = ?style,
            reuse_model = !flags.has_model_hooks,
            "kinema.task.build"
        );
        Ok(Task {
            name: self.name,
            root,
            state: self.state,
            hooks,
            reward,
            flags,
            style,
            rng: TaskRng::seed_from_u64(self.seed),
            seed: self.seed,
            physics_timestep: self.physics_timestep,
            control_timestep,
            n_sub_steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinema_core::{Category, ObsError};
    use kinema_obs::Observable;
    use kinema_test_utils::fixtures;
    use rand::Rng;

    fn reward(_: &(), _: &dyn PhysicsData) -> Result<f64, HookError> {
        Ok(0.0)
    }

    fn shuffle(_: &mut (), _: &mut Model, _: &mut TaskRng) -> Result<(), HookError> {
        Ok(())
    }

    fn observe(_: &(), _: &dyn PhysicsData) -> Result<Observation, HookError> {
        Ok(Observation::new())
    }

    fn slider() -> Entity {
        Entity::new(fixtures::slider_model("slider"))
            .with_observable(Observable::named("position", Category::Qpos, "slide"))
            .unwrap()
    }

    #[test]
    fn reward_hook_is_required() {
        match TaskBuilder::new("t", slider(), ()).build() {
            Err(ConfigError::MissingHook { hook }) => assert_eq!(hook, HookKind::Reward),
            other => panic!("expected MissingHook, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn non_integer_ratio_rejected_at_build() {
        let result = TaskBuilder::new("t", slider(), ())
            .physics_timestep(0.002)
            .control_timestep(0.005)
            .reward(reward)
            .build();
        assert!(matches!(result, Err(ConfigError::NonIntegerRatio { .. })));
    }

    #[test]
    fn control_defaults_to_physics() {
        let task = TaskBuilder::new("t", slider(), ())
            .physics_timestep(0.01)
            .reward(reward)
            .build()
            .unwrap();
        assert_eq!(task.n_sub_steps(), 1);
        assert_eq!(task.control_timestep(), 0.01);
    }

    #[test]
    fn unknown_observable_rejected() {
        match TaskBuilder::new("t", slider(), ())
            .reward(reward)
            .enable_observable("velocity")
            .build()
        {
            Err(ConfigError::Observables(ObsError::UnknownObservable { name })) => {
                assert_eq!(name, "velocity")
            }
            other => panic!("expected UnknownObservable, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn flags_and_style_follow_hooks() {
        let composer = TaskBuilder::new("t", slider(), ())
            .reward(reward)
            .enable_observable("position")
            .build()
            .unwrap();
        assert_eq!(composer.style(), TaskStyle::Composer);
        assert!(!composer.flags().has_model_hooks);
        assert!(!composer.flags().has_init_hooks);
        assert!(composer.root().observables().get("position").unwrap().is_enabled());

        let suite = TaskBuilder::new("t", slider(), ())
            .reward(reward)
            .observation(observe)
            .modify_model(shuffle)
            .build()
            .unwrap();
        assert_eq!(suite.style(), TaskStyle::Suite);
        assert!(suite.flags().has_model_hooks);
    }

    #[test]
    fn reward_hook_is_held_once() {
        let task = TaskBuilder::new("t", slider(), ())
            .reward(reward)
            .build()
            .unwrap();
        assert!(task.hooks().reward.is_none());
        assert!(format!("{:?}", task.hooks()).contains("reward: false"));
    }

    #[test]
    fn reseed_restarts_stream() {
        let mut task = TaskBuilder::new("t", slider(), ())
            .seed(7)
            .reward(reward)
            .build()
            .unwrap();
        let first: u64 = task.rng.random();
        task.reseed(7);
        assert_eq!(task.rng.random::<u64>(), first);
    }
}
