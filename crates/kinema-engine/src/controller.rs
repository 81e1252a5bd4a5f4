//! The episode controller.
//!
//! [`EpisodeController`] is the user-facing episode loop. Each
//! [`reset()`](EpisodeController::reset) starts an episode and returns
//! its first [`TimeStep`]; each [`step()`](EpisodeController::step)
//! advances one control step. Episode length is an integer count of
//! control steps fixed at construction, so truncation never depends on
//! accumulated floating-point time or on wall-clock time.
//!
//! # Ownership model
//!
//! `EpisodeController` is [`Send`] when the task state is, but not
//! [`Sync`]: the physics backend is `Send + !Sync`. To run episodes in
//! parallel, build one controller per thread (see
//! [`parallel_rollouts`](crate::parallel_rollouts)).
//!
//! There is no implicit auto-reset: stepping after a LAST time step
//! fails with [`StepError::InvalidPhase`] until the next reset.

use std::time::Instant;

use kinema_core::{
    ActionSpec, CompositionError, ConfigError, EpisodeId, Phase, StepError,
};
use kinema_model::Model;
use kinema_obs::{ObservableSet, ObservationSpec};
use kinema_physics::{PhysicsBackend, PhysicsData};
use kinema_task::{EpisodeConfig, HookSequencer, Task, Termination, TimeLimit, Timing};

use crate::metrics::StepMetrics;
use crate::timestep::{StepType, TimeStep};

// Compile-time assertion: EpisodeController is Send for Send task state.
const _: () = {
    #[allow(dead_code)]
    fn assert_send<T: Send>() {}
    #[allow(dead_code)]
    fn check() {
        assert_send::<EpisodeController<()>>();
    }
};

// ── EpisodeState ────────────────────────────────────────────────

/// Bookkeeping for the current (or most recent) episode.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EpisodeState {
    /// Which episode this is, counting from 1 on this controller.
    pub episode: EpisodeId,
    /// Control steps taken.
    pub step_count: u64,
    /// Physics steps taken.
    pub physics_steps: u64,
    /// Simulated seconds, read from the physics after each step.
    pub time: f64,
    /// Whether the LAST step has been returned.
    pub terminated: bool,
}

// ── EpisodeController ───────────────────────────────────────────

/// Drives a task's episodes.
///
/// # Example
///
/// ```ignore
/// let mut env = EpisodeController::new(task, Box::new(ReferenceBackend), TimeLimit::Seconds(10.0))?;
/// let mut ts = env.reset()?;
/// while !ts.is_last() {
///     ts = env.step(&action)?;
/// }
/// ```
pub struct EpisodeController<S> {
    sequencer: HookSequencer<S>,
    timing: Timing,
    episode: Option<EpisodeState>,
    next_episode: EpisodeId,
    last_metrics: StepMetrics,
}

impl<S> EpisodeController<S> {
    /// Validate timing, trial-compile the task's model, and return a
    /// controller ready for [`reset()`](Self::reset).
    ///
    /// # Errors
    ///
    /// [`ConfigError`] for an invalid time limit or a model that does
    /// not compile.
    pub fn new(
        task: Task<S>,
        backend: Box<dyn PhysicsBackend>,
        time_limit: TimeLimit,
    ) -> Result<Self, ConfigError> {
        let timing = EpisodeConfig {
            physics_timestep: task.physics_timestep(),
            control_timestep: task.control_timestep(),
            time_limit,
        }
        .validate()?;
        let sequencer = HookSequencer::new(task, backend)?;
        tracing::info!(
            task = %sequencer.task().name(),
            n_sub_steps = timing.n_sub_steps,
            step_limit = ?timing.step_limit,
            "kinema.controller.new"
        );
        Ok(Self {
            sequencer,
            timing,
            episode: None,
            next_episode: EpisodeId(1),
            last_metrics: StepMetrics::default(),
        })
    }

    /// Start a new episode and return its FIRST time step.
    ///
    /// Allowed from any phase; an episode in progress is abandoned.
    ///
    /// # Errors
    ///
    /// Any hook, compile, or observation failure. The controller is left
    /// aborted; a further reset retries from scratch.
    pub fn reset(&mut self) -> Result<TimeStep, StepError> {
        let start = Instant::now();
        self.sequencer.begin_episode()?;
        self.sequencer.initialize_episode()?;
        let episode_setup_us = start.elapsed().as_micros() as u64;
        let observation = self.sequencer.observe()?;
        let time = self.sequencer.physics().map_or(0.0, |p| p.time());

        let episode = self.next_episode;
        self.next_episode = episode.next();
        self.episode = Some(EpisodeState {
            episode,
            step_count: 0,
            physics_steps: 0,
            time,
            terminated: false,
        });
        self.last_metrics = StepMetrics {
            total_us: start.elapsed().as_micros() as u64,
            episode_setup_us,
            physics_steps: 0,
        };
        tracing::info!(
            task = %self.sequencer.task().name(),
            %episode,
            seed = self.sequencer.task().seed(),
            "kinema.episode.reset"
        );
        Ok(TimeStep::first(observation))
    }

    /// Reseed the task RNG, then [`reset()`](Self::reset).
    ///
    /// # Errors
    ///
    /// As for [`reset()`](Self::reset).
    pub fn reset_with_seed(&mut self, seed: u64) -> Result<TimeStep, StepError> {
        self.sequencer.reseed(seed);
        self.reset()
    }

    /// Advance one control step.
    ///
    /// Returns LAST when the task terminates (with the task's discount)
    /// or when the step limit is reached (with discount 1.0). Termination
    /// wins when both happen on the same step.
    ///
    /// # Errors
    ///
    /// - [`StepError::InvalidPhase`] before the first reset or after LAST.
    /// - [`StepError::EpisodeAborted`] after a failed step.
    /// - Any hook, physics, or observation failure, which aborts.
    pub fn step(&mut self, action: &[f64]) -> Result<TimeStep, StepError> {
        let start = Instant::now();
        let report = self.sequencer.control_step(action)?;
        let time = self.sequencer.physics().map_or(0.0, |p| p.time());
        let episode = self.episode.as_mut().ok_or(StepError::InvalidPhase {
            operation: "step",
            phase: self.sequencer.phase(),
        })?;
        episode.step_count += 1;
        episode.physics_steps += u64::from(report.physics_steps);
        episode.time = time;

        let truncated = self
            .timing
            .step_limit
            .is_some_and(|limit| episode.step_count >= limit);
        let (step_type, discount) = match report.termination {
            Termination::Terminal { discount } => (StepType::Last, discount),
            Termination::Continue if truncated => (StepType::Last, 1.0),
            Termination::Continue => (StepType::Mid, 1.0),
        };

        if step_type == StepType::Last {
            episode.terminated = true;
            let state = *episode;
            self.sequencer.finish()?;
            tracing::info!(
                task = %self.sequencer.task().name(),
                episode = %state.episode,
                steps = state.step_count,
                truncated = !report.termination.is_terminal(),
                "kinema.episode.end"
            );
        }
        self.last_metrics = StepMetrics {
            total_us: start.elapsed().as_micros() as u64,
            episode_setup_us: 0,
            physics_steps: report.physics_steps,
        };
        Ok(TimeStep {
            step_type,
            reward: Some(report.reward),
            discount: Some(discount),
            observation: report.observation,
        })
    }

    /// Edit the task's pristine model between episodes. See
    /// [`HookSequencer::modify_model`].
    ///
    /// # Errors
    ///
    /// [`StepError::InvalidPhase`] while an episode's model is compiled
    /// and running; [`StepError::Composition`] if the edit fails.
    pub fn modify_model(
        &mut self,
        edit: impl FnOnce(&mut Model) -> Result<(), CompositionError>,
    ) -> Result<(), StepError> {
        self.sequencer.modify_model(edit)
    }

    /// Enable or disable observables between episodes.
    ///
    /// # Errors
    ///
    /// [`StepError::InvalidPhase`] while an episode's model is compiled
    /// and running.
    pub fn observables_mut(&mut self) -> Result<&mut ObservableSet, StepError> {
        self.sequencer.observables_mut()
    }

    /// The current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.sequencer.phase()
    }

    /// The current or most recent episode, if any has started.
    pub fn episode_state(&self) -> Option<&EpisodeState> {
        self.episode.as_ref()
    }

    /// Validated timing.
    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// The wrapped task.
    pub fn task(&self) -> &Task<S> {
        self.sequencer.task()
    }

    /// Read access to the compiled physics, if any.
    pub fn physics(&self) -> Option<&dyn PhysicsData> {
        self.sequencer.physics()
    }

    /// Actuator names and bounds.
    pub fn action_spec(&self) -> &ActionSpec {
        self.sequencer.action_spec()
    }

    /// Observation names and dimensions.
    ///
    /// # Errors
    ///
    /// [`StepError::InvalidPhase`] before the first reset or after an
    /// abort.
    pub fn observation_spec(&self) -> Result<ObservationSpec, StepError> {
        self.sequencer.observation_spec()
    }

    /// Metrics from the most recent reset or step.
    pub fn last_metrics(&self) -> &StepMetrics {
        &self.last_metrics
    }
}

impl<S> std::fmt::Debug for EpisodeController<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpisodeController")
            .field("task", &self.sequencer.task().name())
            .field("phase", &self.sequencer.phase())
            .field("episode", &self.episode)
            .field("step_limit", &self.timing.step_limit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinema_core::{Category, HookError};
    use kinema_model::{Element, ElementKind};
    use kinema_obs::Observable;
    use kinema_physics::PhysicsData;
    use kinema_task::{Entity, TaskBuilder};
    use kinema_test_utils::{fixtures, MockBackend};

    fn reward(_: &(), physics: &dyn PhysicsData) -> Result<f64, HookError> {
        Ok(physics.time())
    }

    fn ends_early(_: &(), physics: &dyn PhysicsData) -> Result<Termination, HookError> {
        if physics.time() >= 0.02 - 1e-9 {
            Ok(Termination::Terminal { discount: 0.0 })
        } else {
            Ok(Termination::Continue)
        }
    }

    fn controller(limit: TimeLimit) -> (EpisodeController<()>, MockBackend) {
        let backend = MockBackend::new();
        let root = Entity::new(fixtures::slider_model("slider"))
            .with_observable(Observable::named("x", Category::Qpos, "slide"))
            .unwrap();
        let task = TaskBuilder::new("slide", root, ())
            .physics_timestep(0.005)
            .control_timestep(0.01)
            .reward(reward)
            .enable_observable("x")
            .build()
            .unwrap();
        let env = EpisodeController::new(task, Box::new(backend.clone()), limit).unwrap();
        (env, backend)
    }

    #[test]
    fn first_step_has_no_reward() {
        let (mut env, _) = controller(TimeLimit::Unbounded);
        let ts = env.reset().unwrap();
        assert!(ts.is_first());
        assert_eq!(ts.reward, None);
        assert_eq!(ts.discount, None);
        assert_eq!(ts.observation.keys().collect::<Vec<_>>(), vec!["x"]);
        assert_eq!(env.episode_state().unwrap().episode, EpisodeId(1));
    }

    #[test]
    fn step_before_reset_is_rejected() {
        let (mut env, backend) = controller(TimeLimit::Unbounded);
        match env.step(&[0.0]) {
            Err(StepError::InvalidPhase { phase, .. }) => assert_eq!(phase, Phase::Uncompiled),
            other => panic!("expected InvalidPhase, got {other:?}"),
        }
        assert_eq!(backend.step_count(), 0);
    }

    #[test]
    fn truncation_yields_unit_discount_and_no_auto_reset() {
        let (mut env, _) = controller(TimeLimit::Seconds(0.03));
        env.reset().unwrap();
        assert!(env.step(&[0.0]).unwrap().is_mid());
        assert!(env.step(&[0.0]).unwrap().is_mid());
        let last = env.step(&[0.0]).unwrap();
        assert!(last.is_last());
        assert_eq!(last.discount, Some(1.0));
        assert!(env.episode_state().unwrap().terminated);
        assert_eq!(env.phase(), Phase::Terminated);
        assert!(matches!(
            env.step(&[0.0]),
            Err(StepError::InvalidPhase { .. })
        ));
    }

    #[test]
    fn termination_discount_wins_over_truncation() {
        let backend = MockBackend::new();
        let task = TaskBuilder::new("t", Entity::new(fixtures::slider_model("s")), ())
            .physics_timestep(0.01)
            .reward(reward)
            .termination(ends_early)
            .build()
            .unwrap();
        let mut env =
            EpisodeController::new(task, Box::new(backend), TimeLimit::Seconds(0.02)).unwrap();
        env.reset().unwrap();
        env.step(&[0.0]).unwrap();
        let last = env.step(&[0.0]).unwrap();
        assert!(last.is_last());
        assert_eq!(last.discount, Some(0.0));
    }

    #[test]
    fn episodes_are_numbered_and_counters_reset() {
        let (mut env, _) = controller(TimeLimit::Seconds(0.02));
        for n in 1..=3 {
            env.reset().unwrap();
            assert_eq!(env.episode_state().unwrap().step_count, 0);
            assert_eq!(env.episode_state().unwrap().time, 0.0);
            env.step(&[0.0]).unwrap();
            env.step(&[0.0]).unwrap();
            let state = env.episode_state().unwrap();
            assert_eq!(state.episode, EpisodeId(n));
            assert_eq!(state.physics_steps, 4);
            assert!((state.time - 0.02).abs() < 1e-12);
        }
    }

    #[test]
    fn invalid_time_limit_rejected() {
        let backend = MockBackend::new();
        let task = TaskBuilder::new("t", Entity::new(fixtures::slider_model("s")), ())
            .reward(reward)
            .build()
            .unwrap();
        assert!(matches!(
            EpisodeController::new(task, Box::new(backend), TimeLimit::Seconds(-1.0)),
            Err(ConfigError::InvalidTimeLimit { .. })
        ));
    }

    #[test]
    fn specs_reflect_compiled_model() {
        let (mut env, _) = controller(TimeLimit::Unbounded);
        assert_eq!(env.action_spec().names, vec!["push".to_string()]);
        assert!(env.observation_spec().is_err());
        env.reset().unwrap();
        assert_eq!(env.observation_spec().unwrap().total_dim(), 1);
    }

    #[test]
    fn model_edits_between_episodes_recompile() {
        let (mut env, backend) = controller(TimeLimit::Seconds(0.01));
        env.reset().unwrap();
        assert!(env.modify_model(|_| Ok(())).is_err());
        env.step(&[0.0]).unwrap();
        env.modify_model(|m| {
            m.add(Element::named(ElementKind::Site, "marker"))?;
            Ok(())
        })
        .unwrap();
        let compiles = backend.compile_count();
        env.reset().unwrap();
        assert_eq!(backend.compile_count(), compiles + 1);
        assert!(env.physics().unwrap().read_named(Category::SiteXpos, "marker").is_ok());
    }
}
