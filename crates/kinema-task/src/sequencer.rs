//! The lifecycle hook sequencer.
//!
//! [`HookSequencer`] owns a [`Task`], the physics backend, and the
//! compiled physics, and is the only place hooks are invoked. It walks
//! the [`Phase`] machine:
//!
//! ```text
//! UNCOMPILED ─begin_episode─▶ MJCF_READY ─initialize_episode─▶ EPISODE_READY
//!      ▲                          ▲                                  │
//!      │                          │ (no model hooks: reuse)    control_step
//!      │                          │                                  ▼
//!      └──────── begin_episode ───┴──────── TERMINATED ◀─finish── STEPPING
//! ```
//!
//! Any hook or physics failure moves to `ABORTED` and drops the compiled
//! physics; only [`begin_episode`](HookSequencer::begin_episode) leaves
//! `ABORTED`, and it always recompiles.

use std::fmt;

use kinema_core::{
    ActionSpec, CompositionError, ConfigError, HookError, HookKind, Phase, StepError,
};
use kinema_model::Model;
use kinema_obs::{Observation, ObservableSet, ObservationSpec};
use kinema_physics::{Physics, PhysicsBackend, PhysicsData};

use crate::task::{Task, Termination};

/// What one control step produced.
#[derive(Clone, Debug, PartialEq)]
pub struct StepReport {
    /// Result of the termination check.
    pub termination: Termination,
    /// Reward for the step.
    pub reward: f64,
    /// Observation after the step.
    pub observation: Observation,
    /// Physics steps taken.
    pub physics_steps: u32,
}

fn hook_failed(hook: HookKind) -> impl FnOnce(HookError) -> StepError {
    move |reason| StepError::HookFailed { hook, reason }
}

/// Drives a task's hooks around physics stepping and compilation.
pub struct HookSequencer<S> {
    task: Task<S>,
    backend: Box<dyn PhysicsBackend>,
    physics: Option<Box<dyn Physics>>,
    action_spec: ActionSpec,
    phase: Phase,
}

impl<S> HookSequencer<S> {
    /// Wrap `task`, checking that its pristine model compiles.
    ///
    /// The trial compile is discarded; the first
    /// [`begin_episode`](Self::begin_episode) compiles for real.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Composition`] if the root model does not compile.
    pub fn new(task: Task<S>, backend: Box<dyn PhysicsBackend>) -> Result<Self, ConfigError> {
        let trial = backend.compile(task.root.model(), task.physics_timestep)?;
        let action_spec = trial.action_spec().clone();
        tracing::debug!(
            task = %task.name,
            backend = backend.name(),
            "kinema.physics.compile_check"
        );
        Ok(Self {
            task,
            backend,
            physics: None,
            action_spec,
            phase: Phase::Uncompiled,
        })
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The wrapped task.
    pub fn task(&self) -> &Task<S> {
        &self.task
    }

    /// The compiled physics, if any.
    pub fn physics(&self) -> Option<&dyn PhysicsData> {
        self.physics.as_deref().map(|p| p.as_data())
    }

    /// Actuator names and bounds as of the most recent compile.
    pub fn action_spec(&self) -> &ActionSpec {
        &self.action_spec
    }

    /// Observation names and dimensions, measured against the compiled
    /// physics. Does not abort on failure.
    ///
    /// # Errors
    ///
    /// [`StepError::InvalidPhase`] without compiled physics, or the
    /// observation error.
    pub fn observation_spec(&self) -> Result<ObservationSpec, StepError> {
        let physics = self.physics().ok_or(StepError::InvalidPhase {
            operation: "observation_spec",
            phase: self.phase,
        })?;
        Ok(observe_task(&self.task, physics)?.spec())
    }

    /// Restart the task RNG from `seed`.
    pub fn reseed(&mut self, seed: u64) {
        self.task.reseed(seed);
    }

    // ── Episode boundary ───────────────────────────────────────────

    /// Bring up physics for a new episode, ending in `MJCF_READY`.
    ///
    /// With no model-modification hooks anywhere in the task and
    /// compiled physics on hand, the physics is reset in place.
    /// Otherwise the model hooks run (task first, then entities in
    /// attachment order) on a fresh copy of the pristine model, which
    /// is then compiled.
    ///
    /// # Errors
    ///
    /// [`StepError::HookFailed`] or [`StepError::Composition`]; either
    /// leaves the sequencer `ABORTED`.
    pub fn begin_episode(&mut self) -> Result<(), StepError> {
        let result = self.try_begin_episode();
        self.abort_on_error(result)
    }

    fn try_begin_episode(&mut self) -> Result<(), StepError> {
        if !self.task.flags.has_model_hooks && self.phase.is_compiled() {
            if let Some(physics) = self.physics.as_mut() {
                physics.reset();
                if self.phase != Phase::MjcfReady {
                    self.transition(Phase::MjcfReady);
                }
                tracing::debug!(task = %self.task.name, "kinema.physics.reuse");
                return Ok(());
            }
        }

        self.physics = None;
        if self.phase != Phase::Uncompiled {
            self.transition(Phase::Uncompiled);
        }

        let Task {
            root,
            state,
            hooks,
            rng,
            ..
        } = &mut self.task;
        let mut model = root.model().clone();
        if let Some(f) = hooks.modify_model {
            f(state, &mut model, rng).map_err(hook_failed(HookKind::ModifyModel))?;
        }
        for (ns, entity_hooks) in root.hooks() {
            if let Some(f) = entity_hooks.modify_model {
                f(ns, &mut model, rng).map_err(hook_failed(HookKind::ModifyModel))?;
            }
        }

        let physics = self.backend.compile(&model, self.task.physics_timestep)?;
        tracing::debug!(
            task = %self.task.name,
            elements = model.elements().len(),
            actuators = physics.action_spec().len(),
            "kinema.physics.compile"
        );
        self.action_spec = physics.action_spec().clone();
        self.physics = Some(physics);
        self.transition(Phase::MjcfReady);
        Ok(())
    }

    /// Run the initialization hooks (task first, then entities),
    /// ending in `EPISODE_READY`.
    ///
    /// # Errors
    ///
    /// [`StepError::InvalidPhase`] outside `MJCF_READY` (no side
    /// effects); [`StepError::HookFailed`], which aborts.
    pub fn initialize_episode(&mut self) -> Result<(), StepError> {
        if self.phase != Phase::MjcfReady {
            return Err(StepError::InvalidPhase {
                operation: "initialize_episode",
                phase: self.phase,
            });
        }
        let result = self.try_initialize_episode();
        self.abort_on_error(result)
    }

    fn try_initialize_episode(&mut self) -> Result<(), StepError> {
        let physics = self.physics.as_mut().ok_or(StepError::InvalidPhase {
            operation: "initialize_episode",
            phase: self.phase,
        })?;
        let Task {
            root,
            state,
            hooks,
            rng,
            flags,
            ..
        } = &mut self.task;
        if flags.has_init_hooks {
            if let Some(f) = hooks.initialize_episode {
                f(state, physics.as_data_mut(), rng)
                    .map_err(hook_failed(HookKind::InitializeEpisode))?;
            }
            for (ns, entity_hooks) in root.hooks() {
                if let Some(f) = entity_hooks.initialize_episode {
                    f(ns, physics.as_data_mut(), rng)
                        .map_err(hook_failed(HookKind::InitializeEpisode))?;
                }
            }
        }
        self.transition(Phase::EpisodeReady);
        Ok(())
    }

    // ── Stepping ───────────────────────────────────────────────────

    /// One control step: before-step hook (or the action written to the
    /// actuators as-is), exactly `n_sub_steps` physics steps, after-step
    /// hook, termination check, then observation and reward.
    ///
    /// # Errors
    ///
    /// - [`StepError::EpisodeAborted`] in `ABORTED`.
    /// - [`StepError::InvalidPhase`] outside `EPISODE_READY` and
    ///   `STEPPING`.
    /// - Any hook, physics, or observation failure, which aborts.
    pub fn control_step(&mut self, action: &[f64]) -> Result<StepReport, StepError> {
        match self.phase {
            Phase::EpisodeReady => self.transition(Phase::Stepping),
            Phase::Stepping => {}
            Phase::Aborted => return Err(StepError::EpisodeAborted),
            phase => {
                return Err(StepError::InvalidPhase {
                    operation: "step",
                    phase,
                })
            }
        }
        let result = self.try_control_step(action);
        self.abort_on_error(result)
    }

    fn try_control_step(&mut self, action: &[f64]) -> Result<StepReport, StepError> {
        let physics = self.physics.as_mut().ok_or(StepError::InvalidPhase {
            operation: "step",
            phase: self.phase,
        })?;
        let task = &mut self.task;

        match task.hooks.before_step {
            Some(f) => f(&mut task.state, physics.as_data_mut(), action, &mut task.rng)
                .map_err(hook_failed(HookKind::BeforeStep))?,
            None => physics.set_control(action)?,
        }

        for _ in 0..task.n_sub_steps {
            physics.step()?;
        }

        if let Some(f) = task.hooks.after_step {
            f(&mut task.state, physics.as_data_mut(), &mut task.rng)
                .map_err(hook_failed(HookKind::AfterStep))?;
        }

        let data = physics.as_data();
        let termination = match task.hooks.termination {
            Some(f) => f(&task.state, data).map_err(hook_failed(HookKind::Termination))?,
            None => Termination::Continue,
        };
        let observation = observe_task(task, data)?;
        let reward = (task.reward)(&task.state, data).map_err(hook_failed(HookKind::Reward))?;

        tracing::trace!(
            task = %task.name,
            time = data.time(),
            reward,
            terminal = termination.is_terminal(),
            "kinema.episode.step"
        );
        Ok(StepReport {
            termination,
            reward,
            observation,
            physics_steps: task.n_sub_steps,
        })
    }

    /// Assemble the observation from the current physics state.
    ///
    /// # Errors
    ///
    /// [`StepError::InvalidPhase`] without compiled physics; an
    /// observation failure, which aborts.
    pub fn observe(&mut self) -> Result<Observation, StepError> {
        let Some(physics) = self.physics.as_deref() else {
            return Err(StepError::InvalidPhase {
                operation: "observe",
                phase: self.phase,
            });
        };
        let result = observe_task(&self.task, physics.as_data());
        self.abort_on_error(result)
    }

    /// End the episode: `STEPPING → TERMINATED`.
    ///
    /// # Errors
    ///
    /// [`StepError::InvalidPhase`] outside `STEPPING`.
    pub fn finish(&mut self) -> Result<(), StepError> {
        if self.phase != Phase::Stepping {
            return Err(StepError::InvalidPhase {
                operation: "finish",
                phase: self.phase,
            });
        }
        self.transition(Phase::Terminated);
        Ok(())
    }

    // ── Structure edits ────────────────────────────────────────────

    /// Edit the pristine root model between episodes. The edit runs on
    /// a copy that must validate before it replaces the original; the
    /// compiled physics is dropped and the next episode recompiles.
    ///
    /// # Errors
    ///
    /// - [`StepError::InvalidPhase`] while structure is frozen
    ///   (`MJCF_READY`, `EPISODE_READY`, `STEPPING`).
    /// - [`StepError::Composition`] if `edit` fails or the result does
    ///   not validate. The model is left unchanged.
    pub fn modify_model(
        &mut self,
        edit: impl FnOnce(&mut Model) -> Result<(), CompositionError>,
    ) -> Result<(), StepError> {
        self.check_unfrozen("modify_model")?;
        let mut model = self.task.root.model().clone();
        edit(&mut model)?;
        model.validate()?;
        *self.task.root.model_mut() = model;
        self.physics = None;
        if self.phase != Phase::Uncompiled {
            self.transition(Phase::Uncompiled);
        }
        tracing::debug!(task = %self.task.name, "kinema.model.modified");
        Ok(())
    }

    /// Mutable access to the root entity's observables between
    /// episodes.
    ///
    /// # Errors
    ///
    /// [`StepError::InvalidPhase`] while structure is frozen.
    pub fn observables_mut(&mut self) -> Result<&mut ObservableSet, StepError> {
        self.check_unfrozen("observables_mut")?;
        Ok(self.task.root.observables_mut())
    }

    fn check_unfrozen(&self, operation: &'static str) -> Result<(), StepError> {
        if self.phase.is_structure_frozen() {
            Err(StepError::InvalidPhase {
                operation,
                phase: self.phase,
            })
        } else {
            Ok(())
        }
    }

    // ── Phase bookkeeping ──────────────────────────────────────────

    fn transition(&mut self, next: Phase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "illegal transition {} -> {next}",
            self.phase
        );
        tracing::trace!(from = %self.phase, to = %next, "kinema.phase");
        self.phase = next;
    }

    fn abort_on_error<T>(&mut self, result: Result<T, StepError>) -> Result<T, StepError> {
        if let Err(err) = &result {
            if err.is_abort() {
                tracing::warn!(
                    task = %self.task.name,
                    phase = %self.phase,
                    error = %err,
                    "kinema.episode.abort"
                );
                self.physics = None;
                self.transition(Phase::Aborted);
            }
        }
        result
    }
}

fn observe_task<S>(task: &Task<S>, physics: &dyn PhysicsData) -> Result<Observation, StepError> {
    match task.hooks.observation {
        Some(f) => f(&task.state, physics).map_err(hook_failed(HookKind::Observation)),
        None => Ok(task.root.observables().assemble(physics)?),
    }
}

impl<S> fmt::Debug for HookSequencer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookSequencer")
            .field("task", &self.task.name)
            .field("backend", &self.backend.name())
            .field("phase", &self.phase)
            .field("compiled", &self.physics.is_some())
            .finish()
    }
}
