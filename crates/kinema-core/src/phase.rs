//! Episode lifecycle phases and hook identities.
//!
//! The forward path of an episode is
//! `Uncompiled → MjcfReady → EpisodeReady → Stepping → Terminated`.
//! A new episode restarts at `Uncompiled`, or at `MjcfReady` when the
//! compiled model is reused unchanged. Any phase may fall into
//! `Aborted` when a hook or the physics backend fails.

use std::fmt;

/// Lifecycle state of a task's episode machinery.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// No compiled model exists for the coming episode. Structural model
    /// changes are allowed.
    Uncompiled,
    /// The composed model has been compiled into runnable physics.
    /// Structure is frozen until the episode ends.
    MjcfReady,
    /// Initial dynamic state has been set. Ready for the first step.
    EpisodeReady,
    /// Control steps are being executed.
    Stepping,
    /// The episode ended by termination or time limit. Final until the
    /// next reset.
    Terminated,
    /// A hook or physics call failed mid-episode. Physics state was
    /// discarded; only a reset leaves this phase.
    Aborted,
}

impl Phase {
    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// Forward transitions follow the episode order one step at a time.
    /// Restart transitions begin a new episode: any phase may return to
    /// `Uncompiled`, and phases that still own compiled physics
    /// (`EpisodeReady`, `Stepping`, `Terminated`) may return to
    /// `MjcfReady` to reuse it. Every phase may abort.
    pub fn can_transition_to(self, next: Phase) -> bool {
        use Phase::*;
        match (self, next) {
            (_, Aborted) => true,
            (Uncompiled, MjcfReady)
            | (MjcfReady, EpisodeReady)
            | (EpisodeReady, Stepping)
            | (Stepping, Terminated) => true,
            (EpisodeReady | Stepping | Terminated, MjcfReady) => true,
            (from, Uncompiled) => from != Uncompiled,
            _ => false,
        }
    }

    /// Whether compiled physics exists in this phase.
    pub fn is_compiled(self) -> bool {
        matches!(
            self,
            Phase::MjcfReady | Phase::EpisodeReady | Phase::Stepping | Phase::Terminated
        )
    }

    /// Whether the model structure is frozen in this phase.
    ///
    /// `Terminated` is not frozen: the episode is over and the next
    /// reset may recompile.
    pub fn is_structure_frozen(self) -> bool {
        matches!(
            self,
            Phase::MjcfReady | Phase::EpisodeReady | Phase::Stepping
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Uncompiled => "UNCOMPILED",
            Phase::MjcfReady => "MJCF_READY",
            Phase::EpisodeReady => "EPISODE_READY",
            Phase::Stepping => "STEPPING",
            Phase::Terminated => "TERMINATED",
            Phase::Aborted => "ABORTED",
        };
        f.write_str(name)
    }
}

/// Identifies a lifecycle hook, for error reporting and logging.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HookKind {
    /// Structural model modification before compilation.
    ModifyModel,
    /// Initial dynamic state at episode start.
    InitializeEpisode,
    /// Action translation before the physics sub-steps.
    BeforeStep,
    /// State bookkeeping after the physics sub-steps.
    AfterStep,
    /// Reward evaluation.
    Reward,
    /// Termination evaluation.
    Termination,
    /// Direct observation construction (Suite-style tasks).
    Observation,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HookKind::ModifyModel => "modify_model",
            HookKind::InitializeEpisode => "initialize_episode",
            HookKind::BeforeStep => "before_step",
            HookKind::AfterStep => "after_step",
            HookKind::Reward => "reward",
            HookKind::Termination => "termination",
            HookKind::Observation => "observation",
        };
        f.write_str(name)
    }
}
