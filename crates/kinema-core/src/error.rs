//! Error types for the Kinema episode framework.
//!
//! Organized by when they are detected:
//!
//! - [`ConfigError`]: at task or controller construction. Fatal.
//! - [`CompositionError`]: while composing or compiling a model. Fatal
//!   when found at construction; ends the episode when found at an
//!   episode-boundary recompile.
//! - [`StepError`]: per reset or control step. Ends the current episode.
//!
//! [`HookError`], [`PhysicsError`], and [`ObsError`] are the leaf errors
//! that the three above wrap.

use std::error::Error;
use std::fmt;

use crate::named::Category;
use crate::phase::{HookKind, Phase};

// ── PhysicsError ───────────────────────────────────────────────────

/// Errors from the physics backend's named access or stepping.
#[derive(Clone, Debug, PartialEq)]
pub enum PhysicsError {
    /// No element of the right kind has this name in the compiled model.
    UnknownName {
        /// The category that was addressed.
        category: Category,
        /// The name that was not found.
        name: String,
    },
    /// The category is derived by the backend and cannot be written.
    ReadOnly {
        /// The category that was written.
        category: Category,
    },
    /// A written value has the wrong number of components.
    ShapeMismatch {
        /// The category that was written.
        category: Category,
        /// The element name.
        name: String,
        /// Components the element holds.
        expected: usize,
        /// Components supplied.
        got: usize,
    },
    /// An action vector has the wrong number of components.
    ActionShape {
        /// Number of actuators in the compiled model.
        expected: usize,
        /// Number of components supplied.
        got: usize,
    },
    /// Simulation state became non-finite.
    Diverged {
        /// Simulated time at which divergence was detected.
        time: f64,
        /// Name of the first non-finite quantity.
        quantity: String,
    },
}

impl fmt::Display for PhysicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownName { category, name } => {
                write!(f, "no {category} element named '{name}'")
            }
            Self::ReadOnly { category } => write!(f, "{category} is read-only"),
            Self::ShapeMismatch {
                category,
                name,
                expected,
                got,
            } => write!(
                f,
                "{category} '{name}' holds {expected} components, got {got}"
            ),
            Self::ActionShape { expected, got } => {
                write!(f, "action has {got} components, model has {expected} actuators")
            }
            Self::Diverged { time, quantity } => {
                write!(f, "simulation diverged at t={time}: '{quantity}' is not finite")
            }
        }
    }
}

impl Error for PhysicsError {}

// ── CompositionError ───────────────────────────────────────────────

/// Errors from model composition, attachment, and compilation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompositionError {
    /// Two elements in the composed tree share an identifier.
    DuplicateName {
        /// The repeated identifier.
        name: String,
    },
    /// A reference attribute names an element that does not exist.
    UnresolvedReference {
        /// The referencing element.
        element: String,
        /// The reference attribute (e.g. `joint`).
        attribute: String,
        /// The missing target name.
        target: String,
    },
    /// An attachment namespace is already used in the parent tree.
    NamespaceTaken {
        /// The contested namespace.
        namespace: String,
    },
    /// An attachment namespace is empty or contains a separator.
    InvalidNamespace {
        /// The rejected namespace.
        namespace: String,
    },
    /// The attachment site does not exist in the parent tree.
    MissingAttachmentSite {
        /// The site name that was requested.
        site: String,
    },
    /// An element was placed under a parent that cannot hold it.
    MisplacedElement {
        /// Tag of the misplaced element.
        kind: &'static str,
        /// Tag of the parent it was placed under.
        parent: &'static str,
    },
    /// An attribute is missing or has an unusable value.
    InvalidAttribute {
        /// The element carrying the attribute.
        element: String,
        /// The attribute name.
        attribute: String,
        /// Description of the problem.
        reason: String,
    },
    /// A lookup by name found no element.
    UnknownElement {
        /// The name that was looked up.
        name: String,
    },
}

impl fmt::Display for CompositionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateName { name } => write!(f, "duplicate identifier '{name}'"),
            Self::UnresolvedReference {
                element,
                attribute,
                target,
            } => write!(
                f,
                "'{element}' references unknown element '{target}' via '{attribute}'"
            ),
            Self::NamespaceTaken { namespace } => {
                write!(f, "namespace '{namespace}' is already attached")
            }
            Self::InvalidNamespace { namespace } => {
                write!(f, "invalid attachment namespace '{namespace}'")
            }
            Self::MissingAttachmentSite { site } => {
                write!(f, "attachment site '{site}' not found")
            }
            Self::MisplacedElement { kind, parent } => {
                write!(f, "<{kind}> cannot be placed under <{parent}>")
            }
            Self::InvalidAttribute {
                element,
                attribute,
                reason,
            } => write!(f, "'{element}' attribute '{attribute}': {reason}"),
            Self::UnknownElement { name } => write!(f, "no element named '{name}'"),
        }
    }
}

impl Error for CompositionError {}

// ── HookError ──────────────────────────────────────────────────────

/// Errors returned by task and entity hooks.
///
/// Wrapped in [`StepError::HookFailed`] by the sequencer, which records
/// which hook failed.
#[derive(Clone, Debug, PartialEq)]
pub enum HookError {
    /// The hook's own logic failed.
    ExecutionFailed {
        /// Human-readable description of the failure.
        reason: String,
    },
    /// A named physics access made by the hook failed.
    Physics(PhysicsError),
    /// A model edit made by a model-modification hook failed.
    Model(CompositionError),
}

impl HookError {
    /// Shorthand for [`HookError::ExecutionFailed`].
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExecutionFailed { reason } => write!(f, "execution failed: {reason}"),
            Self::Physics(e) => write!(f, "physics: {e}"),
            Self::Model(e) => write!(f, "model: {e}"),
        }
    }
}

impl Error for HookError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Physics(e) => Some(e),
            Self::Model(e) => Some(e),
            Self::ExecutionFailed { .. } => None,
        }
    }
}

impl From<PhysicsError> for HookError {
    fn from(e: PhysicsError) -> Self {
        Self::Physics(e)
    }
}

impl From<CompositionError> for HookError {
    fn from(e: CompositionError) -> Self {
        Self::Model(e)
    }
}

// ── ObsError ───────────────────────────────────────────────────────

/// Errors from observable registration and observation assembly.
#[derive(Clone, Debug, PartialEq)]
pub enum ObsError {
    /// Reading an observable's source from physics failed.
    Physics {
        /// The observable being assembled.
        observable: String,
        /// The underlying physics error.
        reason: PhysicsError,
    },
    /// No observable with this name is registered.
    UnknownObservable {
        /// The requested name.
        name: String,
    },
    /// An observable with this name is already registered.
    DuplicateObservable {
        /// The repeated name.
        name: String,
    },
}

impl fmt::Display for ObsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Physics { observable, reason } => {
                write!(f, "observable '{observable}': {reason}")
            }
            Self::UnknownObservable { name } => write!(f, "unknown observable '{name}'"),
            Self::DuplicateObservable { name } => {
                write!(f, "observable '{name}' is already registered")
            }
        }
    }
}

impl Error for ObsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Physics { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected while constructing a task or controller.
///
/// These are programmer errors: nothing is simulated until they are
/// fixed.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// A timestep is NaN, infinite, zero, or negative.
    NonPositiveTimestep {
        /// Which timestep (`"physics_timestep"` or `"control_timestep"`).
        which: &'static str,
        /// The rejected value.
        value: f64,
    },
    /// The control timestep is not a positive integer multiple of the
    /// physics timestep.
    NonIntegerRatio {
        /// The configured physics timestep.
        physics_timestep: f64,
        /// The configured control timestep.
        control_timestep: f64,
        /// `control_timestep / physics_timestep`.
        ratio: f64,
    },
    /// The time limit is NaN, zero, or negative.
    InvalidTimeLimit {
        /// The rejected value.
        value: f64,
    },
    /// An entity lacks a property its role requires (e.g. a walker
    /// without actuators).
    MissingEntityProperty {
        /// The entity's name.
        entity: String,
        /// The missing property.
        property: &'static str,
    },
    /// An entity declares an element that is not in its model.
    UnknownElement {
        /// The entity's name.
        entity: String,
        /// The undeclared element.
        name: String,
    },
    /// A required hook was not supplied.
    MissingHook {
        /// The missing hook.
        hook: HookKind,
    },
    /// Observable registration failed.
    Observables(ObsError),
    /// The construction-time compile of the root model failed.
    Composition(CompositionError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonPositiveTimestep { which, value } => {
                write!(f, "{which} must be finite and positive, got {value}")
            }
            Self::NonIntegerRatio {
                physics_timestep,
                control_timestep,
                ratio,
            } => write!(
                f,
                "control_timestep {control_timestep} is not an integer multiple of \
                 physics_timestep {physics_timestep} (ratio {ratio})"
            ),
            Self::InvalidTimeLimit { value } => {
                write!(f, "time_limit must be positive, got {value}")
            }
            Self::MissingEntityProperty { entity, property } => {
                write!(f, "entity '{entity}' has no {property}")
            }
            Self::UnknownElement { entity, name } => {
                write!(f, "entity '{entity}' declares unknown element '{name}'")
            }
            Self::MissingHook { hook } => write!(f, "required hook '{hook}' not supplied"),
            Self::Observables(e) => write!(f, "observables: {e}"),
            Self::Composition(e) => write!(f, "composition: {e}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Observables(e) => Some(e),
            Self::Composition(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CompositionError> for ConfigError {
    fn from(e: CompositionError) -> Self {
        Self::Composition(e)
    }
}

impl From<ObsError> for ConfigError {
    fn from(e: ObsError) -> Self {
        Self::Observables(e)
    }
}

// ── StepError ──────────────────────────────────────────────────────

/// Errors from `reset()` and `step()`.
///
/// Any `StepError` other than [`InvalidPhase`](Self::InvalidPhase) ends
/// the current episode: the controller moves to [`Phase::Aborted`] and
/// discards physics. Nothing is retried.
#[derive(Clone, Debug, PartialEq)]
pub enum StepError {
    /// A lifecycle hook returned an error.
    HookFailed {
        /// Which hook failed.
        hook: HookKind,
        /// The hook's error.
        reason: HookError,
    },
    /// The physics backend failed while stepping.
    Physics(PhysicsError),
    /// Observation assembly failed.
    Observation(ObsError),
    /// Recompiling the model at an episode boundary failed.
    Composition(CompositionError),
    /// The operation is not allowed in the current phase. The episode
    /// is left untouched.
    InvalidPhase {
        /// The rejected operation.
        operation: &'static str,
        /// The phase at the time of the call.
        phase: Phase,
    },
    /// The episode was aborted by an earlier failure; reset first.
    EpisodeAborted,
}

impl StepError {
    /// Whether this error aborted the episode (as opposed to rejecting
    /// a call without side effects).
    pub fn is_abort(&self) -> bool {
        !matches!(self, Self::InvalidPhase { .. } | Self::EpisodeAborted)
    }
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HookFailed { hook, reason } => write!(f, "hook '{hook}' failed: {reason}"),
            Self::Physics(e) => write!(f, "physics: {e}"),
            Self::Observation(e) => write!(f, "observation: {e}"),
            Self::Composition(e) => write!(f, "composition: {e}"),
            Self::InvalidPhase { operation, phase } => {
                write!(f, "'{operation}' is not allowed in phase {phase}")
            }
            Self::EpisodeAborted => write!(f, "episode aborted; reset required"),
        }
    }
}

impl Error for StepError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::HookFailed { reason, .. } => Some(reason),
            Self::Physics(e) => Some(e),
            Self::Observation(e) => Some(e),
            Self::Composition(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PhysicsError> for StepError {
    fn from(e: PhysicsError) -> Self {
        Self::Physics(e)
    }
}

impl From<ObsError> for StepError {
    fn from(e: ObsError) -> Self {
        Self::Observation(e)
    }
}

impl From<CompositionError> for StepError {
    fn from(e: CompositionError) -> Self {
        Self::Composition(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_failure_chains_source() {
        let err = StepError::HookFailed {
            hook: HookKind::BeforeStep,
            reason: HookError::Physics(PhysicsError::ActionShape {
                expected: 2,
                got: 1,
            }),
        };
        let msg = err.to_string();
        assert!(msg.contains("before_step"));
        let hook_err = err.source().unwrap();
        assert!(hook_err.source().is_some());
    }

    #[test]
    fn invalid_phase_is_not_an_abort() {
        let err = StepError::InvalidPhase {
            operation: "step",
            phase: Phase::Terminated,
        };
        assert!(!err.is_abort());
        assert!(err.to_string().contains("TERMINATED"));
        assert!(StepError::Physics(PhysicsError::ReadOnly {
            category: Category::Xpos
        })
        .is_abort());
    }

    #[test]
    fn ratio_error_mentions_both_timesteps() {
        let err = ConfigError::NonIntegerRatio {
            physics_timestep: 0.002,
            control_timestep: 0.005,
            ratio: 2.5,
        };
        let msg = err.to_string();
        assert!(msg.contains("0.002"));
        assert!(msg.contains("0.005"));
    }

    #[test]
    fn composition_converts_into_config() {
        let err: ConfigError = CompositionError::DuplicateName {
            name: "body".into(),
        }
        .into();
        assert!(matches!(err, ConfigError::Composition(_)));
        assert!(err.source().is_some());
    }
}
