//! Example tasks for Kinema.
//!
//! - [`pendulum`]: balance and swing-up of a hinged pole (Suite style).
//! - [`reach`]: a point-mass walker reaching a moving target in a walled
//!   arena (Composer style).
//! - [`shaping`]: the `tolerance` reward-shaping helper both use.
//!
//! [`registry`] returns every task under its registry name, ready for
//! [`TaskRegistry::load`] or
//! [`parallel_rollouts`](kinema_engine::parallel_rollouts).

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod noise;
pub mod pendulum;
pub mod reach;
pub mod shaping;

use kinema_core::ConfigError;
use kinema_engine::{Environment, LoadOptions, RegistryError, TaskRegistry};

use crate::pendulum::Variant;

/// Tag for tasks in the standard benchmark set.
pub const BENCHMARKING: &str = "benchmarking";

fn pendulum_balance(options: &LoadOptions) -> Result<Box<dyn Environment>, ConfigError> {
    Ok(Box::new(pendulum::environment(Variant::Balance, options)?))
}

fn pendulum_swingup(options: &LoadOptions) -> Result<Box<dyn Environment>, ConfigError> {
    Ok(Box::new(pendulum::environment(Variant::Swingup, options)?))
}

fn pendulum_swingup_sparse(options: &LoadOptions) -> Result<Box<dyn Environment>, ConfigError> {
    Ok(Box::new(pendulum::environment(
        Variant::SwingupSparse,
        options,
    )?))
}

fn reach_target(options: &LoadOptions) -> Result<Box<dyn Environment>, ConfigError> {
    Ok(Box::new(reach::environment(options)?))
}

/// Add every suite task to `registry`.
///
/// # Errors
///
/// [`RegistryError::DuplicateTask`] if `registry` already holds one of
/// the suite's names.
pub fn register(registry: &mut TaskRegistry) -> Result<(), RegistryError> {
    registry.register(Variant::Balance.name(), pendulum_balance, &[BENCHMARKING])?;
    registry.register(Variant::Swingup.name(), pendulum_swingup, &[BENCHMARKING])?;
    registry.register(Variant::SwingupSparse.name(), pendulum_swingup_sparse, &[])?;
    registry.register(reach::NAME, reach_target, &[])?;
    Ok(())
}

/// A registry holding exactly the suite tasks.
///
/// # Examples
///
/// ```
/// let registry = kinema_suite::registry();
/// assert_eq!(
///     registry.tagged(kinema_suite::BENCHMARKING).collect::<Vec<_>>(),
///     vec!["pendulum/balance", "pendulum/swingup"]
/// );
/// ```
pub fn registry() -> TaskRegistry {
    let mut registry = TaskRegistry::new();
    register(&mut registry).expect("suite task names are distinct");
    tracing::debug!(tasks = registry.len(), "kinema.suite.registry");
    registry
}
