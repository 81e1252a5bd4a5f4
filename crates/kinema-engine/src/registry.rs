//! An explicit name → factory registry of environments.
//!
//! Registries are plain values built at start-up and passed by
//! reference. There is no global table and no registration by side
//! effect.

use std::error::Error;
use std::fmt;

use indexmap::IndexMap;
use kinema_core::ConfigError;
use kinema_task::TimeLimit;

use crate::environment::Environment;

/// Options passed to every factory.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LoadOptions {
    /// Task RNG seed. `None` keeps the task's default.
    pub seed: Option<u64>,
    /// Episode duration. `None` keeps the task's default.
    pub time_limit: Option<TimeLimit>,
}

impl LoadOptions {
    /// Options with only a seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            time_limit: None,
        }
    }
}

/// Builds a fresh environment.
pub type EnvFactory = fn(&LoadOptions) -> Result<Box<dyn Environment>, ConfigError>;

/// Errors from registry operations.
#[derive(Clone, Debug, PartialEq)]
pub enum RegistryError {
    /// No task with this name is registered.
    UnknownTask {
        /// The requested name.
        name: String,
    },
    /// A task with this name is already registered.
    DuplicateTask {
        /// The repeated name.
        name: String,
    },
    /// The factory rejected its configuration.
    Config {
        /// The task being loaded.
        name: String,
        /// The factory's error.
        error: ConfigError,
    },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTask { name } => write!(f, "no task named '{name}'"),
            Self::DuplicateTask { name } => write!(f, "task '{name}' is already registered"),
            Self::Config { name, error } => write!(f, "loading '{name}': {error}"),
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config { error, .. } => Some(error),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
struct Entry {
    factory: EnvFactory,
    tags: Vec<&'static str>,
}

/// Environment factories keyed by name, in registration order.
///
/// # Examples
///
/// ```
/// use kinema_engine::{LoadOptions, RegistryError, TaskRegistry};
///
/// let registry = TaskRegistry::new();
/// assert!(matches!(
///     registry.load("pendulum/balance", &LoadOptions::default()),
///     Err(RegistryError::UnknownTask { .. })
/// ));
/// ```
#[derive(Clone, Debug, Default)]
pub struct TaskRegistry {
    entries: IndexMap<String, Entry>,
}

impl TaskRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `name` with `tags`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::DuplicateTask`] if the name is taken.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: EnvFactory,
        tags: &[&'static str],
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(RegistryError::DuplicateTask { name });
        }
        self.entries.insert(
            name,
            Entry {
                factory,
                tags: tags.to_vec(),
            },
        );
        Ok(())
    }

    /// Build a fresh environment.
    ///
    /// # Errors
    ///
    /// [`RegistryError::UnknownTask`] or [`RegistryError::Config`].
    pub fn load(
        &self,
        name: &str,
        options: &LoadOptions,
    ) -> Result<Box<dyn Environment>, RegistryError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| RegistryError::UnknownTask {
                name: name.to_string(),
            })?;
        let env = (entry.factory)(options).map_err(|error| RegistryError::Config {
            name: name.to_string(),
            error,
        })?;
        tracing::info!(task = name, seed = ?options.seed, "kinema.registry.load");
        Ok(env)
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Names carrying `tag`, in registration order.
    pub fn tagged<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a str> {
        self.entries
            .iter()
            .filter(move |(_, e)| e.tags.iter().any(|t| *t == tag))
            .map(|(name, _)| name.as_str())
    }

    /// Tags of `name`, if registered.
    pub fn tags(&self, name: &str) -> Option<&[&'static str]> {
        self.entries.get(name).map(|e| e.tags.as_slice())
    }

    /// Number of registered tasks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn broken(_: &LoadOptions) -> Result<Box<dyn Environment>, ConfigError> {
        Err(ConfigError::InvalidTimeLimit { value: 0.0 })
    }

    #[test]
    fn duplicate_register_rejected() {
        let mut registry = TaskRegistry::new();
        registry.register("a", broken, &[]).unwrap();
        assert_eq!(
            registry.register("a", broken, &[]),
            Err(RegistryError::DuplicateTask { name: "a".into() })
        );
    }

    #[test]
    fn factory_errors_name_the_task() {
        let mut registry = TaskRegistry::new();
        registry.register("broken", broken, &[]).unwrap();
        match registry.load("broken", &LoadOptions::default()) {
            Err(RegistryError::Config { name, error }) => {
                assert_eq!(name, "broken");
                assert!(matches!(error, ConfigError::InvalidTimeLimit { .. }));
            }
            Err(other) => panic!("expected Config, got {other:?}"),
            Ok(_) => panic!("expected Config, got an environment"),
        }
    }

    #[test]
    fn tags_filter_in_registration_order() {
        let mut registry = TaskRegistry::new();
        registry.register("b", broken, &["benchmarking"]).unwrap();
        registry.register("a", broken, &[]).unwrap();
        registry.register("c", broken, &["benchmarking", "hard"]).unwrap();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["b", "a", "c"]);
        assert_eq!(
            registry.tagged("benchmarking").collect::<Vec<_>>(),
            vec!["b", "c"]
        );
        assert_eq!(registry.tags("c"), Some(&["benchmarking", "hard"][..]));
    }
}
