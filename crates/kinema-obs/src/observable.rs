//! Observable declarations and the ordered observable set.

use std::fmt;

use indexmap::IndexMap;
use kinema_core::{Category, ObsError, PhysicsError, Value};
use kinema_model::Namespace;
use kinema_physics::PhysicsData;

use crate::observation::{Observation, ObservationSpec};

/// Derives an observation value from physics data. Receives the
/// namespace of the entity that declared it, so it can qualify names.
pub type ComputedFn = fn(&Namespace, &dyn PhysicsData) -> Result<Value, PhysicsError>;

/// Where an observable's value comes from.
#[derive(Clone)]
pub enum ObservableSource {
    /// A named physics quantity, read as-is.
    Named {
        /// Quantity category.
        category: Category,
        /// Element name, relative to the declaring entity.
        element: String,
    },
    /// A value computed from physics data.
    Computed(ComputedFn),
}

impl fmt::Debug for ObservableSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named { category, element } => f
                .debug_struct("Named")
                .field("category", category)
                .field("element", element)
                .finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// A named, individually enableable observation component.
///
/// Observables start disabled; tasks enable the ones they want.
#[derive(Clone, Debug)]
pub struct Observable {
    name: String,
    source: ObservableSource,
    namespace: Namespace,
    enabled: bool,
}

impl Observable {
    /// Observe a named physics quantity of the declaring entity.
    pub fn named(name: impl Into<String>, category: Category, element: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: ObservableSource::Named {
                category,
                element: element.into(),
            },
            namespace: Namespace::root(),
            enabled: false,
        }
    }

    /// Observe a value computed from physics data.
    pub fn computed(name: impl Into<String>, f: ComputedFn) -> Self {
        Self {
            name: name.into(),
            source: ObservableSource::Computed(f),
            namespace: Namespace::root(),
            enabled: false,
        }
    }

    /// Builder-style: start enabled.
    pub fn enabled(mut self) -> Self {
        self.enabled = true;
        self
    }

    /// Fully qualified name (the observation key).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The value source.
    pub fn source(&self) -> &ObservableSource {
        &self.source
    }

    /// Namespace of the declaring entity.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Whether this observable is included in observations.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Read the current value from `physics`.
    ///
    /// # Errors
    ///
    /// [`ObsError::Physics`] if the underlying read fails.
    pub fn read(&self, physics: &dyn PhysicsData) -> Result<Value, ObsError> {
        let result = match &self.source {
            ObservableSource::Named { category, element } => {
                physics.read_named(*category, &self.namespace.qualify(element))
            }
            ObservableSource::Computed(f) => f(&self.namespace, physics),
        };
        result.map_err(|reason| ObsError::Physics {
            observable: self.name.clone(),
            reason,
        })
    }

    fn under(&self, outer: &Namespace) -> Self {
        Self {
            name: outer.qualify(&self.name),
            source: self.source.clone(),
            namespace: outer.nest(&self.namespace),
            enabled: self.enabled,
        }
    }
}

/// Observables keyed by name, in declaration order.
///
/// # Examples
///
/// ```
/// use kinema_core::Category;
/// use kinema_obs::{Observable, ObservableSet};
///
/// let mut set = ObservableSet::new();
/// set.add(Observable::named("position", Category::Xpos, "body")).unwrap();
/// set.add(Observable::named("velocity", Category::Xvel, "body")).unwrap();
/// set.enable("velocity").unwrap();
/// assert_eq!(set.enabled_names().collect::<Vec<_>>(), vec!["velocity"]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct ObservableSet {
    observables: IndexMap<String, Observable>,
}

impl ObservableSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an observable at the end of the order.
    ///
    /// # Errors
    ///
    /// [`ObsError::DuplicateObservable`] if the name is taken.
    pub fn add(&mut self, observable: Observable) -> Result<(), ObsError> {
        if self.observables.contains_key(&observable.name) {
            return Err(ObsError::DuplicateObservable {
                name: observable.name,
            });
        }
        self.observables
            .insert(observable.name.clone(), observable);
        Ok(())
    }

    /// Append every observable of `other`, in its order.
    ///
    /// # Errors
    ///
    /// [`ObsError::DuplicateObservable`] on the first name clash; the
    /// set is left unchanged in that case.
    pub fn extend(&mut self, other: ObservableSet) -> Result<(), ObsError> {
        if let Some(name) = other
            .observables
            .keys()
            .find(|name| self.observables.contains_key(*name))
        {
            return Err(ObsError::DuplicateObservable { name: name.clone() });
        }
        self.observables.extend(other.observables);
        Ok(())
    }

    /// A copy with every name and element reference qualified under
    /// `outer`.
    pub fn prefixed(&self, outer: &Namespace) -> Self {
        Self {
            observables: self
                .observables
                .values()
                .map(|o| {
                    let o = o.under(outer);
                    (o.name.clone(), o)
                })
                .collect(),
        }
    }

    /// Include an observable in observations.
    ///
    /// # Errors
    ///
    /// [`ObsError::UnknownObservable`] if no observable has this name.
    pub fn enable(&mut self, name: &str) -> Result<(), ObsError> {
        self.set_enabled(name, true)
    }

    /// Exclude an observable from observations. It keeps its position.
    ///
    /// # Errors
    ///
    /// [`ObsError::UnknownObservable`] if no observable has this name.
    pub fn disable(&mut self, name: &str) -> Result<(), ObsError> {
        self.set_enabled(name, false)
    }

    /// Set an observable's enabled flag.
    ///
    /// # Errors
    ///
    /// [`ObsError::UnknownObservable`] if no observable has this name.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<(), ObsError> {
        let observable =
            self.observables
                .get_mut(name)
                .ok_or_else(|| ObsError::UnknownObservable {
                    name: name.to_string(),
                })?;
        observable.enabled = enabled;
        Ok(())
    }

    /// Look up an observable.
    pub fn get(&self, name: &str) -> Option<&Observable> {
        self.observables.get(name)
    }

    /// All observables in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Observable> {
        self.observables.values()
    }

    /// Names of enabled observables in declaration order.
    pub fn enabled_names(&self) -> impl Iterator<Item = &str> {
        self.observables
            .values()
            .filter(|o| o.enabled)
            .map(Observable::name)
    }

    /// Number of declared observables.
    pub fn len(&self) -> usize {
        self.observables.len()
    }

    /// Whether no observables are declared.
    pub fn is_empty(&self) -> bool {
        self.observables.is_empty()
    }

    /// Read every enabled observable, in declaration order.
    ///
    /// # Errors
    ///
    /// The first [`ObsError::Physics`] encountered.
    pub fn assemble(&self, physics: &dyn PhysicsData) -> Result<Observation, ObsError> {
        self.observables
            .values()
            .filter(|o| o.enabled)
            .map(|o| Ok((o.name.clone(), o.read(physics)?)))
            .collect()
    }

    /// Names and dimensions of the enabled observables, measured
    /// against `physics`.
    ///
    /// # Errors
    ///
    /// As for [`assemble`](Self::assemble).
    pub fn spec(&self, physics: &dyn PhysicsData) -> Result<ObservationSpec, ObsError> {
        Ok(self.assemble(physics)?.spec())
    }
}
