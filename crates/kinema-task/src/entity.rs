//! Composable model units.
//!
//! An [`Entity`] bundles a [`Model`] with the observables and hooks that
//! belong to it. Attaching one entity to another namespaces all three
//! together, so an attached walker's `position` observable reads
//! `walker/torso` and its hooks see the `walker` namespace.

use kinema_core::{ConfigError, HookError};
use kinema_model::{ElementKind, Model, Namespace};
use kinema_obs::{Observable, ObservableSet};
use kinema_physics::PhysicsData;

use crate::task::TaskRng;

/// Entity hook: structural edits before compilation. Receives the
/// entity's namespace so it can qualify its own element names.
pub type EntityModifyFn = fn(&Namespace, &mut Model, &mut TaskRng) -> Result<(), HookError>;

/// Entity hook: dynamic initial state after compilation.
pub type EntityInitFn = fn(&Namespace, &mut dyn PhysicsData, &mut TaskRng) -> Result<(), HookError>;

/// Per-entity lifecycle hooks. Both are optional.
#[derive(Clone, Copy, Debug, Default)]
pub struct EntityHooks {
    /// Runs on the fresh model copy, after the task's own hook.
    pub modify_model: Option<EntityModifyFn>,
    /// Runs on fresh physics, after the task's own hook.
    pub initialize_episode: Option<EntityInitFn>,
}

/// A model fragment with its observables and hooks.
///
/// # Examples
///
/// ```
/// use kinema_model::{Element, ElementKind, Model};
/// use kinema_task::Entity;
///
/// let mut arena = Model::new("arena");
/// arena.add(Element::named(ElementKind::Site, "spawn")).unwrap();
/// let mut arena = Entity::new(arena);
///
/// let mut walker = Model::new("walker");
/// walker.add(Element::named(ElementKind::Body, "torso")).unwrap();
/// let ns = arena.attach("spawn", &Entity::new(walker)).unwrap();
///
/// assert_eq!(ns.as_str(), "walker");
/// assert!(arena.model().find("walker/torso").is_some());
/// ```
#[derive(Clone, Debug)]
pub struct Entity {
    model: Model,
    observables: ObservableSet,
    hooks: Vec<(Namespace, EntityHooks)>,
    actuators: Vec<String>,
    observable_joints: Vec<String>,
}

impl Entity {
    /// An entity with no observables or hooks.
    pub fn new(model: Model) -> Self {
        Self {
            model,
            observables: ObservableSet::new(),
            hooks: Vec::new(),
            actuators: Vec::new(),
            observable_joints: Vec::new(),
        }
    }

    /// A controllable entity. Both lists must be non-empty and name
    /// motors and joints of `model` respectively.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingEntityProperty`] if either list is empty.
    /// - [`ConfigError::UnknownElement`] if a name is not a motor (for
    ///   `actuators`) or a joint (for `observable_joints`) of the model.
    pub fn walker(
        model: Model,
        actuators: &[&str],
        observable_joints: &[&str],
    ) -> Result<Self, ConfigError> {
        let entity = model.name().to_string();
        for (names, kind, property) in [
            (actuators, ElementKind::Motor, "actuators"),
            (observable_joints, ElementKind::Joint, "observable joints"),
        ] {
            if names.is_empty() {
                return Err(ConfigError::MissingEntityProperty {
                    entity: entity.clone(),
                    property,
                });
            }
            if let Some(missing) = names
                .iter()
                .find(|name| model.find(name).map(|el| el.kind()) != Some(kind))
            {
                return Err(ConfigError::UnknownElement {
                    entity: entity.clone(),
                    name: missing.to_string(),
                });
            }
        }
        Ok(Self {
            actuators: actuators.iter().map(|s| s.to_string()).collect(),
            observable_joints: observable_joints.iter().map(|s| s.to_string()).collect(),
            ..Self::new(model)
        })
    }

    /// Builder-style: declare an observable.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Observables`] if the name is already declared.
    pub fn with_observable(mut self, observable: Observable) -> Result<Self, ConfigError> {
        self.observables.add(observable)?;
        Ok(self)
    }

    /// Builder-style: register hooks in this entity's own namespace.
    pub fn with_hooks(mut self, hooks: EntityHooks) -> Self {
        self.hooks.push((Namespace::root(), hooks));
        self
    }

    /// Attach `child` at `site`, namespacing its model, observables,
    /// hooks, and actuator list under the child model's name. On error
    /// this entity is unchanged.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Composition`] for any model attachment error and
    /// [`ConfigError::Observables`] if a namespaced observable name is
    /// already declared.
    pub fn attach(&mut self, site: &str, child: &Entity) -> Result<Namespace, ConfigError> {
        let mut model = self.model.clone();
        let ns = model.attach(site, &child.model)?;
        let mut observables = self.observables.clone();
        observables.extend(child.observables.prefixed(&ns))?;

        self.model = model;
        self.observables = observables;
        self.hooks.extend(
            child
                .hooks
                .iter()
                .map(|(inner, hooks)| (ns.nest(inner), *hooks)),
        );
        self.actuators
            .extend(child.actuators.iter().map(|a| ns.qualify(a)));
        self.observable_joints
            .extend(child.observable_joints.iter().map(|j| ns.qualify(j)));
        Ok(ns)
    }

    /// Builder-style: rename the entity. The name is the namespace it
    /// takes when attached; observables and hooks are stored relative to
    /// it and follow along.
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.model = self.model.with_name(name);
        self
    }

    /// The entity's name (its model's name).
    pub fn name(&self) -> &str {
        self.model.name()
    }

    /// The pristine model. Per-episode edits happen on copies.
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Mutable access to the pristine model.
    pub fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    /// Declared observables, including those of attached entities.
    pub fn observables(&self) -> &ObservableSet {
        &self.observables
    }

    /// Mutable access to the observables.
    pub fn observables_mut(&mut self) -> &mut ObservableSet {
        &mut self.observables
    }

    /// Hooks with the namespace each runs in, in attachment order.
    pub fn hooks(&self) -> &[(Namespace, EntityHooks)] {
        &self.hooks
    }

    /// Qualified actuator names.
    pub fn actuators(&self) -> &[String] {
        &self.actuators
    }

    /// Qualified observable joint names.
    pub fn observable_joints(&self) -> &[String] {
        &self.observable_joints
    }

    /// Whether any entity in the tree modifies the model per episode.
    pub fn has_model_hooks(&self) -> bool {
        self.hooks.iter().any(|(_, h)| h.modify_model.is_some())
    }

    /// Whether any entity in the tree initializes episodes.
    pub fn has_init_hooks(&self) -> bool {
        self.hooks.iter().any(|(_, h)| h.initialize_episode.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinema_core::{Category, CompositionError};
    use kinema_model::Element;
    use kinema_test_utils::fixtures;

    fn nudge(ns: &Namespace, physics: &mut dyn PhysicsData, _: &mut TaskRng) -> Result<(), HookError> {
        physics.write_named(Category::Qpos, &ns.qualify("slide"), &[0.5])?;
        Ok(())
    }

    fn slider(name: &str) -> Entity {
        Entity::walker(fixtures::slider_model(name), &["push"], &["slide"])
            .unwrap()
            .with_observable(Observable::named("position", Category::Xpos, "body").enabled())
            .unwrap()
            .with_hooks(EntityHooks {
                initialize_episode: Some(nudge),
                ..EntityHooks::default()
            })
    }

    #[test]
    fn walker_requires_actuators() {
        match Entity::walker(fixtures::slider_model("s"), &[], &["slide"]) {
            Err(ConfigError::MissingEntityProperty { property, .. }) => {
                assert_eq!(property, "actuators")
            }
            other => panic!("expected MissingEntityProperty, got {other:?}"),
        }
    }

    #[test]
    fn walker_rejects_non_joint_observable() {
        match Entity::walker(fixtures::slider_model("s"), &["push"], &["shell"]) {
            Err(ConfigError::UnknownElement { entity, name }) => {
                assert_eq!(entity, "s");
                assert_eq!(name, "shell");
            }
            other => panic!("expected UnknownElement, got {other:?}"),
        }
    }

    #[test]
    fn attach_namespaces_everything() {
        let mut arena = Entity::new(fixtures::arena_model(2));
        arena.attach("site_0", &slider("left")).unwrap();
        arena.attach("site_1", &slider("right")).unwrap();

        assert!(arena.model().find("left/slide").is_some());
        assert!(arena.observables().get("right/position").is_some());
        assert_eq!(arena.actuators(), ["left/push", "right/push"]);
        assert_eq!(arena.observable_joints(), ["left/slide", "right/slide"]);
        let namespaces: Vec<_> = arena.hooks().iter().map(|(ns, _)| ns.as_str()).collect();
        assert_eq!(namespaces, vec!["left", "right"]);
        assert!(arena.has_init_hooks());
        assert!(!arena.has_model_hooks());
    }

    #[test]
    fn renamed_entities_share_one_arena() {
        let mut arena = Entity::new(fixtures::arena_model(2));
        arena.attach("site_0", &slider("slider")).unwrap();
        let ns = arena
            .attach("site_1", &slider("slider").renamed("slider_2"))
            .unwrap();
        assert_eq!(ns.as_str(), "slider_2");
        assert!(arena.observables().get("slider/position").is_some());
        assert!(arena.observables().get("slider_2/position").is_some());
        assert_eq!(arena.actuators(), ["slider/push", "slider_2/push"]);
        arena.model().validate().unwrap();
    }

    #[test]
    fn failed_attach_leaves_entity_unchanged() {
        let mut arena = Entity::new(fixtures::arena_model(1));
        arena
            .model_mut()
            .add(Element::named(ElementKind::Body, "left"))
            .unwrap();
        let before = arena.model().names().len();
        match arena.attach("site_0", &slider("left")) {
            Err(ConfigError::Composition(CompositionError::NamespaceTaken { namespace })) => {
                assert_eq!(namespace, "left")
            }
            other => panic!("expected NamespaceTaken, got {other:?}"),
        }
        assert_eq!(arena.model().names().len(), before);
        assert!(arena.observables().is_empty());
        assert!(arena.hooks().is_empty());
    }
}
