//! Observation assembly against mock physics: ordering, freshness, and
//! namespaced reads.

use kinema_core::{Category, ObsError, PhysicsError, Value};
use kinema_model::Namespace;
use kinema_obs::{Observable, ObservableSet};
use kinema_physics::{Physics, PhysicsBackend, PhysicsData};
use kinema_test_utils::{fixtures, MockBackend};
use proptest::prelude::*;
use smallvec::smallvec;

fn doubled_slide(ns: &Namespace, physics: &dyn PhysicsData) -> Result<Value, PhysicsError> {
    let q = physics.read_named(Category::Qpos, &ns.qualify("slide"))?;
    Ok(smallvec![2.0 * q[0]])
}

fn slider_observables() -> ObservableSet {
    let mut set = ObservableSet::new();
    set.add(Observable::named("a", Category::Qpos, "slide")).unwrap();
    set.add(Observable::named("b", Category::Qvel, "slide")).unwrap();
    set.add(Observable::named("c", Category::Xpos, "body")).unwrap();
    set.add(Observable::computed("d", doubled_slide)).unwrap();
    set
}

#[test]
fn disabling_keeps_declared_order() {
    let physics = MockBackend::new()
        .compile(&fixtures::slider_model("s"), 0.01)
        .unwrap();
    let mut set = slider_observables();
    for name in ["c", "a", "b"] {
        set.enable(name).unwrap();
    }
    set.disable("b").unwrap();

    let obs = set.assemble(physics.as_data()).unwrap();
    assert_eq!(obs.keys().collect::<Vec<_>>(), vec!["a", "c"]);
    assert_eq!(obs.get("c").unwrap().len(), 3);
    assert_eq!(set.spec(physics.as_data()).unwrap().total_dim(), 4);
}

#[test]
fn every_assembly_reads_current_state() {
    let mut physics = MockBackend::new()
        .compile(&fixtures::slider_model("s"), 0.5)
        .unwrap();
    let mut set = slider_observables();
    set.enable("a").unwrap();
    set.enable("d").unwrap();

    let before = set.assemble(physics.as_data()).unwrap();
    physics.write_named(Category::Qvel, "slide", &[1.0]).unwrap();
    physics.step().unwrap();
    let after = set.assemble(physics.as_data()).unwrap();

    assert_eq!(before.flatten(), vec![0.0, 0.0]);
    assert_eq!(after.flatten(), vec![0.5, 1.0]);
}

#[test]
fn prefixed_observables_read_namespaced_elements() {
    let mut arena = fixtures::arena_model(1);
    let ns = arena.attach("site_0", &fixtures::slider_model("walker")).unwrap();
    let mut physics = MockBackend::new().compile(&arena, 0.01).unwrap();
    physics.write_named(Category::Qpos, "walker/slide", &[0.25]).unwrap();

    let mut set = slider_observables().prefixed(&ns);
    set.enable("walker/a").unwrap();
    set.enable("walker/d").unwrap();
    let obs = set.assemble(physics.as_data()).unwrap();
    assert_eq!(obs.keys().collect::<Vec<_>>(), vec!["walker/a", "walker/d"]);
    assert_eq!(obs.flatten(), vec![0.25, 0.5]);
}

#[test]
fn missing_element_names_the_observable() {
    let physics = MockBackend::new()
        .compile(&fixtures::slider_model("s"), 0.01)
        .unwrap();
    let mut set = ObservableSet::new();
    set.add(Observable::named("ghost", Category::Qpos, "nowhere").enabled())
        .unwrap();
    match set.assemble(physics.as_data()) {
        Err(ObsError::Physics { observable, reason }) => {
            assert_eq!(observable, "ghost");
            assert!(matches!(reason, PhysicsError::UnknownName { .. }));
        }
        other => panic!("expected ObsError::Physics, got {other:?}"),
    }
}

proptest! {
    #[test]
    fn enabled_subset_preserves_declaration_order(mask in prop::collection::vec(any::<bool>(), 4)) {
        let physics = MockBackend::new()
            .compile(&fixtures::slider_model("s"), 0.01)
            .unwrap();
        let mut set = slider_observables();
        let names = ["a", "b", "c", "d"];
        // Toggle in reverse so enable order differs from declaration order.
        for (name, on) in names.iter().zip(&mask).rev() {
            set.set_enabled(name, *on).unwrap();
        }
        let expected: Vec<&str> = names
            .iter()
            .zip(&mask)
            .filter(|(_, on)| **on)
            .map(|(n, _)| *n)
            .collect();
        let obs = set.assemble(physics.as_data()).unwrap();
        prop_assert_eq!(obs.keys().collect::<Vec<_>>(), expected);
    }
}
