//! Forward kinematics properties of the reference backend.

use kinema_core::Category;
use kinema_model::{Element, ElementKind, Model};
use kinema_physics::{Physics, PhysicsBackend, PhysicsData, ReferenceBackend};
use proptest::prelude::*;

fn two_link() -> Model {
    let mut m = Model::new("two_link");
    let upper = m
        .add(Element::named(ElementKind::Body, "upper").with("pos", [0.0, 0.0, 2.0]))
        .unwrap();
    upper
        .add(Element::named(ElementKind::Joint, "shoulder").with("axis", [0.0, 1.0, 0.0]))
        .unwrap();
    let lower = upper
        .add(Element::named(ElementKind::Body, "lower").with("pos", [0.0, 0.0, -1.0]))
        .unwrap();
    lower
        .add(Element::named(ElementKind::Joint, "elbow").with("axis", [0.0, 1.0, 0.0]))
        .unwrap();
    lower
        .add(Element::named(ElementKind::Site, "hand").with("pos", [0.0, 0.0, -1.0]))
        .unwrap();
    m
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

proptest! {
    #[test]
    fn link_lengths_are_preserved(shoulder in -6.3f64..6.3, elbow in -6.3f64..6.3) {
        let mut physics = ReferenceBackend.compile(&two_link(), 0.01).unwrap();
        physics.write_named(Category::Qpos, "shoulder", &[shoulder]).unwrap();
        physics.write_named(Category::Qpos, "elbow", &[elbow]).unwrap();

        let upper = physics.read_named(Category::Xpos, "upper").unwrap();
        let lower = physics.read_named(Category::Xpos, "lower").unwrap();
        let hand = physics.read_named(Category::SiteXpos, "hand").unwrap();

        prop_assert!((distance(&upper, &[0.0, 0.0, 2.0])).abs() < 1e-9);
        prop_assert!((distance(&upper, &lower) - 1.0).abs() < 1e-9);
        prop_assert!((distance(&lower, &hand) - 1.0).abs() < 1e-9);
        // Both hinges share the y axis, so the arm stays in the xz plane.
        prop_assert!(hand[1].abs() < 1e-9);
    }
}

#[test]
fn identical_models_step_identically() {
    let run = || {
        let mut physics = ReferenceBackend.compile(&two_link(), 0.002).unwrap();
        physics.write_named(Category::Qpos, "shoulder", &[0.4]).unwrap();
        for _ in 0..500 {
            physics.step().unwrap();
        }
        (
            physics.read_named(Category::Qpos, "elbow").unwrap(),
            physics.read_named(Category::SiteXpos, "hand").unwrap(),
        )
    };
    assert_eq!(run(), run());
}

#[test]
fn compile_rejects_invalid_model() {
    let mut m = two_link();
    m.add(Element::named(ElementKind::Motor, "ghost").with("joint", "wrist"))
        .unwrap();
    assert!(ReferenceBackend.compile(&m, 0.01).is_err());
}
