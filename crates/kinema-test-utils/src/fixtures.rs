//! Reusable model fixtures.
//!
//! - [`slider_model`]: one body on a slide joint with one motor.
//! - [`hinge_model`]: a pole on a hinge with a torque motor and sensors.
//! - [`arena_model`]: floor plus `n` attachment sites, no degrees of freedom.

use kinema_model::{Element, ElementKind, Model};

/// A body named `body` on slide joint `slide` (x axis), driven by motor
/// `push` with control range ±1.
pub fn slider_model(name: &str) -> Model {
    let mut m = Model::new(name);
    let body = m
        .add(Element::named(ElementKind::Body, "body"))
        .expect("body under worldbody");
    body.add(
        Element::named(ElementKind::Joint, "slide")
            .with("type", "slide")
            .with("axis", [1.0, 0.0, 0.0]),
    )
    .expect("joint under body");
    body.add(Element::named(ElementKind::Geom, "shell").with("type", "sphere"))
        .expect("geom under body");
    m.add(
        Element::named(ElementKind::Motor, "push")
            .with("joint", "slide")
            .with("ctrlrange", [-1.0, 1.0]),
    )
    .expect("motor in actuator section");
    m
}

/// A pole on hinge `hinge` (y axis) with tip geom `tip` at 0.5 m, motor
/// `torque` (±1), and sensors `hinge_pos` / `hinge_vel`.
pub fn hinge_model() -> Model {
    let mut m = Model::new("hinge");
    let pole = m
        .add(Element::named(ElementKind::Body, "pole"))
        .expect("body under worldbody");
    pole.add(Element::named(ElementKind::Joint, "hinge").with("axis", [0.0, 1.0, 0.0]))
        .expect("joint under body");
    pole.add(Element::named(ElementKind::Geom, "tip").with("pos", [0.0, 0.0, 0.5]))
        .expect("geom under body");
    m.add(
        Element::named(ElementKind::Motor, "torque")
            .with("joint", "hinge")
            .with("ctrlrange", [-1.0, 1.0]),
    )
    .expect("motor in actuator section");
    m.add(Element::named(ElementKind::JointPos, "hinge_pos").with("joint", "hinge"))
        .expect("sensor");
    m.add(Element::named(ElementKind::JointVel, "hinge_vel").with("joint", "hinge"))
        .expect("sensor");
    m
}

/// A floor geom and sites `site_0` .. `site_{n-1}` spaced along x.
pub fn arena_model(n: usize) -> Model {
    let mut m = Model::new("arena");
    m.add(Element::named(ElementKind::Geom, "floor").with("type", "plane"))
        .expect("geom under worldbody");
    for i in 0..n {
        m.add(Element::named(ElementKind::Site, format!("site_{i}")).with("pos", [i as f64, 0.0, 0.0]))
            .expect("site under worldbody");
    }
    m
}
