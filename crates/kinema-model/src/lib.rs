//! Composable model element trees for Kinema.
//!
//! A [`Model`] is an MJCF-like tree: a `worldbody` of bodies, geoms,
//! joints, sites, and lights, plus flat `actuator` and `sensor`
//! sections. Models compose by [`attach`](Model::attach)ing one tree at
//! a site of another; every identifier of the attached tree is rewritten
//! under a fresh [`Namespace`] so the composed tree stays collision-free.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod element;
pub mod model;
pub mod namespace;

pub use element::{Attr, Element, ElementKind, Section};
pub use model::Model;
pub use namespace::Namespace;
