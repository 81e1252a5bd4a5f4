//! Observables and observation assembly for Kinema.
//!
//! An [`ObservableSet`] holds named [`Observable`]s in declaration order.
//! Each control step, [`ObservableSet::assemble`] reads every enabled
//! observable from the current physics data into an [`Observation`],
//! preserving that order. Nothing is cached between calls.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod observable;
pub mod observation;

pub use observable::{ComputedFn, Observable, ObservableSet, ObservableSource};
pub use observation::{Observation, ObservationSpec, SpecEntry};
