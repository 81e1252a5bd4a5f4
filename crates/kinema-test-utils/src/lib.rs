//! Test utilities and mock physics for Kinema development.
//!
//! Provides a [`MockBackend`] whose compiled [`MockPhysics`] records every
//! call into a shared [`CallLog`] and counts physics steps, plus model
//! fixtures in [`fixtures`].

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use kinema_core::{ActionSpec, Category, CompositionError, PhysicsError, Value};
use kinema_model::{ElementKind, Model};
use kinema_physics::{Physics, PhysicsBackend, PhysicsData};
use smallvec::smallvec;

/// Shared, ordered record of calls. Cloning shares the same log.
///
/// Hooks under test can push their own entries so tests can assert on
/// the interleaving of hooks and physics calls.
#[derive(Clone, Debug, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.lock().push(entry.into());
    }

    /// Copy of all entries so far.
    pub fn entries(&self) -> Vec<String> {
        self.lock().clone()
    }

    /// Remove and return all entries.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lock())
    }

    /// Number of entries equal to `entry`.
    pub fn count(&self, entry: &str) -> usize {
        self.lock().iter().filter(|e| *e == entry).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Backend producing [`MockPhysics`].
///
/// Counters are shared with every compiled instance, so a test can keep
/// a clone of the backend's handles after moving the backend into a
/// controller.
#[derive(Clone, Debug, Default)]
pub struct MockBackend {
    pub log: CallLog,
    pub steps: Arc<AtomicU64>,
    pub compiles: Arc<AtomicUsize>,
    fail_at_step: Option<u64>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the `n`th physics step (1-based, counted across all
    /// instances) fail with [`PhysicsError::Diverged`].
    pub fn failing_at_step(mut self, n: u64) -> Self {
        self.fail_at_step = Some(n);
        self
    }

    pub fn step_count(&self) -> u64 {
        self.steps.load(Ordering::SeqCst)
    }

    pub fn compile_count(&self) -> usize {
        self.compiles.load(Ordering::SeqCst)
    }
}

impl PhysicsBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn compile(&self, model: &Model, timestep: f64) -> Result<Box<dyn Physics>, CompositionError> {
        model.validate()?;
        self.compiles.fetch_add(1, Ordering::SeqCst);
        self.log.push("compile");
        Ok(Box::new(MockPhysics::new(self, model, timestep)))
    }
}

/// Named state with trivial dynamics: each step, every `qpos` advances by
/// `timestep * qvel` and time advances by `timestep`.
#[derive(Debug)]
pub struct MockPhysics {
    log: CallLog,
    steps: Arc<AtomicU64>,
    fail_at_step: Option<u64>,
    timestep: f64,
    time: f64,
    values: IndexMap<(Category, String), Value>,
    joints: Vec<String>,
    ctrl: Vec<f64>,
    action_spec: ActionSpec,
}

impl MockPhysics {
    fn new(backend: &MockBackend, model: &Model, timestep: f64) -> Self {
        let mut values: IndexMap<(Category, String), Value> = IndexMap::new();
        let mut joints = Vec::new();
        let mut action_spec = ActionSpec::default();
        for el in model.elements() {
            let Some(name) = el.name() else { continue };
            let mut put = |category: Category, dim: usize| {
                values.insert((category, name.to_string()), smallvec![0.0; dim]);
            };
            match el.kind() {
                ElementKind::Joint => {
                    put(Category::Qpos, 1);
                    put(Category::Qvel, 1);
                    joints.push(name.to_string());
                }
                ElementKind::Body => {
                    put(Category::Xpos, 3);
                    put(Category::Xvel, 3);
                }
                ElementKind::Geom => put(Category::GeomXpos, 3),
                ElementKind::Site => put(Category::SiteXpos, 3),
                ElementKind::Motor => {
                    put(Category::Ctrl, 1);
                    let (lo, hi) = match el.vector("ctrlrange") {
                        Some(&[lo, hi]) => (lo, hi),
                        _ => (-1.0, 1.0),
                    };
                    action_spec.names.push(name.to_string());
                    action_spec.minimum.push(lo);
                    action_spec.maximum.push(hi);
                }
                ElementKind::JointPos | ElementKind::JointVel => put(Category::SensorData, 1),
                ElementKind::FramePos => put(Category::SensorData, 3),
                ElementKind::Light | ElementKind::Camera => {}
            }
        }
        Self {
            log: backend.log.clone(),
            steps: Arc::clone(&backend.steps),
            fail_at_step: backend.fail_at_step,
            timestep,
            time: 0.0,
            values,
            joints,
            ctrl: vec![0.0; action_spec.len()],
            action_spec,
        }
    }

    fn zero(&mut self) {
        self.time = 0.0;
        self.ctrl.iter_mut().for_each(|c| *c = 0.0);
        for v in self.values.values_mut() {
            v.iter_mut().for_each(|x| *x = 0.0);
        }
    }
}

impl PhysicsData for MockPhysics {
    fn time(&self) -> f64 {
        self.time
    }

    fn timestep(&self) -> f64 {
        self.timestep
    }

    fn read_named(&self, category: Category, name: &str) -> Result<Value, PhysicsError> {
        self.values
            .get(&(category, name.to_string()))
            .cloned()
            .ok_or_else(|| PhysicsError::UnknownName {
                category,
                name: name.to_string(),
            })
    }

    fn write_named(
        &mut self,
        category: Category,
        name: &str,
        value: &[f64],
    ) -> Result<(), PhysicsError> {
        if !category.is_writable() {
            return Err(PhysicsError::ReadOnly { category });
        }
        let slot = self
            .values
            .get_mut(&(category, name.to_string()))
            .ok_or_else(|| PhysicsError::UnknownName {
                category,
                name: name.to_string(),
            })?;
        if slot.len() != value.len() {
            return Err(PhysicsError::ShapeMismatch {
                category,
                name: name.to_string(),
                expected: slot.len(),
                got: value.len(),
            });
        }
        slot.copy_from_slice(value);
        self.log.push(format!("write {category} {name}"));
        Ok(())
    }

    fn set_control(&mut self, ctrl: &[f64]) -> Result<(), PhysicsError> {
        if ctrl.len() != self.ctrl.len() {
            return Err(PhysicsError::ActionShape {
                expected: self.ctrl.len(),
                got: ctrl.len(),
            });
        }
        self.ctrl.copy_from_slice(ctrl);
        for (name, &c) in self.action_spec.names.iter().zip(ctrl) {
            if let Some(v) = self.values.get_mut(&(Category::Ctrl, name.clone())) {
                v[0] = c;
            }
        }
        self.log.push("set_control");
        Ok(())
    }

    fn control(&self) -> &[f64] {
        &self.ctrl
    }

    fn action_spec(&self) -> &ActionSpec {
        &self.action_spec
    }
}

impl Physics for MockPhysics {
    fn step(&mut self) -> Result<(), PhysicsError> {
        let n = self.steps.fetch_add(1, Ordering::SeqCst) + 1;
        self.log.push("step");
        if self.fail_at_step == Some(n) {
            return Err(PhysicsError::Diverged {
                time: self.time,
                quantity: "mock".to_string(),
            });
        }
        for joint in &self.joints {
            let qvel = self
                .values
                .get(&(Category::Qvel, joint.clone()))
                .map_or(0.0, |v| v[0]);
            if let Some(qpos) = self.values.get_mut(&(Category::Qpos, joint.clone())) {
                qpos[0] += self.timestep * qvel;
            }
        }
        self.time += self.timestep;
        Ok(())
    }

    fn reset(&mut self) {
        self.log.push("reset");
        self.zero();
    }

    fn as_data(&self) -> &dyn PhysicsData {
        self
    }

    fn as_data_mut(&mut self) -> &mut dyn PhysicsData {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_are_counted_across_instances() {
        let backend = MockBackend::new();
        let model = fixtures::slider_model("slider");
        let mut a = backend.compile(&model, 0.01).unwrap();
        let mut b = backend.compile(&model, 0.01).unwrap();
        a.step().unwrap();
        b.step().unwrap();
        b.step().unwrap();
        assert_eq!(backend.step_count(), 3);
        assert_eq!(backend.compile_count(), 2);
        assert_eq!(backend.log.count("step"), 3);
    }

    #[test]
    fn injected_failure_fires_once() {
        let backend = MockBackend::new().failing_at_step(2);
        let mut p = backend.compile(&fixtures::slider_model("s"), 0.01).unwrap();
        assert!(p.step().is_ok());
        assert!(matches!(p.step(), Err(PhysicsError::Diverged { .. })));
        assert!(p.step().is_ok());
    }

    #[test]
    fn qpos_integrates_qvel() {
        let backend = MockBackend::new();
        let mut p = backend.compile(&fixtures::slider_model("s"), 0.5).unwrap();
        p.write_named(Category::Qvel, "slide", &[2.0]).unwrap();
        p.step().unwrap();
        assert_eq!(p.read_named(Category::Qpos, "slide").unwrap()[0], 1.0);
        p.reset();
        assert_eq!(p.read_named(Category::Qpos, "slide").unwrap()[0], 0.0);
    }
}
