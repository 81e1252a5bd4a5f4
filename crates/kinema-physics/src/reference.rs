//! A deterministic joint-space reference backend.
//!
//! Supports hinge and slide joints on a body tree, point-mass geoms,
//! direct-drive motors, and joint/frame sensors. Each joint is integrated
//! independently (no coupling terms, no contacts) with semi-implicit
//! Euler. Good enough to exercise episode logic; not a physics engine.

use kinema_core::{ActionSpec, Category, CompositionError, PhysicsError, Value};
use kinema_model::Model;
use nalgebra::{Unit, UnitQuaternion, Vector3};
use smallvec::smallvec;

use crate::layout::{JointKind, Layout, SensorDef};
use crate::traits::{Physics, PhysicsBackend, PhysicsData};

/// Gravitational acceleration along −z, in m/s².
pub const GRAVITY: f64 = 9.81;

/// Compiles models into [`ReferencePhysics`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ReferenceBackend;

impl PhysicsBackend for ReferenceBackend {
    fn name(&self) -> &str {
        "reference"
    }

    fn compile(&self, model: &Model, timestep: f64) -> Result<Box<dyn Physics>, CompositionError> {
        Ok(Box::new(ReferencePhysics::new(model, timestep)?))
    }
}

/// Compiled state of one model.
///
/// `qpos`, `qvel`, and `ctrl` are the only state; body and point
/// positions are recomputed from them after every step or write.
#[derive(Debug)]
pub struct ReferencePhysics {
    layout: Layout,
    action_spec: ActionSpec,
    timestep: f64,
    time: f64,
    qpos: Vec<f64>,
    qvel: Vec<f64>,
    ctrl: Vec<f64>,
    xpos: Vec<Vector3<f64>>,
    xquat: Vec<UnitQuaternion<f64>>,
    joint_axis: Vec<Vector3<f64>>,
    joint_anchor: Vec<Vector3<f64>>,
}

impl ReferencePhysics {
    /// Compile `model` with the given physics timestep.
    ///
    /// # Errors
    ///
    /// Validation errors from the model, or
    /// [`CompositionError::InvalidAttribute`] for attributes this backend
    /// cannot use (including a non-positive timestep).
    pub fn new(model: &Model, timestep: f64) -> Result<Self, CompositionError> {
        if !(timestep.is_finite() && timestep > 0.0) {
            return Err(CompositionError::InvalidAttribute {
                element: model.name().to_string(),
                attribute: "timestep".to_string(),
                reason: format!("must be finite and positive, got {timestep}"),
            });
        }
        let layout = Layout::from_model(model)?;
        let (minimum, maximum) = layout
            .actuators
            .iter()
            .map(|a| a.range.unwrap_or((f64::NEG_INFINITY, f64::INFINITY)))
            .unzip();
        let action_spec = ActionSpec {
            names: layout.actuator_names.clone(),
            minimum,
            maximum,
        };
        let nbody = layout.bodies.len();
        let njnt = layout.joints.len();
        let nu = layout.actuators.len();
        tracing::debug!(
            model = model.name(),
            nbody,
            njnt,
            nu,
            timestep,
            "kinema.physics.compile"
        );
        let mut physics = Self {
            layout,
            action_spec,
            timestep,
            time: 0.0,
            qpos: vec![0.0; njnt],
            qvel: vec![0.0; njnt],
            ctrl: vec![0.0; nu],
            xpos: vec![Vector3::zeros(); nbody],
            xquat: vec![UnitQuaternion::identity(); nbody],
            joint_axis: vec![Vector3::zeros(); njnt],
            joint_anchor: vec![Vector3::zeros(); njnt],
        };
        physics.forward();
        Ok(physics)
    }

    /// Recompute body poses and joint frames from `qpos`.
    fn forward(&mut self) {
        for b in 1..self.layout.bodies.len() {
            let body = &self.layout.bodies[b];
            let parent_rot = self.xquat[body.parent];
            let mut pos = self.xpos[body.parent] + parent_rot * body.pos;
            let mut rot = parent_rot * body.quat;
            for &j in &body.joints {
                let joint = &self.layout.joints[j];
                let axis = rot * joint.axis;
                let anchor = pos + rot * joint.anchor;
                match joint.kind {
                    JointKind::Hinge => {
                        let r = UnitQuaternion::from_axis_angle(
                            &Unit::new_normalize(axis),
                            self.qpos[j],
                        );
                        pos = anchor + r * (pos - anchor);
                        rot = r * rot;
                    }
                    JointKind::Slide => pos += axis * self.qpos[j],
                }
                self.joint_axis[j] = axis;
                self.joint_anchor[j] = anchor;
            }
            self.xpos[b] = pos;
            self.xquat[b] = rot;
        }
    }

    /// Velocity of joint `j`'s motion at world point `p`, per unit `qvel`.
    fn jacobian(&self, j: usize, p: &Vector3<f64>) -> Vector3<f64> {
        let axis = self.joint_axis[j];
        match self.layout.joints[j].kind {
            JointKind::Hinge => axis.cross(&(p - self.joint_anchor[j])),
            JointKind::Slide => axis,
        }
    }

    fn point_xpos(&self, body: usize, local: &Vector3<f64>) -> Vector3<f64> {
        self.xpos[body] + self.xquat[body] * *local
    }

    fn point_velocity(&self, body: usize, p: &Vector3<f64>) -> Vector3<f64> {
        self.layout.bodies[body]
            .chain
            .iter()
            .map(|&j| self.jacobian(j, p) * self.qvel[j])
            .sum()
    }

    fn geom_xpos(&self, g: usize) -> Vector3<f64> {
        let geom = &self.layout.geoms[g];
        self.point_xpos(geom.body, &geom.pos)
    }

    fn site_xpos(&self, s: usize) -> Vector3<f64> {
        let site = &self.layout.sites[s];
        self.point_xpos(site.body, &site.pos)
    }

    fn generalized_forces(&self) -> (Vec<f64>, Vec<f64>) {
        let gravity = Vector3::new(0.0, 0.0, -GRAVITY);
        let njnt = self.layout.joints.len();
        let mut force = vec![0.0; njnt];
        let mut inertia = vec![0.0; njnt];
        for (j, joint) in self.layout.joints.iter().enumerate() {
            inertia[j] = joint.armature;
            force[j] = -joint.damping * self.qvel[j];
            for &g in &self.layout.bodies[joint.body].subtree_geoms {
                let mass = self.layout.geoms[g].mass;
                let jac = self.jacobian(j, &self.geom_xpos(g));
                inertia[j] += mass * jac.norm_squared();
                force[j] += mass * jac.dot(&gravity);
            }
        }
        for (actuator, &ctrl) in self.layout.actuators.iter().zip(&self.ctrl) {
            let ctrl = match actuator.range {
                Some((lo, hi)) => ctrl.clamp(lo, hi),
                None => ctrl,
            };
            force[actuator.joint] += actuator.gear * ctrl;
        }
        (force, inertia)
    }

    fn check_finite(&self) -> Result<(), PhysicsError> {
        let state = self.qpos.iter().map(|v| ("qpos", v)).zip(&self.layout.joints);
        let vel = self.qvel.iter().map(|v| ("qvel", v)).zip(&self.layout.joints);
        for ((what, v), joint) in state.chain(vel) {
            if !v.is_finite() {
                return Err(PhysicsError::Diverged {
                    time: self.time,
                    quantity: format!("{what}[{}]", joint.label),
                });
            }
        }
        Ok(())
    }

    fn unknown(category: Category, name: &str) -> PhysicsError {
        PhysicsError::UnknownName {
            category,
            name: name.to_string(),
        }
    }

    fn scalar_index(&self, category: Category, name: &str) -> Result<usize, PhysicsError> {
        let index = match category {
            Category::Qpos | Category::Qvel => self.layout.joint_index.get(name),
            Category::Ctrl => self.layout.actuator_index.get(name),
            _ => None,
        };
        index.copied().ok_or_else(|| Self::unknown(category, name))
    }
}

fn triple(v: Vector3<f64>) -> Value {
    smallvec![v.x, v.y, v.z]
}

impl PhysicsData for ReferencePhysics {
    fn time(&self) -> f64 {
        self.time
    }

    fn timestep(&self) -> f64 {
        self.timestep
    }

    fn read_named(&self, category: Category, name: &str) -> Result<Value, PhysicsError> {
        let missing = || Self::unknown(category, name);
        let layout = &self.layout;
        match category {
            Category::Qpos => Ok(smallvec![self.qpos[self.scalar_index(category, name)?]]),
            Category::Qvel => Ok(smallvec![self.qvel[self.scalar_index(category, name)?]]),
            Category::Ctrl => Ok(smallvec![self.ctrl[self.scalar_index(category, name)?]]),
            Category::Xpos => {
                let b = *layout.body_index.get(name).ok_or_else(missing)?;
                Ok(triple(self.xpos[b]))
            }
            Category::Xvel => {
                let b = *layout.body_index.get(name).ok_or_else(missing)?;
                Ok(triple(self.point_velocity(b, &self.xpos[b])))
            }
            Category::GeomXpos => {
                let g = *layout.geom_index.get(name).ok_or_else(missing)?;
                Ok(triple(self.geom_xpos(g)))
            }
            Category::SiteXpos => {
                let s = *layout.site_index.get(name).ok_or_else(missing)?;
                Ok(triple(self.site_xpos(s)))
            }
            Category::SensorData => {
                let s = *layout.sensor_index.get(name).ok_or_else(missing)?;
                Ok(match layout.sensors[s] {
                    SensorDef::JointPos(j) => smallvec![self.qpos[j]],
                    SensorDef::JointVel(j) => smallvec![self.qvel[j]],
                    SensorDef::FramePos(site) => triple(self.site_xpos(site)),
                })
            }
        }
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
        let i = self.scalar_index(category, name)?;
        let &[v] = value else {
            return Err(PhysicsError::ShapeMismatch {
                category,
                name: name.to_string(),
                expected: 1,
                got: value.len(),
            });
        };
        match category {
            Category::Qpos => {
                self.qpos[i] = v;
                self.forward();
            }
            Category::Qvel => self.qvel[i] = v,
            _ => self.ctrl[i] = v,
        }
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
        Ok(())
    }

    fn control(&self) -> &[f64] {
        &self.ctrl
    }

    fn action_spec(&self) -> &ActionSpec {
        &self.action_spec
    }
}

impl Physics for ReferencePhysics {
    fn step(&mut self) -> Result<(), PhysicsError> {
        let dt = self.timestep;
        let (force, inertia) = self.generalized_forces();
        for j in 0..self.qpos.len() {
            let qacc = if inertia[j] > 0.0 {
                force[j] / inertia[j]
            } else {
                0.0
            };
            self.qvel[j] += dt * qacc;
            self.qpos[j] += dt * self.qvel[j];
        }
        self.time += dt;
        self.check_finite()?;
        self.forward();
        Ok(())
    }

    fn reset(&mut self) {
        self.time = 0.0;
        self.qpos.iter_mut().for_each(|v| *v = 0.0);
        self.qvel.iter_mut().for_each(|v| *v = 0.0);
        self.ctrl.iter_mut().for_each(|v| *v = 0.0);
        self.forward();
    }

    fn as_data(&self) -> &dyn PhysicsData {
        self
    }

    fn as_data_mut(&mut self) -> &mut dyn PhysicsData {
        self
    }
}
