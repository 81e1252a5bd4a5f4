//! Flattening a model tree into indexed arrays.

use indexmap::IndexMap;
use kinema_core::CompositionError;
use kinema_model::{Element, ElementKind, Model};
use nalgebra::{Quaternion, UnitQuaternion, Vector3};

/// Default rotor inertia added to every joint, so massless chains stay
/// integrable.
pub(crate) const DEFAULT_ARMATURE: f64 = 0.01;

/// Default geom mass. Planes are massless.
pub(crate) const DEFAULT_GEOM_MASS: f64 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum JointKind {
    Hinge,
    Slide,
}

#[derive(Debug)]
pub(crate) struct BodyDef {
    pub parent: usize,
    pub pos: Vector3<f64>,
    pub quat: UnitQuaternion<f64>,
    /// Joints on this body, in declaration order.
    pub joints: Vec<usize>,
    /// Every joint from the root down to and including this body's own.
    pub chain: Vec<usize>,
    /// Geoms on this body and all descendants.
    pub subtree_geoms: Vec<usize>,
}

#[derive(Debug)]
pub(crate) struct JointDef {
    pub label: String,
    pub body: usize,
    pub kind: JointKind,
    pub axis: Vector3<f64>,
    pub anchor: Vector3<f64>,
    pub damping: f64,
    pub armature: f64,
}

#[derive(Debug)]
pub(crate) struct PointDef {
    pub body: usize,
    pub pos: Vector3<f64>,
    pub mass: f64,
}

#[derive(Debug)]
pub(crate) struct ActuatorDef {
    pub joint: usize,
    pub gear: f64,
    pub range: Option<(f64, f64)>,
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum SensorDef {
    JointPos(usize),
    JointVel(usize),
    FramePos(usize),
}

/// The compiled, immutable structure of a model.
///
/// Body 0 is the world. Bodies are stored in pre-order, so a parent's
/// index is always below its children's.
#[derive(Debug)]
pub(crate) struct Layout {
    pub bodies: Vec<BodyDef>,
    pub joints: Vec<JointDef>,
    pub geoms: Vec<PointDef>,
    pub sites: Vec<PointDef>,
    pub actuators: Vec<ActuatorDef>,
    pub actuator_names: Vec<String>,
    pub sensors: Vec<SensorDef>,
    pub body_index: IndexMap<String, usize>,
    pub joint_index: IndexMap<String, usize>,
    pub geom_index: IndexMap<String, usize>,
    pub site_index: IndexMap<String, usize>,
    pub actuator_index: IndexMap<String, usize>,
    pub sensor_index: IndexMap<String, usize>,
}

impl Layout {
    pub(crate) fn from_model(model: &Model) -> Result<Self, CompositionError> {
        model.validate()?;
        let mut layout = Layout {
            bodies: vec![BodyDef {
                parent: 0,
                pos: Vector3::zeros(),
                quat: UnitQuaternion::identity(),
                joints: Vec::new(),
                chain: Vec::new(),
                subtree_geoms: Vec::new(),
            }],
            joints: Vec::new(),
            geoms: Vec::new(),
            sites: Vec::new(),
            actuators: Vec::new(),
            actuator_names: Vec::new(),
            sensors: Vec::new(),
            body_index: IndexMap::new(),
            joint_index: IndexMap::new(),
            geom_index: IndexMap::new(),
            site_index: IndexMap::new(),
            actuator_index: IndexMap::new(),
            sensor_index: IndexMap::new(),
        };
        layout.body_index.insert("world".to_string(), 0);
        for el in model.worldbody() {
            layout.add_tree(el, 0)?;
        }
        for (i, el) in model.actuators().iter().enumerate() {
            layout.add_actuator(i, el)?;
        }
        for el in model.sensors() {
            layout.add_sensor(el)?;
        }
        layout.collect_subtrees();
        Ok(layout)
    }

    fn add_tree(&mut self, el: &Element, body: usize) -> Result<(), CompositionError> {
        let pos = pos_or_zero(el)?;
        match el.kind() {
            ElementKind::Body => {
                let quat = quaternion(el)?;
                let index = self.bodies.len();
                let mut chain = self.bodies[body].chain.clone();
                self.bodies.push(BodyDef {
                    parent: body,
                    pos,
                    quat,
                    joints: Vec::new(),
                    chain: Vec::new(),
                    subtree_geoms: Vec::new(),
                });
                if let Some(name) = el.name() {
                    self.body_index.insert(name.to_string(), index);
                }
                for child in el.children() {
                    if child.kind() == ElementKind::Joint {
                        chain.push(self.add_joint(child, index)?);
                    }
                }
                self.bodies[index].chain = chain;
                for child in el.children() {
                    if child.kind() != ElementKind::Joint {
                        self.add_tree(child, index)?;
                    }
                }
            }
            ElementKind::Geom => {
                let default_mass = if el.text("type") == Some("plane") {
                    0.0
                } else {
                    DEFAULT_GEOM_MASS
                };
                let mass = non_negative(el, "mass", default_mass)?;
                if let Some(name) = el.name() {
                    self.geom_index.insert(name.to_string(), self.geoms.len());
                }
                self.geoms.push(PointDef { body, pos, mass });
            }
            ElementKind::Site => {
                if let Some(name) = el.name() {
                    self.site_index.insert(name.to_string(), self.sites.len());
                }
                self.sites.push(PointDef {
                    body,
                    pos,
                    mass: 0.0,
                });
            }
            // Joints are handled with their body; lights and cameras have
            // no dynamics.
            _ => {}
        }
        Ok(())
    }

    fn add_joint(&mut self, el: &Element, body: usize) -> Result<usize, CompositionError> {
        let kind = match el.text("type").unwrap_or("hinge") {
            "hinge" => JointKind::Hinge,
            "slide" => JointKind::Slide,
            other => {
                return Err(invalid(
                    el,
                    "type",
                    format!("unsupported joint type '{other}' (expected hinge or slide)"),
                ))
            }
        };
        let axis = el.triple("axis")?.map(Vector3::from).unwrap_or_else(Vector3::z);
        let norm = axis.norm();
        if norm < 1e-12 {
            return Err(invalid(el, "axis", "axis has zero length".to_string()));
        }
        let index = self.joints.len();
        if let Some(name) = el.name() {
            self.joint_index.insert(name.to_string(), index);
        }
        self.joints.push(JointDef {
            label: el.label(),
            body,
            kind,
            axis: axis / norm,
            anchor: pos_or_zero(el)?,
            damping: non_negative(el, "damping", 0.0)?,
            armature: non_negative(el, "armature", DEFAULT_ARMATURE)?,
        });
        self.bodies[body].joints.push(index);
        Ok(index)
    }

    fn add_actuator(&mut self, i: usize, el: &Element) -> Result<(), CompositionError> {
        let joint = self.joint_for(el)?;
        let gear = el.number("gear").unwrap_or(1.0);
        let range = match el.attr("ctrlrange") {
            None => None,
            Some(_) => match el.vector("ctrlrange") {
                Some(&[lo, hi]) if lo <= hi => Some((lo, hi)),
                _ => {
                    return Err(invalid(
                        el,
                        "ctrlrange",
                        "expected two numbers 'low high' with low <= high".to_string(),
                    ))
                }
            },
        };
        let name = el
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("actuator_{i}"));
        self.actuator_index.insert(name.clone(), i);
        self.actuator_names.push(name);
        self.actuators.push(ActuatorDef { joint, gear, range });
        Ok(())
    }

    fn add_sensor(&mut self, el: &Element) -> Result<(), CompositionError> {
        let sensor = match el.kind() {
            ElementKind::JointPos => SensorDef::JointPos(self.joint_for(el)?),
            ElementKind::JointVel => SensorDef::JointVel(self.joint_for(el)?),
            ElementKind::FramePos => {
                let target = el.text("site").unwrap_or_default();
                let site = self.site_index.get(target).copied().ok_or_else(|| {
                    CompositionError::UnresolvedReference {
                        element: el.label(),
                        attribute: "site".to_string(),
                        target: target.to_string(),
                    }
                })?;
                SensorDef::FramePos(site)
            }
            _ => return Ok(()),
        };
        if let Some(name) = el.name() {
            self.sensor_index.insert(name.to_string(), self.sensors.len());
        }
        self.sensors.push(sensor);
        Ok(())
    }

    fn joint_for(&self, el: &Element) -> Result<usize, CompositionError> {
        let target = el.text("joint").unwrap_or_default();
        self.joint_index
            .get(target)
            .copied()
            .ok_or_else(|| CompositionError::UnresolvedReference {
                element: el.label(),
                attribute: "joint".to_string(),
                target: target.to_string(),
            })
    }

    fn collect_subtrees(&mut self) {
        for (g, geom) in self.geoms.iter().enumerate() {
            let mut b = geom.body;
            while b != 0 {
                self.bodies[b].subtree_geoms.push(g);
                b = self.bodies[b].parent;
            }
        }
    }
}

fn pos_or_zero(el: &Element) -> Result<Vector3<f64>, CompositionError> {
    Ok(el.triple("pos")?.map(Vector3::from).unwrap_or_else(Vector3::zeros))
}

/// Body orientation from a `quat` attribute in `w x y z` order.
fn quaternion(el: &Element) -> Result<UnitQuaternion<f64>, CompositionError> {
    match el.vector("quat") {
        None if el.attr("quat").is_none() => Ok(UnitQuaternion::identity()),
        Some(&[w, x, y, z]) if [w, x, y, z].iter().all(|v| v.is_finite()) => {
            let q = Quaternion::new(w, x, y, z);
            if q.norm() < 1e-12 {
                return Err(invalid(el, "quat", "quaternion has zero norm".to_string()));
            }
            Ok(UnitQuaternion::from_quaternion(q))
        }
        _ => Err(invalid(
            el,
            "quat",
            "expected four finite numbers 'w x y z'".to_string(),
        )),
    }
}

fn non_negative(el: &Element, key: &str, default: f64) -> Result<f64, CompositionError> {
    match el.attr(key) {
        None => Ok(default),
        Some(_) => match el.number(key) {
            Some(v) if v.is_finite() && v >= 0.0 => Ok(v),
            _ => Err(invalid(
                el,
                key,
                "expected a finite non-negative number".to_string(),
            )),
        },
    }
}

fn invalid(el: &Element, attribute: &str, reason: String) -> CompositionError {
    CompositionError::InvalidAttribute {
        element: el.label(),
        attribute: attribute.to_string(),
        reason,
    }
}
