//! The composable model tree.

use std::fmt;

use indexmap::IndexMap;
use kinema_core::CompositionError;

use crate::element::{Element, ElementKind, Section};
use crate::namespace::{Namespace, SEPARATOR};

/// An MJCF-like model: a `worldbody` tree plus flat actuator and sensor
/// sections.
///
/// Identifiers must be unique across the whole model, regardless of
/// element kind. [`validate`](Self::validate) checks this along with
/// reference resolution; backends call it before compiling.
///
/// # Examples
///
/// ```
/// use kinema_model::{Element, ElementKind, Model};
///
/// let mut arena = Model::new("arena");
/// arena.add(Element::named(ElementKind::Site, "spawn")).unwrap();
///
/// let mut walker = Model::new("walker");
/// walker.add(Element::named(ElementKind::Body, "body")).unwrap();
///
/// let ns = arena.attach("spawn", &walker).unwrap();
/// assert_eq!(ns.as_str(), "walker");
/// assert!(arena.find("walker/body").is_some());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Model {
    name: String,
    worldbody: Vec<Element>,
    actuators: Vec<Element>,
    sensors: Vec<Element>,
    namespaces: Vec<Namespace>,
}

impl Model {
    /// An empty model. `name` becomes the namespace when this model is
    /// attached to another.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            worldbody: Vec::new(),
            actuators: Vec::new(),
            sensors: Vec::new(),
            namespaces: Vec::new(),
        }
    }

    /// The model's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Builder-style: the same model under another name, so that two
    /// copies can be attached side by side.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Top-level worldbody elements.
    pub fn worldbody(&self) -> &[Element] {
        &self.worldbody
    }

    /// Actuators in declaration order. Action vectors follow this order.
    pub fn actuators(&self) -> &[Element] {
        &self.actuators
    }

    /// Sensors in declaration order.
    pub fn sensors(&self) -> &[Element] {
        &self.sensors
    }

    /// Namespaces of every model attached into this one, outermost first.
    pub fn namespaces(&self) -> &[Namespace] {
        &self.namespaces
    }

    /// Add a top-level element to the section its kind belongs to.
    ///
    /// # Errors
    ///
    /// [`CompositionError::MisplacedElement`] for a joint directly under
    /// `worldbody`.
    pub fn add(&mut self, element: Element) -> Result<&mut Element, CompositionError> {
        let list = match element.kind().section() {
            Section::Worldbody => {
                if !element.kind().allowed_in_worldbody() {
                    return Err(CompositionError::MisplacedElement {
                        kind: element.kind().tag(),
                        parent: "worldbody",
                    });
                }
                &mut self.worldbody
            }
            Section::Actuator => &mut self.actuators,
            Section::Sensor => &mut self.sensors,
        };
        list.push(element);
        let last = list.len() - 1;
        Ok(&mut list[last])
    }

    /// Add `element` as a child of the element named `parent`.
    ///
    /// # Errors
    ///
    /// [`CompositionError::UnknownElement`] if `parent` does not exist,
    /// or [`CompositionError::MisplacedElement`] if it cannot hold
    /// `element`.
    pub fn add_to(
        &mut self,
        parent: &str,
        element: Element,
    ) -> Result<&mut Element, CompositionError> {
        self.require_mut(parent)?.add(element)
    }

    /// Look up an element by identifier.
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.elements().into_iter().find(|e| e.name() == Some(name))
    }

    /// Mutable lookup by identifier.
    pub fn find_mut(&mut self, name: &str) -> Option<&mut Element> {
        find_in_mut(&mut self.worldbody, name)
            .or_else(|| find_in_mut(&mut self.actuators, name))
            .or_else(|| find_in_mut(&mut self.sensors, name))
    }

    /// Mutable lookup that reports a missing element as an error.
    ///
    /// # Errors
    ///
    /// [`CompositionError::UnknownElement`] if no element has this name.
    pub fn require_mut(&mut self, name: &str) -> Result<&mut Element, CompositionError> {
        self.find_mut(name)
            .ok_or_else(|| CompositionError::UnknownElement {
                name: name.to_string(),
            })
    }

    /// Detach and return the element named `name` with its subtree.
    pub fn remove(&mut self, name: &str) -> Option<Element> {
        remove_in(&mut self.worldbody, name)
            .or_else(|| remove_in(&mut self.actuators, name))
            .or_else(|| remove_in(&mut self.sensors, name))
    }

    /// Every element in pre-order: worldbody tree, then actuators, then
    /// sensors.
    pub fn elements(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        for el in self
            .worldbody
            .iter()
            .chain(&self.actuators)
            .chain(&self.sensors)
        {
            el.walk(&mut |e| out.push(e));
        }
        out
    }

    /// Elements of one kind, in pre-order.
    pub fn elements_of(&self, kind: ElementKind) -> Vec<&Element> {
        self.elements()
            .into_iter()
            .filter(|e| e.kind() == kind)
            .collect()
    }

    /// Every identifier in pre-order.
    pub fn names(&self) -> Vec<&str> {
        self.elements().into_iter().filter_map(Element::name).collect()
    }

    /// Check identifier uniqueness and reference resolution.
    ///
    /// # Errors
    ///
    /// - [`CompositionError::DuplicateName`] for the first repeated identifier.
    /// - [`CompositionError::InvalidAttribute`] for a missing or non-text
    ///   reference attribute.
    /// - [`CompositionError::UnresolvedReference`] when a reference names
    ///   nothing, or names an element of the wrong kind.
    pub fn validate(&self) -> Result<(), CompositionError> {
        let elements = self.elements();
        let mut kinds: IndexMap<&str, ElementKind> = IndexMap::with_capacity(elements.len());
        for el in &elements {
            if let Some(name) = el.name() {
                if kinds.insert(name, el.kind()).is_some() {
                    return Err(CompositionError::DuplicateName {
                        name: name.to_string(),
                    });
                }
            }
        }
        for el in &elements {
            for (attribute, target_kind) in el.kind().references() {
                let target = el
                    .text(attribute)
                    .ok_or_else(|| CompositionError::InvalidAttribute {
                        element: el.label(),
                        attribute: attribute.to_string(),
                        reason: format!("<{}> requires a {} name", el.kind(), target_kind),
                    })?;
                if kinds.get(target) != Some(target_kind) {
                    return Err(CompositionError::UnresolvedReference {
                        element: el.label(),
                        attribute: attribute.to_string(),
                        target: target.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Attach `child` at the site named `site`.
    ///
    /// The child's name becomes its namespace. Its worldbody is placed in
    /// a new frame body (named after the namespace) beside the site, at
    /// the site's position; its actuators and sensors are appended. Every
    /// identifier and reference in the copy is prefixed `namespace/`.
    ///
    /// # Errors
    ///
    /// - [`CompositionError::InvalidNamespace`] if the child's name is
    ///   empty or contains `/`.
    /// - [`CompositionError::NamespaceTaken`] if the namespace is already
    ///   attached or would collide with an existing identifier.
    /// - [`CompositionError::MissingAttachmentSite`] if `site` is not a
    ///   site in this model.
    /// - Any error from [`validate`](Self::validate) on the child.
    pub fn attach(&mut self, site: &str, child: &Model) -> Result<Namespace, CompositionError> {
        let segment = child.name.as_str();
        if !Namespace::is_valid_segment(segment) {
            return Err(CompositionError::InvalidNamespace {
                namespace: segment.to_string(),
            });
        }
        let prefix = format!("{segment}{SEPARATOR}");
        let taken = self.namespaces.iter().any(|ns| ns.as_str() == segment)
            || self
                .names()
                .iter()
                .any(|name| *name == segment || name.starts_with(&prefix));
        if taken {
            return Err(CompositionError::NamespaceTaken {
                namespace: segment.to_string(),
            });
        }
        let site_pos = match self.find(site) {
            Some(el) if el.kind() == ElementKind::Site => el.triple("pos")?,
            _ => {
                return Err(CompositionError::MissingAttachmentSite {
                    site: site.to_string(),
                })
            }
        };
        child.validate()?;

        let mut incoming = child.clone();
        for el in incoming
            .worldbody
            .iter_mut()
            .chain(incoming.actuators.iter_mut())
            .chain(incoming.sensors.iter_mut())
        {
            el.prefix_names(segment);
        }

        let mut frame = Element::named(ElementKind::Body, segment);
        if let Some(pos) = site_pos {
            frame.set("pos", pos);
        }
        frame.children = incoming.worldbody;
        if insert_beside_site(&mut self.worldbody, site, frame).is_err() {
            return Err(CompositionError::MissingAttachmentSite {
                site: site.to_string(),
            });
        }
        self.actuators.extend(incoming.actuators);
        self.sensors.extend(incoming.sensors);

        let ns = Namespace::root().join(segment);
        self.namespaces.push(ns.clone());
        self.namespaces
            .extend(incoming.namespaces.iter().map(|inner| ns.nest(inner)));
        Ok(ns)
    }
}

fn find_in_mut<'a>(elements: &'a mut [Element], name: &str) -> Option<&'a mut Element> {
    for el in elements.iter_mut() {
        if el.name.as_deref() == Some(name) {
            return Some(el);
        }
        if let Some(found) = find_in_mut(&mut el.children, name) {
            return Some(found);
        }
    }
    None
}

fn remove_in(elements: &mut Vec<Element>, name: &str) -> Option<Element> {
    if let Some(i) = elements.iter().position(|e| e.name() == Some(name)) {
        return Some(elements.remove(i));
    }
    elements
        .iter_mut()
        .find_map(|el| remove_in(&mut el.children, name))
}

/// Insert `frame` right after the site named `site`, searching depth-first.
/// Hands the frame back if no such site exists.
fn insert_beside_site(
    elements: &mut Vec<Element>,
    site: &str,
    frame: Element,
) -> Result<(), Element> {
    if let Some(i) = elements
        .iter()
        .position(|e| e.kind() == ElementKind::Site && e.name() == Some(site))
    {
        elements.insert(i + 1, frame);
        return Ok(());
    }
    let mut frame = frame;
    for el in elements.iter_mut() {
        match insert_beside_site(&mut el.children, site, frame) {
            Ok(()) => return Ok(()),
            Err(back) => frame = back,
        }
    }
    Err(frame)
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<mujoco model=\"{}\">", self.name)?;
        let sections = [
            ("worldbody", &self.worldbody),
            ("actuator", &self.actuators),
            ("sensor", &self.sensors),
        ];
        for (tag, elements) in sections {
            if elements.is_empty() && tag != "worldbody" {
                continue;
            }
            writeln!(f, "  <{tag}>")?;
            for el in elements.iter() {
                el.write_xml(f, 2)?;
            }
            writeln!(f, "  </{tag}>")?;
        }
        writeln!(f, "</mujoco>")
    }
}
