//! Model elements, their kinds, and attribute values.

use indexmap::IndexMap;
use kinema_core::CompositionError;
use smallvec::SmallVec;
use std::fmt;

/// Which top-level section of a model an element kind lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Section {
    /// The kinematic tree rooted at `worldbody`.
    Worldbody,
    /// The flat `actuator` list.
    Actuator,
    /// The flat `sensor` list.
    Sensor,
}

/// The tag of a model element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// A rigid body. May hold any worldbody element, including bodies.
    Body,
    /// A collision/visual geometry.
    Geom,
    /// A degree of freedom connecting a body to its parent.
    Joint,
    /// A named frame used for attachment and sensing.
    Site,
    /// A light source.
    Light,
    /// A camera.
    Camera,
    /// A direct-drive actuator on a joint (`joint` reference).
    Motor,
    /// Joint position sensor (`joint` reference).
    JointPos,
    /// Joint velocity sensor (`joint` reference).
    JointVel,
    /// Site position sensor (`site` reference).
    FramePos,
}

impl ElementKind {
    /// The MJCF-style tag name.
    pub fn tag(self) -> &'static str {
        match self {
            ElementKind::Body => "body",
            ElementKind::Geom => "geom",
            ElementKind::Joint => "joint",
            ElementKind::Site => "site",
            ElementKind::Light => "light",
            ElementKind::Camera => "camera",
            ElementKind::Motor => "motor",
            ElementKind::JointPos => "jointpos",
            ElementKind::JointVel => "jointvel",
            ElementKind::FramePos => "framepos",
        }
    }

    /// The model section this kind belongs to.
    pub fn section(self) -> Section {
        match self {
            ElementKind::Motor => Section::Actuator,
            ElementKind::JointPos | ElementKind::JointVel | ElementKind::FramePos => {
                Section::Sensor
            }
            _ => Section::Worldbody,
        }
    }

    /// Whether an element of this kind may directly contain `child`.
    pub fn can_contain(self, child: ElementKind) -> bool {
        self == ElementKind::Body && child.section() == Section::Worldbody
    }

    /// Whether this kind may sit directly under `worldbody`.
    ///
    /// Joints need a moving body, so they are the one exclusion.
    pub fn allowed_in_worldbody(self) -> bool {
        self.section() == Section::Worldbody && self != ElementKind::Joint
    }

    /// Attributes of this kind that hold the name of another element,
    /// with the kind the target must have.
    pub fn references(self) -> &'static [(&'static str, ElementKind)] {
        match self {
            ElementKind::Motor | ElementKind::JointPos | ElementKind::JointVel => {
                &[("joint", ElementKind::Joint)]
            }
            ElementKind::FramePos => &[("site", ElementKind::Site)],
            _ => &[],
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// An attribute value.
#[derive(Clone, Debug, PartialEq)]
pub enum Attr {
    /// A single number.
    Number(f64),
    /// A numeric vector (positions, sizes, ranges).
    Vector(SmallVec<[f64; 4]>),
    /// Free text: types, or names of other elements.
    Text(String),
    /// A boolean flag.
    Bool(bool),
}

impl From<f64> for Attr {
    fn from(v: f64) -> Self {
        Attr::Number(v)
    }
}

impl<const N: usize> From<[f64; N]> for Attr {
    fn from(v: [f64; N]) -> Self {
        Attr::Vector(SmallVec::from_slice(&v))
    }
}

impl From<&[f64]> for Attr {
    fn from(v: &[f64]) -> Self {
        Attr::Vector(SmallVec::from_slice(v))
    }
}

impl From<&str> for Attr {
    fn from(v: &str) -> Self {
        Attr::Text(v.to_string())
    }
}

impl From<String> for Attr {
    fn from(v: String) -> Self {
        Attr::Text(v)
    }
}

impl From<bool> for Attr {
    fn from(v: bool) -> Self {
        Attr::Bool(v)
    }
}

impl fmt::Display for Attr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attr::Number(v) => write!(f, "{v}"),
            Attr::Vector(vs) => {
                for (i, v) in vs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{v}")?;
                }
                Ok(())
            }
            Attr::Text(s) => f.write_str(s),
            Attr::Bool(b) => f.write_str(if *b { "true" } else { "false" }),
        }
    }
}

/// One node of a model tree.
///
/// Built with [`Element::named`] / [`Element::new`] and [`with`](Element::with),
/// then inserted via [`Model::add`](crate::Model::add) or
/// [`Element::add`], which check placement.
///
/// # Examples
///
/// ```
/// use kinema_model::{Element, ElementKind};
///
/// let mut body = Element::named(ElementKind::Body, "pole").with("pos", [0.0, 0.0, 1.0]);
/// body.add(Element::named(ElementKind::Joint, "hinge").with("type", "hinge"))
///     .unwrap();
/// assert_eq!(body.children().len(), 1);
/// assert!(body.add(Element::named(ElementKind::Motor, "torque")).is_err());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    kind: ElementKind,
    pub(crate) name: Option<String>,
    pub(crate) attrs: IndexMap<String, Attr>,
    pub(crate) children: Vec<Element>,
}

impl Element {
    /// An unnamed element.
    pub fn new(kind: ElementKind) -> Self {
        Self {
            kind,
            name: None,
            attrs: IndexMap::new(),
            children: Vec::new(),
        }
    }

    /// A named element.
    pub fn named(kind: ElementKind, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(kind)
        }
    }

    /// Builder-style attribute setter.
    pub fn with(mut self, key: &str, value: impl Into<Attr>) -> Self {
        self.set(key, value);
        self
    }

    /// Set or replace an attribute.
    pub fn set(&mut self, key: &str, value: impl Into<Attr>) {
        self.attrs.insert(key.to_string(), value.into());
    }

    /// The element's tag.
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// The element's identifier, if named.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// A label for error messages: the name, or `<tag>` when unnamed.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("<{}>", self.kind.tag()),
        }
    }

    /// Raw attribute lookup.
    pub fn attr(&self, key: &str) -> Option<&Attr> {
        self.attrs.get(key)
    }

    /// All attributes in insertion order.
    pub fn attrs(&self) -> impl Iterator<Item = (&str, &Attr)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// A scalar attribute. One-component vectors count as scalars.
    pub fn number(&self, key: &str) -> Option<f64> {
        match self.attrs.get(key)? {
            Attr::Number(v) => Some(*v),
            Attr::Vector(vs) if vs.len() == 1 => Some(vs[0]),
            _ => None,
        }
    }

    /// A vector attribute.
    pub fn vector(&self, key: &str) -> Option<&[f64]> {
        match self.attrs.get(key)? {
            Attr::Vector(vs) => Some(vs.as_slice()),
            _ => None,
        }
    }

    /// A text attribute.
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.attrs.get(key)? {
            Attr::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// A boolean attribute.
    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.attrs.get(key)? {
            Attr::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// A 3-vector attribute, or `None` when absent.
    ///
    /// # Errors
    ///
    /// [`CompositionError::InvalidAttribute`] when present but not a
    /// finite 3-vector.
    pub fn triple(&self, key: &str) -> Result<Option<[f64; 3]>, CompositionError> {
        match self.attrs.get(key) {
            None => Ok(None),
            Some(Attr::Vector(vs)) if vs.len() == 3 && vs.iter().all(|v| v.is_finite()) => {
                Ok(Some([vs[0], vs[1], vs[2]]))
            }
            Some(other) => Err(CompositionError::InvalidAttribute {
                element: self.label(),
                attribute: key.to_string(),
                reason: format!("expected three finite numbers, got '{other}'"),
            }),
        }
    }

    /// Child elements in insertion order.
    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// Add a child, returning a handle to it for further nesting.
    ///
    /// # Errors
    ///
    /// [`CompositionError::MisplacedElement`] if this kind cannot hold
    /// `child` (only bodies hold children, and never actuators or
    /// sensors).
    pub fn add(&mut self, child: Element) -> Result<&mut Element, CompositionError> {
        if !self.kind.can_contain(child.kind) {
            return Err(CompositionError::MisplacedElement {
                kind: child.kind.tag(),
                parent: self.kind.tag(),
            });
        }
        self.children.push(child);
        let last = self.children.len() - 1;
        Ok(&mut self.children[last])
    }

    /// Visit this element and all descendants in pre-order.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Element)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    /// Rewrite this subtree's identifiers and name references under `prefix`.
    pub(crate) fn prefix_names(&mut self, prefix: &str) {
        if let Some(name) = &self.name {
            self.name = Some(format!("{prefix}/{name}"));
        }
        for (attr, _) in self.kind.references() {
            if let Some(Attr::Text(target)) = self.attrs.get_mut(*attr) {
                *target = format!("{prefix}/{target}");
            }
        }
        for child in &mut self.children {
            child.prefix_names(prefix);
        }
    }

    pub(crate) fn write_xml(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = "  ".repeat(depth);
        write!(f, "{indent}<{}", self.kind.tag())?;
        if let Some(name) = &self.name {
            write!(f, " name=\"{name}\"")?;
        }
        for (key, value) in &self.attrs {
            write!(f, " {key}=\"{value}\"")?;
        }
        if self.children.is_empty() {
            return writeln!(f, "/>");
        }
        writeln!(f, ">")?;
        for child in &self.children {
            child.write_xml(f, depth + 1)?;
        }
        writeln!(f, "{indent}</{}>", self.kind.tag())
    }
}
