//! Hierarchical identifier prefixes for attached models.

use std::fmt;

/// Separator between namespace segments and element names.
pub const SEPARATOR: char = '/';

/// The prefix under which an attached model's identifiers live.
///
/// The root namespace is empty; qualifying a name under it leaves the
/// name unchanged. Nested attachments join with `/`.
///
/// # Examples
///
/// ```
/// use kinema_model::Namespace;
///
/// let walker = Namespace::root().join("walker");
/// assert_eq!(walker.qualify("torso"), "walker/torso");
/// assert_eq!(Namespace::root().qualify("torso"), "torso");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Namespace(String);

impl Namespace {
    /// The root (empty) namespace.
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Whether this is the root namespace.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// A child namespace one segment deeper.
    pub fn join(&self, segment: &str) -> Self {
        if self.is_root() {
            Self(segment.to_string())
        } else {
            Self(format!("{}{SEPARATOR}{segment}", self.0))
        }
    }

    /// `inner` re-rooted under this namespace.
    pub fn nest(&self, inner: &Namespace) -> Self {
        if inner.is_root() {
            self.clone()
        } else {
            self.join(inner.as_str())
        }
    }

    /// The fully qualified form of `name` in this namespace.
    pub fn qualify(&self, name: &str) -> String {
        if self.is_root() {
            name.to_string()
        } else {
            format!("{}{SEPARATOR}{name}", self.0)
        }
    }

    /// The prefix as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `segment` can name an attachment.
    pub(crate) fn is_valid_segment(segment: &str) -> bool {
        !segment.is_empty() && !segment.contains(SEPARATOR)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_join() {
        let ns = Namespace::root().join("arena").join("walker");
        assert_eq!(ns.as_str(), "arena/walker");
        assert_eq!(ns.qualify("hand"), "arena/walker/hand");
        assert!(!ns.is_root());
    }

    #[test]
    fn nest_under_outer() {
        let outer = Namespace::root().join("rig");
        assert_eq!(outer.nest(&Namespace::root()), outer);
        assert_eq!(outer.nest(&Namespace::root().join("hand")).as_str(), "rig/hand");
    }

    #[test]
    fn segment_validation() {
        assert!(Namespace::is_valid_segment("walker"));
        assert!(!Namespace::is_valid_segment(""));
        assert!(!Namespace::is_valid_segment("a/b"));
    }
}
