//! Strongly-typed identifiers.

use std::fmt;

/// Identifies one episode run by a controller.
///
/// Episodes are numbered from 1 in the order they are started on a
/// single controller. `EpisodeId(0)` is never handed out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EpisodeId(pub u64);

impl EpisodeId {
    /// The ID that follows this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for EpisodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EpisodeId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_increments() {
        assert_eq!(EpisodeId(1).next(), EpisodeId(2));
    }

    #[test]
    fn display_is_bare_number() {
        assert_eq!(EpisodeId(7).to_string(), "7");
    }
}
