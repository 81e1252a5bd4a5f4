//! Named physics access: categories and values.
//!
//! The physics interface addresses quantities by `(category, name)`,
//! e.g. `(Qpos, "hinge")` or `(SiteXpos, "walker/spawn")`. Values are
//! small numeric vectors.

use smallvec::SmallVec;
use std::fmt;

/// A numeric value read from or written to physics.
///
/// Uses `SmallVec<[f64; 4]>` so scalars, 3-vectors, and quaternions
/// stay on the stack. Larger values spill to the heap transparently.
pub type Value = SmallVec<[f64; 4]>;

/// The kind of quantity a named access refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    /// Joint position, addressed by joint name. Writable.
    Qpos,
    /// Joint velocity, addressed by joint name. Writable.
    Qvel,
    /// Actuator control input, addressed by actuator name. Writable.
    Ctrl,
    /// Body position in world coordinates, addressed by body name.
    Xpos,
    /// Body linear velocity in world coordinates, addressed by body name.
    Xvel,
    /// Geom position in world coordinates, addressed by geom name.
    GeomXpos,
    /// Site position in world coordinates, addressed by site name.
    SiteXpos,
    /// Sensor reading, addressed by sensor name.
    SensorData,
}

impl Category {
    /// Whether hooks may write this category.
    ///
    /// Only generalized state and controls are writable; everything
    /// else is derived by the physics backend from them.
    pub fn is_writable(self) -> bool {
        matches!(self, Category::Qpos | Category::Qvel | Category::Ctrl)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Qpos => "qpos",
            Category::Qvel => "qvel",
            Category::Ctrl => "ctrl",
            Category::Xpos => "xpos",
            Category::Xvel => "xvel",
            Category::GeomXpos => "geom_xpos",
            Category::SiteXpos => "site_xpos",
            Category::SensorData => "sensordata",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_state_and_controls_are_writable() {
        assert!(Category::Qpos.is_writable());
        assert!(Category::Qvel.is_writable());
        assert!(Category::Ctrl.is_writable());
        assert!(!Category::Xpos.is_writable());
        assert!(!Category::SensorData.is_writable());
    }

    #[test]
    fn scalar_value_stays_inline() {
        let v: Value = smallvec::smallvec![1.0];
        assert!(!v.spilled());
    }
}
