//! Assembled observations and their specs.

use indexmap::IndexMap;
use kinema_core::Value;

/// One control step's observation: named values in declared order.
///
/// Iteration order is the order observables were declared (or, for
/// directly built observations, inserted), and is stable within an
/// episode.
///
/// # Examples
///
/// ```
/// use kinema_obs::Observation;
/// use smallvec::smallvec;
///
/// let mut obs = Observation::new();
/// obs.insert("velocity", smallvec![0.5]);
/// obs.insert("angle_cos", smallvec![1.0]);
/// assert_eq!(obs.keys().collect::<Vec<_>>(), vec!["velocity", "angle_cos"]);
/// assert_eq!(obs.flatten(), vec![0.5, 1.0]);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Observation {
    values: IndexMap<String, Value>,
}

impl Observation {
    /// An empty observation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a component. Re-inserting an existing name replaces the
    /// value in place, keeping its position.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    /// Look up a component by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Component names in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// `(name, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no components.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// All components concatenated in order.
    pub fn flatten(&self) -> Vec<f64> {
        self.values.values().flat_map(|v| v.iter().copied()).collect()
    }

    /// Names and dimensions of this observation's components.
    pub fn spec(&self) -> ObservationSpec {
        ObservationSpec {
            entries: self
                .iter()
                .map(|(name, value)| SpecEntry {
                    name: name.to_string(),
                    dim: value.len(),
                })
                .collect(),
        }
    }

    /// The underlying ordered map.
    pub fn into_inner(self) -> IndexMap<String, Value> {
        self.values
    }
}

impl FromIterator<(String, Value)> for Observation {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Shape of one observation component.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpecEntry {
    /// Component name.
    pub name: String,
    /// Number of scalars.
    pub dim: usize,
}

/// Ordered component shapes of an observation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObservationSpec {
    /// Entries in observation order.
    pub entries: Vec<SpecEntry>,
}

impl ObservationSpec {
    /// Total number of scalars across all components.
    pub fn total_dim(&self) -> usize {
        self.entries.iter().map(|e| e.dim).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn reinsert_keeps_position() {
        let mut obs = Observation::new();
        obs.insert("a", smallvec![1.0]);
        obs.insert("b", smallvec![2.0]);
        obs.insert("a", smallvec![3.0]);
        assert_eq!(obs.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(obs.get("a").unwrap()[0], 3.0);
    }

    #[test]
    fn spec_reports_dims_in_order() {
        let obs: Observation = vec![
            ("position".to_string(), smallvec![0.0, 1.0, 2.0]),
            ("velocity".to_string(), smallvec![0.0]),
        ]
        .into_iter()
        .collect();
        let spec = obs.spec();
        assert_eq!(spec.entries[0].name, "position");
        assert_eq!(spec.entries[0].dim, 3);
        assert_eq!(spec.total_dim(), 4);
    }
}
