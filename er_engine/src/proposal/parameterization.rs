//! Parameter bindings accumulated along a proposal path.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// Values bound per entity type, in path order.
///
/// Equality, hashing and ordering only look at the flattened value sequence,
/// so two parameterizations that bind the same values in the same order are
/// the same question.
#[derive(Debug, Clone, Default)]
pub struct Parameterization {
    entries: Vec<(String, Vec<String>)>,
}

impl Parameterization {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value for an entity type.
    pub fn bind(&mut self, entity_type: &str, value: impl Into<String>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(name, _)| name == entity_type) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((entity_type.to_string(), vec![value])),
        }
    }

    /// A copy with one more value bound.
    pub fn with(&self, entity_type: &str, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.bind(entity_type, value);
        next
    }

    /// Values bound for one entity type.
    pub fn values_for(&self, entity_type: &str) -> &[String] {
        self.entries
            .iter()
            .find(|(name, _)| name == entity_type)
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    /// Every bound value in binding order.
    pub fn flattened(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .flat_map(|(_, values)| values.iter().map(String::as_str))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PartialEq for Parameterization {
    fn eq(&self, other: &Self) -> bool {
        self.flattened().eq(other.flattened())
    }
}

impl Eq for Parameterization {}

impl Hash for Parameterization {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for value in self.flattened() {
            value.hash(state);
        }
    }
}

impl PartialOrd for Parameterization {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Parameterization {
    fn cmp(&self, other: &Self) -> Ordering {
        self.flattened().cmp(other.flattened())
    }
}

impl std::fmt::Display for Parameterization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let values: Vec<&str> = self.flattened().collect();
        write!(f, "[{}]", values.join(", "))
    }
}
