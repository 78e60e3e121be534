//! Graph instance - the materialized entity-relationship graph.
//!
//! The graph consists of:
//! - **Entity instances**: keyed by type name, then id
//! - **Relationship instances**: directed crossings stored on their source
//!   instance, each pointing at its target by [`InstanceKey`]
//!
//! Targets are resolved by lookup on demand, so a crossing whose target has
//! been removed simply resolves to `None`.

mod builder;

pub use builder::*;

use std::collections::HashMap;

use er_schema::Mode;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Lookup key of an entity instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceKey {
    pub entity_type: String,
    pub id: String,
}

impl InstanceKey {
    /// Create a key from a type name and an id.
    pub fn new(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }
}

impl std::fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.entity_type, self.id)
    }
}

/// Mode-specific part of a relationship instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossingPayload {
    Query,
    /// The rendered crossing sentence (may be blank).
    TextWalk { sentence: String },
}

/// One directed crossing, stored on its source instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipInstance {
    pub target: InstanceKey,
    pub payload: CrossingPayload,
}

impl RelationshipInstance {
    /// Create a crossing with the given payload.
    pub fn new(target: InstanceKey, payload: CrossingPayload) -> Self {
        Self { target, payload }
    }

    /// The crossing sentence, if this is a non-blank text-walk crossing.
    pub fn sentence(&self) -> Option<&str> {
        match &self.payload {
            CrossingPayload::TextWalk { sentence } if !sentence.is_empty() => Some(sentence.as_str()),
            _ => None,
        }
    }
}

/// Mode-specific part of an entity instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstancePayload {
    /// Captured values by attribute name.
    Query {
        attributes: HashMap<String, Vec<String>>,
    },
    /// Rendered attribute sentences not yet consumed by a walk.
    TextWalk { sentences: Vec<String>, deleted: bool },
}

/// A node of the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityInstance {
    pub entity_type: String,
    pub id: String,
    /// Crossings in discovery order.
    pub relationships: Vec<RelationshipInstance>,
    pub payload: InstancePayload,
}

impl EntityInstance {
    /// Create an empty instance for the given mode.
    pub fn new(mode: Mode, entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        let payload = match mode {
            Mode::Query => InstancePayload::Query {
                attributes: HashMap::new(),
            },
            Mode::TextWalk => InstancePayload::TextWalk {
                sentences: Vec::new(),
                deleted: false,
            },
        };
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
            relationships: Vec::new(),
            payload,
        }
    }

    /// The lookup key of this instance.
    pub fn key(&self) -> InstanceKey {
        InstanceKey::new(&self.entity_type, &self.id)
    }

    /// Append a captured value (query mode only).
    pub fn add_value(&mut self, attribute: &str, value: impl Into<String>) {
        if let InstancePayload::Query { attributes } = &mut self.payload {
            attributes
                .entry(attribute.to_string())
                .or_default()
                .push(value.into());
        }
    }

    /// Captured values of an attribute.
    pub fn values(&self, attribute: &str) -> &[String] {
        match &self.payload {
            InstancePayload::Query { attributes } => attributes
                .get(attribute)
                .map(|v| v.as_slice())
                .unwrap_or(&[]),
            InstancePayload::TextWalk { .. } => &[],
        }
    }

    /// Append a rendered sentence (text-walk mode only).
    pub fn add_sentence(&mut self, sentence: impl Into<String>) {
        if let InstancePayload::TextWalk { sentences, .. } = &mut self.payload {
            sentences.push(sentence.into());
        }
    }

    /// Unconsumed sentences.
    pub fn sentences(&self) -> &[String] {
        match &self.payload {
            InstancePayload::TextWalk { sentences, .. } => sentences.as_slice(),
            InstancePayload::Query { .. } => &[],
        }
    }

    /// Take the next unconsumed sentence.
    pub fn pop_sentence(&mut self) -> Option<String> {
        match &mut self.payload {
            InstancePayload::TextWalk { sentences, .. } => sentences.pop(),
            InstancePayload::Query { .. } => None,
        }
    }

    /// Take the next unconsumed crossing.
    pub fn pop_relationship(&mut self) -> Option<RelationshipInstance> {
        self.relationships.pop()
    }

    /// Whether a walk has deleted this instance.
    pub fn is_deleted(&self) -> bool {
        matches!(self.payload, InstancePayload::TextWalk { deleted: true, .. })
    }

    /// Mark this instance deleted.
    pub fn mark_deleted(&mut self) {
        if let InstancePayload::TextWalk { deleted, .. } = &mut self.payload {
            *deleted = true;
        }
    }

    /// Whether nothing is left to emit from this instance.
    pub fn is_exhausted(&self) -> bool {
        self.sentences().is_empty() && self.relationships.is_empty()
    }

    /// Crossings leading to instances of the given type.
    pub fn relationships_to<'a>(
        &'a self,
        entity_type: &'a str,
    ) -> impl Iterator<Item = &'a RelationshipInstance> + 'a {
        self.relationships
            .iter()
            .filter(move |r| r.target.entity_type == entity_type)
    }

    fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if let InstancePayload::TextWalk { sentences, .. } = &mut self.payload {
            sentences.shuffle(rng);
        }
        self.relationships.shuffle(rng);
    }
}

/// The main graph structure.
///
/// A two-level map from type name to id to instance. Callers must serialize
/// all writes to one database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Database {
    mode: Mode,
    instances: HashMap<String, HashMap<String, EntityInstance>>,
}

impl Database {
    /// Create an empty graph for the given mode.
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            instances: HashMap::new(),
        }
    }

    /// The traversal mode of this graph.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Find an instance, creating an empty one if it does not exist yet.
    pub fn find_or_create(&mut self, entity_type: &str, id: &str) -> &mut EntityInstance {
        let mode = self.mode;
        self.instances
            .entry(entity_type.to_string())
            .or_default()
            .entry(id.to_string())
            .or_insert_with(|| EntityInstance::new(mode, entity_type, id))
    }

    /// Look up an instance.
    pub fn get(&self, entity_type: &str, id: &str) -> Option<&EntityInstance> {
        self.instances.get(entity_type)?.get(id)
    }

    /// Look up an instance by key.
    pub fn get_key(&self, key: &InstanceKey) -> Option<&EntityInstance> {
        self.get(&key.entity_type, &key.id)
    }

    /// Look up a mutable instance.
    pub fn get_mut(&mut self, entity_type: &str, id: &str) -> Option<&mut EntityInstance> {
        self.instances.get_mut(entity_type)?.get_mut(id)
    }

    /// Remove an instance from the graph.
    pub fn remove(&mut self, entity_type: &str, id: &str) -> Option<EntityInstance> {
        self.instances.get_mut(entity_type)?.remove(id)
    }

    /// Iterate over all instances of a type.
    pub fn instances<'a>(&'a self, entity_type: &str) -> impl Iterator<Item = &'a EntityInstance> {
        self.instances
            .get(entity_type)
            .into_iter()
            .flat_map(|ids| ids.values())
    }

    /// Ids of all instances of a type, sorted.
    pub fn ids(&self, entity_type: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .instances
            .get(entity_type)
            .map(|ids| ids.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Number of live instances of a type.
    pub fn count(&self, entity_type: &str) -> usize {
        self.instances.get(entity_type).map(|ids| ids.len()).unwrap_or(0)
    }

    /// Number of live instances across all types.
    pub fn total_count(&self) -> usize {
        self.instances.values().map(|ids| ids.len()).sum()
    }

    /// Names of all types with at least one instance, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .instances
            .iter()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort();
        names
    }

    /// Record one crossing: a forward instance on the source pointing at the
    /// target and a reverse instance on the target pointing at the source.
    /// Both endpoints are created if needed.
    pub fn link(
        &mut self,
        source: &InstanceKey,
        target: &InstanceKey,
        forward: CrossingPayload,
        reverse: CrossingPayload,
    ) {
        self.find_or_create(&source.entity_type, &source.id)
            .relationships
            .push(RelationshipInstance::new(target.clone(), forward));
        self.find_or_create(&target.entity_type, &target.id)
            .relationships
            .push(RelationshipInstance::new(source.clone(), reverse));
    }

    /// Post-load hook.
    ///
    /// In text-walk mode, shuffles each instance's sentences and crossings
    /// once, so walk order is pseudo-random but fixed for this load.
    pub fn finish_load<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.mode != Mode::TextWalk {
            return;
        }
        let mut names: Vec<String> = self.instances.keys().cloned().collect();
        names.sort();
        for name in names {
            let Some(ids) = self.instances.get_mut(&name) else {
                continue;
            };
            let mut keys: Vec<&String> = ids.keys().collect();
            keys.sort();
            let keys: Vec<String> = keys.into_iter().cloned().collect();
            for id in keys {
                if let Some(instance) = ids.get_mut(&id) {
                    instance.shuffle(rng);
                }
            }
        }
        debug!(instances = self.total_count(), "shuffled walk material");
    }
}
