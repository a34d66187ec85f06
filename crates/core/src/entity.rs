//! Entity model for the flat store
//!
//! This module defines the canonical flat representation:
//! - EntityId: string id, stable for a record's lifetime
//! - Entity: one record, a JSON object keyed by field name
//! - EntityMap: id → Entity, one map per entity type
//! - NormalizedEntities: type name → EntityMap, the canonical store
//!
//! The store is owned by the application layer. Core components read and
//! transform a supplied reference; they never retain a private mutable copy.
//! All merges are shallow: a later record for the same id overwrites fields
//! it carries and leaves the rest intact, so repeated partial payloads
//! accumulate.
//!
//! `BTreeMap` is used at both levels so iteration order is deterministic —
//! snapshot digests and drift comparison depend on that.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

/// Entity id, unique within its type
pub type EntityId = String;

/// One entity record: field name → JSON value
pub type Entity = serde_json::Map<String, Value>;

/// All entities of one type, keyed by id
pub type EntityMap = BTreeMap<EntityId, Entity>;

/// Canonicalize an id value read from input data
///
/// Ids may appear as JSON strings or integers; integers map to their decimal
/// string so `9` and `"9"` address the same record.
pub fn id_from_value(value: &Value) -> Option<EntityId> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Shallow-merge `from` into `into`, last write wins per field
pub fn shallow_merge(into: &mut Entity, from: Entity) {
    for (field, value) in from {
        into.insert(field, value);
    }
}

/// The canonical flat store: entity type → (id → record)
///
/// A thin newtype over nested `BTreeMap`s. Derefs to the inner map so
/// callers can iterate and index directly; the inherent methods add the
/// merge semantics the rest of the system relies on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedEntities(BTreeMap<String, EntityMap>);

impl NormalizedEntities {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up one entity by type and id
    pub fn get(&self, entity_type: &str, id: &str) -> Option<&Entity> {
        self.0.get(entity_type).and_then(|map| map.get(id))
    }

    /// Mutable lookup by type and id
    pub fn get_mut(&mut self, entity_type: &str, id: &str) -> Option<&mut Entity> {
        self.0.get_mut(entity_type).and_then(|map| map.get_mut(id))
    }

    /// True when an entity of this type and id exists
    pub fn contains(&self, entity_type: &str, id: &str) -> bool {
        self.get(entity_type, id).is_some()
    }

    /// Shallow-merge a record into `entity_type` under `id`
    ///
    /// Creates the type map on first use. An existing record with the same
    /// id keeps fields the new record does not carry.
    pub fn upsert(&mut self, entity_type: &str, id: &str, entity: Entity) {
        let map = self.0.entry(entity_type.to_string()).or_default();
        match map.get_mut(id) {
            Some(existing) => shallow_merge(existing, entity),
            None => {
                map.insert(id.to_string(), entity);
            }
        }
    }

    /// Remove one entity, returning it if present
    ///
    /// An emptied type map is dropped so entity counts only list types that
    /// still hold records.
    pub fn remove(&mut self, entity_type: &str, id: &str) -> Option<Entity> {
        let map = self.0.get_mut(entity_type)?;
        let removed = map.remove(id);
        if map.is_empty() {
            self.0.remove(entity_type);
        }
        removed
    }

    /// Shallow-merge every record of `other` into this store
    pub fn merge(&mut self, other: NormalizedEntities) {
        for (entity_type, map) in other.0 {
            for (id, entity) in map {
                self.upsert(&entity_type, &id, entity);
            }
        }
    }

    /// Per-type record counts
    pub fn entity_counts(&self) -> BTreeMap<String, usize> {
        self.0
            .iter()
            .map(|(entity_type, map)| (entity_type.clone(), map.len()))
            .collect()
    }

    /// Entity type names present in the store
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Ids of all entities of one type, in sorted order
    pub fn ids(&self, entity_type: &str) -> Vec<&str> {
        self.0
            .get(entity_type)
            .map(|map| map.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Total number of records across all types
    pub fn total_len(&self) -> usize {
        self.0.values().map(BTreeMap::len).sum()
    }
}

impl Deref for NormalizedEntities {
    type Target = BTreeMap<String, EntityMap>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for NormalizedEntities {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl FromIterator<(String, EntityMap)> for NormalizedEntities {
    fn from_iter<I: IntoIterator<Item = (String, EntityMap)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// =============================================================================
// Free-function store API
// =============================================================================

/// Merge two stores into a new one; `b`'s fields win on overlap
pub fn merge_entities(a: &NormalizedEntities, b: &NormalizedEntities) -> NormalizedEntities {
    let mut merged = a.clone();
    merged.merge(b.clone());
    merged
}

/// Look up one entity by type and id
pub fn get_entity<'a>(
    entity_type: &str,
    id: &str,
    entities: &'a NormalizedEntities,
) -> Option<&'a Entity> {
    entities.get(entity_type, id)
}

/// Shallow-merge a partial record over an existing (or new) entity
pub fn update_entity(entities: &mut NormalizedEntities, entity_type: &str, id: &str, patch: Entity) {
    entities.upsert(entity_type, id, patch);
}

/// Remove one entity from the store
pub fn remove_entity(
    entities: &mut NormalizedEntities,
    entity_type: &str,
    id: &str,
) -> Option<Entity> {
    entities.remove(entity_type, id)
}
