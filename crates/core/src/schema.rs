//! Schema model
//!
//! Schemas describe how nested application views map onto the flat store.
//! They are built compositionally from five node kinds:
//!
//! - `Value`: passthrough leaf, never stored
//! - `Entity`: a reference *by name* to a registered [`EntitySchema`]
//! - `Array`: homogeneous list of an inner schema
//! - `Object`: plain object with a declared shape; undeclared fields pass
//!   through untouched
//! - `Union`: one of several entity schemas, selected by an explicit
//!   discriminant field in the data
//!
//! Entity nodes carry only the target name. The name is resolved through a
//! [`SchemaRegistry`](crate::registry::SchemaRegistry) at
//! normalization/denormalization time, which is what makes cyclic schema
//! graphs (user ↔ post) representable without reference cycles.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default id field name for entity schemas
pub const DEFAULT_ID_FIELD: &str = "id";

/// A schema node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Schema {
    /// Passthrough leaf: the value is copied, never stored
    Value,
    /// Reference to a registered entity schema, by name
    Entity(String),
    /// Array of an inner schema
    Array(Box<Schema>),
    /// Object with a declared shape
    Object(BTreeMap<String, Schema>),
    /// One of several entity schemas, discriminated by a data field
    Union(UnionSchema),
}

impl Schema {
    /// Passthrough leaf schema
    pub fn value() -> Self {
        Schema::Value
    }

    /// Reference to the entity schema registered under `name`
    pub fn entity(name: impl Into<String>) -> Self {
        Schema::Entity(name.into())
    }

    /// Array of `inner`
    pub fn array(inner: Schema) -> Self {
        Schema::Array(Box::new(inner))
    }

    /// Object with the given declared fields
    pub fn object<I, K>(shape: I) -> Self
    where
        I: IntoIterator<Item = (K, Schema)>,
        K: Into<String>,
    {
        Schema::Object(shape.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Union over entity schemas
    pub fn union(union: UnionSchema) -> Self {
        Schema::Union(union)
    }
}

/// Schema for one entity type
///
/// `relations` lists the fields whose values are governed by a nested
/// schema; every other field is opaque payload. The id field (default
/// `"id"`) must be present in every input record of this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySchema {
    /// Entity type name; also the key of this type's map in the flat store
    pub name: String,
    /// Field holding the record id
    pub id_field: String,
    /// Relation fields: field name → governing schema
    pub relations: BTreeMap<String, Schema>,
}

impl EntitySchema {
    /// Create an entity schema with the default id field and no relations
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id_field: DEFAULT_ID_FIELD.to_string(),
            relations: BTreeMap::new(),
        }
    }

    /// Override the id field name
    pub fn id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field = field.into();
        self
    }

    /// Declare a relation field
    pub fn relation(mut self, field: impl Into<String>, schema: Schema) -> Self {
        self.relations.insert(field.into(), schema);
        self
    }
}

/// Union of entity schemas, resolved by an explicit discriminant field
///
/// The discriminant value in the input selects a variant; membership probing
/// against the store is not performed, so entity types sharing an id space
/// stay unambiguous. Normalized union references keep the tag alongside the
/// id (`{"id": …, "<discriminant>": …}`) so denormalization can route back
/// without probing either.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnionSchema {
    /// Field in the data carrying the variant tag
    pub discriminant: String,
    /// Variant tag → entity schema name
    pub variants: BTreeMap<String, String>,
}

impl UnionSchema {
    /// Create a union resolved by `discriminant`
    pub fn new(discriminant: impl Into<String>) -> Self {
        Self {
            discriminant: discriminant.into(),
            variants: BTreeMap::new(),
        }
    }

    /// Declare a variant: inputs tagged `tag` normalize as `entity_name`
    pub fn variant(mut self, tag: impl Into<String>, entity_name: impl Into<String>) -> Self {
        self.variants.insert(tag.into(), entity_name.into());
        self
    }

    /// Entity schema name for a tag value
    pub fn resolve(&self, tag: &str) -> Option<&str> {
        self.variants.get(tag).map(String::as_str)
    }
}
