//! Core types for the planar store
//!
//! This crate defines the foundational model shared by every component:
//! - Entity, EntityMap, NormalizedEntities: the canonical flat store
//! - Schema, EntitySchema, UnionSchema: compositional schema nodes
//! - SchemaRegistry: caller-owned schema name table
//! - Timestamp: microsecond time representation
//! - Error: structural error hierarchy
//!
//! Higher layers (normalization, integrity checking, monitoring) build on
//! these types and live in their own crates.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod entity;
pub mod error;
pub mod registry;
pub mod schema;
pub mod timestamp;

pub use entity::{
    get_entity, id_from_value, merge_entities, remove_entity, shallow_merge, update_entity,
    Entity, EntityId, EntityMap, NormalizedEntities,
};
pub use error::{Error, Result};
pub use registry::{SchemaIssue, SchemaRegistry};
pub use schema::{EntitySchema, Schema, UnionSchema, DEFAULT_ID_FIELD};
pub use timestamp::Timestamp;
