//! Schema registry
//!
//! A caller-owned name → [`EntitySchema`] table. The registry is an ordinary
//! value constructed by the application and passed by reference into the
//! normalizer and denormalizer; there is no process-wide instance, so tests
//! and independent stores stay isolated.

use crate::error::{Error, Result};
use crate::schema::{EntitySchema, Schema};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Caller-owned registry of entity schemas
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, EntitySchema>,
}

/// Non-fatal finding from [`SchemaRegistry::validate`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SchemaIssue {
    /// A registered entity type no relation reaches
    ///
    /// Roots legitimately have no incoming relation; this is a diagnostic,
    /// never an error.
    UnreachableEntity {
        /// The unreachable entity type name
        name: String,
    },
}

impl SchemaRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema under its name
    ///
    /// # Errors
    /// Returns [`Error::DuplicateSchema`] if the name is taken. Use
    /// [`register_overwrite`](Self::register_overwrite) to replace.
    pub fn register(&mut self, schema: EntitySchema) -> Result<()> {
        if self.schemas.contains_key(&schema.name) {
            return Err(Error::DuplicateSchema(schema.name));
        }
        self.schemas.insert(schema.name.clone(), schema);
        Ok(())
    }

    /// Register a schema, replacing any existing one with the same name
    pub fn register_overwrite(&mut self, schema: EntitySchema) {
        self.schemas.insert(schema.name.clone(), schema);
    }

    /// Look up a schema by name
    ///
    /// # Errors
    /// Returns [`Error::SchemaNotFound`] when absent.
    pub fn get(&self, name: &str) -> Result<&EntitySchema> {
        self.schemas
            .get(name)
            .ok_or_else(|| Error::SchemaNotFound(name.to_string()))
    }

    /// Look up a schema by name, `None` when absent
    pub fn get_opt(&self, name: &str) -> Option<&EntitySchema> {
        self.schemas.get(name)
    }

    /// True when a schema with this name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    /// Registered schema names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    /// Number of registered schemas
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// True when no schema is registered
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Validate the registry as a whole
    ///
    /// Every entity reference and union variant target must name a
    /// registered schema. Registered types reachable from no relation are
    /// reported as [`SchemaIssue::UnreachableEntity`] diagnostics but do not
    /// fail validation.
    ///
    /// # Errors
    /// Returns [`Error::InvalidSchema`] naming the first unresolved target.
    pub fn validate(&self) -> Result<Vec<SchemaIssue>> {
        let mut referenced: BTreeSet<&str> = BTreeSet::new();

        for schema in self.schemas.values() {
            for (field, relation) in &schema.relations {
                self.collect_targets(relation, &schema.name, field, &mut referenced)?;
            }
        }

        let issues = self
            .schemas
            .keys()
            .filter(|name| !referenced.contains(name.as_str()))
            .map(|name| SchemaIssue::UnreachableEntity { name: name.clone() })
            .collect();
        Ok(issues)
    }

    fn collect_targets<'a>(
        &'a self,
        schema: &'a Schema,
        owner: &str,
        field: &str,
        referenced: &mut BTreeSet<&'a str>,
    ) -> Result<()> {
        match schema {
            Schema::Value => Ok(()),
            Schema::Entity(target) => {
                if !self.contains(target) {
                    return Err(Error::InvalidSchema(format!(
                        "relation '{owner}.{field}' targets unregistered schema '{target}'"
                    )));
                }
                referenced.insert(target);
                Ok(())
            }
            Schema::Array(inner) => self.collect_targets(inner, owner, field, referenced),
            Schema::Object(shape) => {
                for (inner_field, inner) in shape {
                    self.collect_targets(inner, owner, inner_field, referenced)?;
                }
                Ok(())
            }
            Schema::Union(union) => {
                for (tag, target) in &union.variants {
                    if !self.contains(target) {
                        return Err(Error::InvalidSchema(format!(
                            "union '{owner}.{field}' variant '{tag}' targets unregistered schema '{target}'"
                        )));
                    }
                    referenced.insert(target);
                }
                Ok(())
            }
        }
    }
}
