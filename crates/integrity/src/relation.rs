//! Relation definitions
//!
//! A [`RelationDefinition`] declares an integrity rule the checker enforces:
//! entities of `from` carry `field` holding id(s) of `to` entities. These
//! normally mirror the relations on the corresponding
//! [`EntitySchema`](planar_core::EntitySchema) but are declared separately —
//! the schema drives normalization shape, the relation drives enforcement
//! and repair policy.

use serde::{Deserialize, Serialize};

/// What happens to a referrer when its target is gone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OnDelete {
    /// Delete the referring entity
    Cascade,
    /// Null out the referring field
    SetNull,
    /// Flag only; the violation is expected to block the operation upstream
    Restrict,
    /// Flag only
    NoAction,
}

/// One declared relation rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDefinition {
    /// Referring entity type
    pub from: String,
    /// Field on the referring entity holding the id(s)
    pub field: String,
    /// Referenced entity type
    pub to: String,
    /// Whether the relation must be present and satisfied
    pub required: bool,
    /// Whether the field holds an array of ids
    pub is_array: bool,
    /// Repair policy when the target is missing
    pub on_delete: OnDelete,
}

impl RelationDefinition {
    /// Declare `from.field → to`, optional, singular, no-action
    pub fn new(
        from: impl Into<String>,
        field: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            field: field.into(),
            to: to.into(),
            required: false,
            is_array: false,
            on_delete: OnDelete::NoAction,
        }
    }

    /// Mark the relation required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Mark the field as an id array
    pub fn array(mut self) -> Self {
        self.is_array = true;
        self
    }

    /// Set the repair policy
    pub fn on_delete(mut self, policy: OnDelete) -> Self {
        self.on_delete = policy;
        self
    }
}
