//! Integrity violations
//!
//! Violations are pure data: they are returned from checks, never raised.
//! Everything here is JSON-serializable so reports can flow straight into
//! logging and telemetry sinks.

use planar_core::Entity;
use serde::{Deserialize, Serialize};

/// How serious a violation is
///
/// Only `Error` flips a report to invalid; warnings and infos are
/// informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational finding
    Info,
    /// Suspicious but not store-invalidating
    Warning,
    /// The store is inconsistent
    Error,
}

/// What category of rule produced a violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationKind {
    /// A relation points at an entity the store does not hold
    Referential,
    /// A custom constraint failed
    Constraint,
    /// A whole-store anomaly rule fired
    Anomaly,
    /// A relation-target entity is referenced by nothing
    Orphan,
}

/// Mechanical action a repair performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepairAction {
    /// Remove the violating entity
    Delete,
    /// Shallow-merge `data` over the entity
    Update,
    /// Set one field to null
    Nullify,
    /// Create a missing entity; never auto-applied, always deferred
    Create,
}

/// A proposed repair, attached to a violation
///
/// Plain data so reports stay serializable. The repair engine interprets
/// the action; `field` accompanies `Nullify`, `data` accompanies `Update`
/// and `Create`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repair {
    /// The action to take
    pub action: RepairAction,
    /// Field operated on, for `Nullify`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Payload for `Update` / `Create`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Entity>,
}

impl Repair {
    /// Delete the violating entity
    pub fn delete() -> Self {
        Self {
            action: RepairAction::Delete,
            field: None,
            data: None,
        }
    }

    /// Shallow-merge `data` over the violating entity
    pub fn update(data: Entity) -> Self {
        Self {
            action: RepairAction::Update,
            field: None,
            data: Some(data),
        }
    }

    /// Null out one field of the violating entity
    pub fn nullify(field: impl Into<String>) -> Self {
        Self {
            action: RepairAction::Nullify,
            field: Some(field.into()),
            data: None,
        }
    }

    /// Create a missing entity (deferred; recorded but never auto-applied)
    pub fn create(data: Entity) -> Self {
        Self {
            action: RepairAction::Create,
            field: None,
            data: Some(data),
        }
    }
}

/// Reference to another entity involved in a violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    /// Entity type name
    pub entity_type: String,
    /// Entity id
    pub id: String,
}

impl EntityRef {
    /// Build a reference
    pub fn new(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }
}

/// One integrity finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityViolation {
    /// Rule category
    pub kind: ViolationKind,
    /// Finding severity
    pub severity: Severity,
    /// Type of the violating entity
    pub entity_type: String,
    /// Id of the violating entity
    pub entity_id: String,
    /// Human-readable description
    pub message: String,
    /// Field the violation concerns, when one applies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Other entities involved (e.g. the original of a duplicate)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related: Option<Vec<EntityRef>>,
    /// Mechanical repair, when one is known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repair: Option<Repair>,
}

impl IntegrityViolation {
    /// Build a violation with no field, related entities, or repair
    pub fn new(
        kind: ViolationKind,
        severity: Severity,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity,
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            message: message.into(),
            field: None,
            related: None,
            repair: None,
        }
    }

    /// Attach the field the violation concerns
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Attach related entities
    pub fn with_related(mut self, related: Vec<EntityRef>) -> Self {
        self.related = Some(related);
        self
    }

    /// Attach a mechanical repair
    pub fn with_repair(mut self, repair: Repair) -> Self {
        self.repair = Some(repair);
        self
    }

    /// True for error-severity findings
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}
