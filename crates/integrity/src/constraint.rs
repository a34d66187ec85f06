//! Custom constraints
//!
//! A constraint is a caller-supplied predicate over one entity (with the
//! whole store available for cross-entity checks). Failing entities produce
//! violations at the constraint's configured severity.
//!
//! ## Closure contract
//!
//! `validate` and `repair` closures must be pure reads: no mutation of
//! outside state, no I/O. A panicking closure is deliberately NOT caught —
//! a buggy rule should fail loudly during development rather than be
//! silently recorded as one more violation.

use crate::violation::{Repair, Severity};
use planar_core::{Entity, NormalizedEntities};
use std::fmt;
use std::sync::Arc;

/// Predicate over one entity; true means the constraint holds
pub type ConstraintFn = Arc<dyn Fn(&Entity, &NormalizedEntities) -> bool + Send + Sync>;

/// Computes a repair for a failing entity
pub type ConstraintRepairFn = Arc<dyn Fn(&Entity) -> Repair + Send + Sync>;

/// A named per-entity-type rule
#[derive(Clone)]
pub struct ConstraintDefinition {
    /// Rule name, surfaced in violation messages
    pub name: String,
    /// Entity type the rule applies to
    pub entity_type: String,
    /// Severity of produced violations
    pub severity: Severity,
    /// Message attached to produced violations
    pub message: String,
    validate: ConstraintFn,
    repair: Option<ConstraintRepairFn>,
}

impl ConstraintDefinition {
    /// Define a constraint at the default `Error` severity
    pub fn new(
        name: impl Into<String>,
        entity_type: impl Into<String>,
        message: impl Into<String>,
        validate: impl Fn(&Entity, &NormalizedEntities) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            entity_type: entity_type.into(),
            severity: Severity::Error,
            message: message.into(),
            validate: Arc::new(validate),
            repair: None,
        }
    }

    /// Override the severity
    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Attach a repair computed per failing entity
    pub fn with_repair(
        mut self,
        repair: impl Fn(&Entity) -> Repair + Send + Sync + 'static,
    ) -> Self {
        self.repair = Some(Arc::new(repair));
        self
    }

    /// Run the predicate
    pub fn validate(&self, entity: &Entity, all: &NormalizedEntities) -> bool {
        (self.validate)(entity, all)
    }

    /// Compute the repair for a failing entity, when one is defined
    pub fn repair_for(&self, entity: &Entity) -> Option<Repair> {
        self.repair.as_ref().map(|f| f(entity))
    }
}

impl fmt::Debug for ConstraintDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstraintDefinition")
            .field("name", &self.name)
            .field("entity_type", &self.entity_type)
            .field("severity", &self.severity)
            .field("has_repair", &self.repair.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::violation::RepairAction;
    use serde_json::json;

    #[test]
    fn test_validate_runs_predicate() {
        let constraint = ConstraintDefinition::new(
            "has-name",
            "users",
            "user has no name",
            |entity, _all| entity.get("name").map(|v| !v.is_null()).unwrap_or(false),
        );

        let mut good = Entity::new();
        good.insert("name".to_string(), json!("Alice"));
        let bad = Entity::new();
        let store = NormalizedEntities::new();

        assert!(constraint.validate(&good, &store));
        assert!(!constraint.validate(&bad, &store));
    }

    #[test]
    fn test_repair_for_computes_from_entity() {
        let constraint = ConstraintDefinition::new("x", "users", "m", |_, _| false)
            .with_repair(|_entity| Repair::nullify("name"));

        let repair = constraint.repair_for(&Entity::new()).unwrap();
        assert_eq!(repair.action, RepairAction::Nullify);
        assert_eq!(repair.field.as_deref(), Some("name"));
    }

    #[test]
    fn test_default_severity_is_error() {
        let constraint = ConstraintDefinition::new("x", "users", "m", |_, _| true);
        assert_eq!(constraint.severity, Severity::Error);
        let relaxed = constraint.severity(Severity::Info);
        assert_eq!(relaxed.severity, Severity::Info);
    }
}
