//! Repair engine
//!
//! Applies the mechanical repairs attached to a report's violations. The
//! input store is deep-cloned first; the caller decides whether to adopt
//! the result. `Create` repairs are never auto-applied — creating entities
//! requires knowledge only the application has — and land in `remaining`
//! alongside violations with no repair at all.
//!
//! A caller-supplied handler registered for a violation kind intercepts
//! before the mechanical action; returning `true` marks the violation
//! handled.

use crate::report::IntegrityReport;
use crate::violation::{IntegrityViolation, RepairAction, Severity, ViolationKind};
use planar_core::{shallow_merge, NormalizedEntities};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Intercepts repairs for one violation kind; true means handled
pub type RepairHandler =
    Arc<dyn Fn(&IntegrityViolation, &mut NormalizedEntities) -> bool + Send + Sync>;

/// Options controlling one repair pass
#[derive(Clone, Default)]
pub struct RepairOptions {
    /// Only repair error-severity violations
    pub errors_only: bool,
    /// Compute every decision but return the input store untouched
    pub dry_run: bool,
    handlers: Vec<(ViolationKind, RepairHandler)>,
}

impl RepairOptions {
    /// Options with no handlers, repairing everything, mutating the clone
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the pass to error-severity violations
    pub fn errors_only(mut self) -> Self {
        self.errors_only = true;
        self
    }

    /// Compute decisions without producing a mutated store
    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    /// Register a handler for one violation kind
    pub fn with_handler(
        mut self,
        kind: ViolationKind,
        handler: impl Fn(&IntegrityViolation, &mut NormalizedEntities) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.handlers.push((kind, Arc::new(handler)));
        self
    }

    fn handler_for(&self, kind: ViolationKind) -> Option<&RepairHandler> {
        self.handlers
            .iter()
            .find(|(handled, _)| *handled == kind)
            .map(|(_, handler)| handler)
    }
}

impl fmt::Debug for RepairOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepairOptions")
            .field("errors_only", &self.errors_only)
            .field("dry_run", &self.dry_run)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// What happened to one violation during a repair pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairRecord {
    /// Type of the repaired entity
    pub entity_type: String,
    /// Id of the repaired entity
    pub entity_id: String,
    /// Kind of the originating violation
    pub kind: ViolationKind,
    /// Action applied; `None` when a handler intercepted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<RepairAction>,
    /// Whether the repair took effect
    pub success: bool,
    /// Failure detail for unsuccessful repairs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Outcome of one repair pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairOutcome {
    /// The repaired store (the untouched input when `dry_run` is set)
    pub entities: NormalizedEntities,
    /// Per-violation results, in application order
    pub repairs: Vec<RepairRecord>,
    /// Violations left unaddressed: no repair, deferred `Create`, or a
    /// failed action
    pub remaining: Vec<IntegrityViolation>,
}

/// Apply the repairs in `report` against a deep clone of `entities`
pub fn repair(
    entities: &NormalizedEntities,
    report: &IntegrityReport,
    options: &RepairOptions,
) -> RepairOutcome {
    let mut working = entities.clone();
    let mut repairs = Vec::new();
    let mut remaining = Vec::new();

    for violation in &report.violations {
        if options.errors_only && violation.severity != Severity::Error {
            continue;
        }
        apply_one(violation, options, &mut working, &mut repairs, &mut remaining);
    }

    debug!(
        applied = repairs.iter().filter(|r| r.success).count(),
        remaining = remaining.len(),
        dry_run = options.dry_run,
        "repair pass finished"
    );

    RepairOutcome {
        entities: if options.dry_run {
            entities.clone()
        } else {
            working
        },
        repairs,
        remaining,
    }
}

fn apply_one(
    violation: &IntegrityViolation,
    options: &RepairOptions,
    working: &mut NormalizedEntities,
    repairs: &mut Vec<RepairRecord>,
    remaining: &mut Vec<IntegrityViolation>,
) {
    let record = |action, success, message: Option<String>| RepairRecord {
        entity_type: violation.entity_type.clone(),
        entity_id: violation.entity_id.clone(),
        kind: violation.kind,
        action,
        success,
        message,
    };

    if let Some(handler) = options.handler_for(violation.kind) {
        if handler(violation, working) {
            repairs.push(record(None, true, None));
            return;
        }
    }

    let Some(proposed) = &violation.repair else {
        remaining.push(violation.clone());
        return;
    };

    match proposed.action {
        RepairAction::Delete => {
            working.remove(&violation.entity_type, &violation.entity_id);
            // deleting an already-absent entity still reaches the goal state
            repairs.push(record(Some(RepairAction::Delete), true, None));
        }
        RepairAction::Update => match &proposed.data {
            Some(data) => match working.get_mut(&violation.entity_type, &violation.entity_id) {
                Some(entity) => {
                    shallow_merge(entity, data.clone());
                    repairs.push(record(Some(RepairAction::Update), true, None));
                }
                None => {
                    repairs.push(record(
                        Some(RepairAction::Update),
                        false,
                        Some("entity no longer exists".to_string()),
                    ));
                    remaining.push(violation.clone());
                }
            },
            None => {
                repairs.push(record(
                    Some(RepairAction::Update),
                    false,
                    Some("update repair carries no data".to_string()),
                ));
                remaining.push(violation.clone());
            }
        },
        RepairAction::Nullify => match &proposed.field {
            Some(field) => match working.get_mut(&violation.entity_type, &violation.entity_id) {
                Some(entity) => {
                    entity.insert(field.clone(), Value::Null);
                    repairs.push(record(Some(RepairAction::Nullify), true, None));
                }
                None => {
                    repairs.push(record(
                        Some(RepairAction::Nullify),
                        false,
                        Some("entity no longer exists".to_string()),
                    ));
                    remaining.push(violation.clone());
                }
            },
            None => {
                repairs.push(record(
                    Some(RepairAction::Nullify),
                    false,
                    Some("nullify repair names no field".to_string()),
                ));
                remaining.push(violation.clone());
            }
        },
        RepairAction::Create => {
            // deferred to the application
            remaining.push(violation.clone());
        }
    }
}
