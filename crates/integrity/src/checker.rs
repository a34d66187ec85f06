//! Integrity checker
//!
//! Scans a supplied store against configured relation, constraint, and
//! anomaly rules. Per entity type, per entity, in order: referential
//! integrity, then custom constraints; after the full scan, orphan
//! detection (opt-in) and anomaly rules.
//!
//! `check()` never fails for data problems — every finding surfaces as a
//! violation in the report. Panics from rule closures are not caught.

use crate::anomaly::AnomalyRule;
use crate::constraint::ConstraintDefinition;
use crate::relation::{OnDelete, RelationDefinition};
use crate::report::{CheckStats, IntegrityReport};
use crate::violation::{EntityRef, IntegrityViolation, Repair, Severity, ViolationKind};
use planar_core::{id_from_value, Entity, NormalizedEntities, Timestamp};
use rustc_hash::FxHashSet;
use serde_json::Value;
use std::time::Instant;
use tracing::debug;

/// Checker configuration
///
/// Relations are plain data; constraints and anomaly rules carry closures,
/// so the config as a whole is not serializable — reports are.
#[derive(Debug, Clone, Default)]
pub struct CheckerConfig {
    /// Relation rules to enforce
    pub relations: Vec<RelationDefinition>,
    /// Custom per-entity-type constraints
    pub constraints: Vec<ConstraintDefinition>,
    /// Whole-store anomaly rules
    pub anomaly_rules: Vec<AnomalyRule>,
    /// Flag relation-target entities nothing references
    pub detect_orphans: bool,
    /// Stop scanning at the first error-severity violation
    pub fail_fast: bool,
    /// Restrict scanning to these entity types (`None` = all)
    pub entity_types: Option<Vec<String>>,
}

/// Scans stores for integrity violations and drives repairs
#[derive(Debug, Clone, Default)]
pub struct IntegrityChecker {
    config: CheckerConfig,
}

impl IntegrityChecker {
    /// Create a checker from a configuration
    pub fn new(config: CheckerConfig) -> Self {
        Self { config }
    }

    /// Add a relation rule
    pub fn add_relation(&mut self, relation: RelationDefinition) {
        self.config.relations.push(relation);
    }

    /// Add a custom constraint
    pub fn add_constraint(&mut self, constraint: ConstraintDefinition) {
        self.config.constraints.push(constraint);
    }

    /// Add an anomaly rule
    pub fn add_anomaly_rule(&mut self, rule: AnomalyRule) {
        self.config.anomaly_rules.push(rule);
    }

    /// The active configuration
    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// Apply the repairs attached to `report`'s violations
    ///
    /// Convenience wrapper around [`crate::repair::repair`].
    pub fn repair(
        &self,
        entities: &NormalizedEntities,
        report: &IntegrityReport,
        options: &crate::repair::RepairOptions,
    ) -> crate::repair::RepairOutcome {
        crate::repair::repair(entities, report, options)
    }

    /// Check the whole store
    pub fn check(&self, entities: &NormalizedEntities) -> IntegrityReport {
        let started = Instant::now();
        let timestamp = Timestamp::now();
        let mut violations = Vec::new();
        let mut stats = CheckStats::default();

        'scan: for (entity_type, map) in entities.iter() {
            if !self.type_in_scope(entity_type) {
                continue;
            }
            for (id, entity) in map {
                stats.entities_checked += 1;
                self.check_one(entity_type, id, entity, entities, &mut violations, &mut stats);
                if self.config.fail_fast && violations.iter().any(IntegrityViolation::is_error) {
                    stats.aborted = true;
                    break 'scan;
                }
            }
        }

        if !stats.aborted && self.config.detect_orphans {
            self.detect_orphans(entities, &mut violations, &mut stats);
            if self.config.fail_fast && violations.iter().any(IntegrityViolation::is_error) {
                stats.aborted = true;
            }
        }

        if !stats.aborted {
            for rule in &self.config.anomaly_rules {
                stats.anomaly_rules_run += 1;
                for violation in rule.run(entities) {
                    stats.count(violation.severity);
                    violations.push(violation);
                }
                if self.config.fail_fast && violations.iter().any(IntegrityViolation::is_error) {
                    stats.aborted = true;
                    break;
                }
            }
        }

        let valid = !violations.iter().any(IntegrityViolation::is_error);
        let report = IntegrityReport {
            valid,
            timestamp,
            duration_micros: started.elapsed().as_micros() as u64,
            entity_counts: entities.entity_counts(),
            violations,
            stats,
        };
        debug!(
            valid = report.valid,
            violations = report.violations.len(),
            entities = report.stats.entities_checked,
            duration_micros = report.duration_micros,
            "integrity check finished"
        );
        report
    }

    /// Check one entity: referential rules and constraints only
    ///
    /// Whole-store passes (orphans, anomalies) need the full scan and are
    /// not run here. An unknown type or id yields no violations.
    pub fn check_entity(
        &self,
        entity_type: &str,
        id: &str,
        entities: &NormalizedEntities,
    ) -> Vec<IntegrityViolation> {
        let mut violations = Vec::new();
        let mut stats = CheckStats::default();
        if let Some(entity) = entities.get(entity_type, id) {
            self.check_one(entity_type, id, entity, entities, &mut violations, &mut stats);
        }
        violations
    }

    fn type_in_scope(&self, entity_type: &str) -> bool {
        match &self.config.entity_types {
            Some(types) => types.iter().any(|t| t == entity_type),
            None => true,
        }
    }

    fn check_one(
        &self,
        entity_type: &str,
        id: &str,
        entity: &Entity,
        entities: &NormalizedEntities,
        violations: &mut Vec<IntegrityViolation>,
        stats: &mut CheckStats,
    ) {
        for relation in &self.config.relations {
            if relation.from != entity_type {
                continue;
            }
            stats.relations_checked += 1;
            let before = violations.len();
            self.check_relation(relation, entity_type, id, entity, entities, violations);
            for violation in &violations[before..] {
                stats.count(violation.severity);
            }
        }

        for constraint in &self.config.constraints {
            if constraint.entity_type != entity_type {
                continue;
            }
            stats.constraints_checked += 1;
            if !constraint.validate(entity, entities) {
                let mut violation = IntegrityViolation::new(
                    ViolationKind::Constraint,
                    constraint.severity,
                    entity_type,
                    id,
                    format!("constraint '{}' failed: {}", constraint.name, constraint.message),
                );
                if let Some(repair) = constraint.repair_for(entity) {
                    violation = violation.with_repair(repair);
                }
                stats.count(violation.severity);
                violations.push(violation);
            }
        }
    }

    fn check_relation(
        &self,
        relation: &RelationDefinition,
        entity_type: &str,
        id: &str,
        entity: &Entity,
        entities: &NormalizedEntities,
        violations: &mut Vec<IntegrityViolation>,
    ) {
        let severity = if relation.required {
            Severity::Error
        } else {
            Severity::Warning
        };
        let value = entity.get(&relation.field);

        if relation.is_array {
            let ids = match value {
                Some(Value::Array(items)) => items,
                Some(Value::Null) | None => {
                    if relation.required {
                        violations.push(self.relation_violation(
                            relation,
                            entity_type,
                            id,
                            severity,
                            format!("required relation '{}' is missing", relation.field),
                            None,
                        ));
                    }
                    return;
                }
                Some(other) => {
                    violations.push(self.relation_violation(
                        relation,
                        entity_type,
                        id,
                        severity,
                        format!(
                            "relation '{}' should be an id array, found {}",
                            relation.field,
                            planar_core::Error::shape_of(other)
                        ),
                        None,
                    ));
                    return;
                }
            };
            // one violation per dangling id; every repair carries the fully
            // pruned array so stacked repairs for the same field converge
            let dangling: Vec<String> = ids
                .iter()
                .filter_map(referenced_id)
                .filter(|target_id| !entities.contains(&relation.to, target_id))
                .collect();
            if dangling.is_empty() {
                return;
            }
            let pruned: Vec<Value> = ids
                .iter()
                .filter(|item| match referenced_id(item) {
                    Some(target_id) => entities.contains(&relation.to, &target_id),
                    None => true,
                })
                .cloned()
                .collect();
            for target_id in dangling {
                let repair = match relation.on_delete {
                    OnDelete::Restrict | OnDelete::NoAction => None,
                    OnDelete::Cascade | OnDelete::SetNull => {
                        let mut data = Entity::new();
                        data.insert(relation.field.clone(), Value::Array(pruned.clone()));
                        Some(Repair::update(data))
                    }
                };
                let mut violation = self.relation_violation(
                    relation,
                    entity_type,
                    id,
                    severity,
                    format!(
                        "relation '{}' references missing {} '{}'",
                        relation.field, relation.to, target_id
                    ),
                    repair,
                );
                violation =
                    violation.with_related(vec![EntityRef::new(relation.to.clone(), target_id)]);
                violations.push(violation);
            }
            return;
        }

        let target_id = match value {
            Some(Value::Null) | None => {
                if relation.required {
                    violations.push(self.relation_violation(
                        relation,
                        entity_type,
                        id,
                        severity,
                        format!("required relation '{}' is missing", relation.field),
                        self.singular_repair(relation),
                    ));
                }
                return;
            }
            Some(other) => match referenced_id(other) {
                Some(target_id) => target_id,
                None => {
                    violations.push(self.relation_violation(
                        relation,
                        entity_type,
                        id,
                        severity,
                        format!(
                            "relation '{}' should hold an id, found {}",
                            relation.field,
                            planar_core::Error::shape_of(other)
                        ),
                        None,
                    ));
                    return;
                }
            },
        };

        if !entities.contains(&relation.to, &target_id) {
            let mut violation = self.relation_violation(
                relation,
                entity_type,
                id,
                severity,
                format!(
                    "relation '{}' references missing {} '{}'",
                    relation.field, relation.to, target_id
                ),
                self.singular_repair(relation),
            );
            violation = violation.with_related(vec![EntityRef::new(relation.to.clone(), target_id)]);
            violations.push(violation);
        }
    }

    fn relation_violation(
        &self,
        relation: &RelationDefinition,
        entity_type: &str,
        id: &str,
        severity: Severity,
        message: String,
        repair: Option<Repair>,
    ) -> IntegrityViolation {
        let mut violation = IntegrityViolation::new(
            ViolationKind::Referential,
            severity,
            entity_type,
            id,
            message,
        )
        .with_field(relation.field.clone());
        if let Some(repair) = repair {
            violation = violation.with_repair(repair);
        }
        violation
    }

    fn singular_repair(&self, relation: &RelationDefinition) -> Option<Repair> {
        match relation.on_delete {
            OnDelete::Cascade => Some(Repair::delete()),
            OnDelete::SetNull => Some(Repair::nullify(relation.field.clone())),
            OnDelete::Restrict | OnDelete::NoAction => None,
        }
    }

    fn detect_orphans(
        &self,
        entities: &NormalizedEntities,
        violations: &mut Vec<IntegrityViolation>,
        stats: &mut CheckStats,
    ) {
        let target_types: FxHashSet<&str> = self
            .config
            .relations
            .iter()
            .map(|r| r.to.as_str())
            .collect();
        if target_types.is_empty() {
            return;
        }

        // every id actually referenced through a configured relation
        let mut referenced: FxHashSet<(String, String)> = FxHashSet::default();
        for relation in &self.config.relations {
            let Some((_, map)) = entities.get_key_value(&relation.from) else {
                continue;
            };
            for entity in map.values() {
                match entity.get(&relation.field) {
                    Some(Value::Array(items)) => {
                        for item in items {
                            if let Some(target_id) = referenced_id(item) {
                                referenced.insert((relation.to.clone(), target_id));
                            }
                        }
                    }
                    Some(value) => {
                        if let Some(target_id) = referenced_id(value) {
                            referenced.insert((relation.to.clone(), target_id));
                        }
                    }
                    None => {}
                }
            }
        }

        for (entity_type, map) in entities.iter() {
            if !target_types.contains(entity_type.as_str()) || !self.type_in_scope(entity_type) {
                continue;
            }
            for id in map.keys() {
                if !referenced.contains(&(entity_type.clone(), id.clone())) {
                    let violation = IntegrityViolation::new(
                        ViolationKind::Orphan,
                        Severity::Warning,
                        entity_type.clone(),
                        id.clone(),
                        format!("{entity_type} '{id}' is referenced by nothing"),
                    )
                    .with_repair(Repair::delete());
                    stats.count(violation.severity);
                    violations.push(violation);
                }
            }
        }
    }
}

// An id reference as stored by the normalizer: a bare string/number id, or
// a union skeleton carrying an "id" member.
fn referenced_id(value: &Value) -> Option<String> {
    match value {
        Value::Object(fields) => fields.get("id").and_then(id_from_value),
        other => id_from_value(other),
    }
}
