//! Anomaly rules
//!
//! Anomaly rules are whole-store scans, run after per-entity checks. Each
//! rule returns zero or more violations. Four builders cover the common
//! cases; `consistency` wraps an arbitrary scan closure.
//!
//! Like constraints, a panicking `detect` closure is not caught.

use crate::violation::{EntityRef, IntegrityViolation, Repair, Severity, ViolationKind};
use planar_core::{NormalizedEntities, Timestamp};
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Whole-store scan producing violations
pub type AnomalyDetectFn = Arc<dyn Fn(&NormalizedEntities) -> Vec<IntegrityViolation> + Send + Sync>;

/// A named whole-store anomaly rule
#[derive(Clone)]
pub struct AnomalyRule {
    /// Rule name, surfaced in violation messages
    pub name: String,
    detect: AnomalyDetectFn,
}

impl AnomalyRule {
    /// Wrap an arbitrary consistency scan
    pub fn consistency(
        name: impl Into<String>,
        detect: impl Fn(&NormalizedEntities) -> Vec<IntegrityViolation> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            detect: Arc::new(detect),
        }
    }

    /// Run the scan
    pub fn run(&self, entities: &NormalizedEntities) -> Vec<IntegrityViolation> {
        (self.detect)(entities)
    }

    /// Flag entities of `entity_type` sharing the same value tuple for
    /// `fields`
    ///
    /// The first record (in id order) holding a tuple is the original;
    /// every later one is flagged as its duplicate, warning severity with a
    /// delete repair.
    pub fn duplicate_detection(entity_type: impl Into<String>, fields: &[&str]) -> Self {
        let entity_type = entity_type.into();
        let fields: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
        let name = format!("duplicate-{entity_type}");
        let rule_type = entity_type.clone();

        Self::consistency(name, move |entities| {
            let mut seen: FxHashMap<String, String> = FxHashMap::default();
            let mut violations = Vec::new();
            let Some(map) = entities.get_key_value(&rule_type).map(|(_, m)| m) else {
                return violations;
            };
            for (id, entity) in map {
                let tuple: Vec<String> = fields
                    .iter()
                    .map(|field| {
                        entity
                            .get(field)
                            .map(|v| v.to_string())
                            .unwrap_or_else(|| "null".to_string())
                    })
                    .collect();
                let key = tuple.join("\u{1f}");
                match seen.get(&key) {
                    Some(original) => violations.push(
                        IntegrityViolation::new(
                            ViolationKind::Anomaly,
                            Severity::Warning,
                            rule_type.clone(),
                            id.clone(),
                            format!(
                                "duplicate of '{original}' on ({})",
                                fields.join(", ")
                            ),
                        )
                        .with_related(vec![EntityRef::new(rule_type.clone(), original.clone())])
                        .with_repair(Repair::delete()),
                    ),
                    None => {
                        seen.insert(key, id.clone());
                    }
                }
            }
            violations
        })
    }

    /// Flag entities whose `timestamp_field` is older than `max_age`
    ///
    /// The field must hold an integer time since the Unix epoch; seconds,
    /// milliseconds, and microseconds are disambiguated by magnitude.
    /// Info severity, no repair.
    pub fn stale_data(
        entity_type: impl Into<String>,
        timestamp_field: impl Into<String>,
        max_age: Duration,
    ) -> Self {
        let entity_type = entity_type.into();
        let timestamp_field = timestamp_field.into();
        let name = format!("stale-{entity_type}");
        let rule_type = entity_type.clone();

        Self::consistency(name, move |entities| {
            let threshold = Timestamp::now().saturating_sub(max_age);
            let mut violations = Vec::new();
            let Some(map) = entities.get_key_value(&rule_type).map(|(_, m)| m) else {
                return violations;
            };
            for (id, entity) in map {
                let Some(stamp) = entity.get(&timestamp_field).and_then(read_timestamp) else {
                    continue;
                };
                if stamp < threshold {
                    violations.push(
                        IntegrityViolation::new(
                            ViolationKind::Anomaly,
                            Severity::Info,
                            rule_type.clone(),
                            id.clone(),
                            format!(
                                "'{timestamp_field}' older than {}s",
                                max_age.as_secs()
                            ),
                        )
                        .with_field(timestamp_field.clone()),
                    );
                }
            }
            violations
        })
    }

    /// Flag entities missing (or holding null in) any of `fields`
    ///
    /// Error severity: a record without its required payload is treated as
    /// corrupt. No repair.
    pub fn required_fields(entity_type: impl Into<String>, fields: &[&str]) -> Self {
        let entity_type = entity_type.into();
        let fields: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
        let name = format!("required-fields-{entity_type}");
        let rule_type = entity_type.clone();

        Self::consistency(name, move |entities| {
            let mut violations = Vec::new();
            let Some(map) = entities.get_key_value(&rule_type).map(|(_, m)| m) else {
                return violations;
            };
            for (id, entity) in map {
                for field in &fields {
                    let missing = match entity.get(field) {
                        None => true,
                        Some(Value::Null) => true,
                        Some(_) => false,
                    };
                    if missing {
                        violations.push(
                            IntegrityViolation::new(
                                ViolationKind::Anomaly,
                                Severity::Error,
                                rule_type.clone(),
                                id.clone(),
                                format!("required field '{field}' is missing"),
                            )
                            .with_field(field.clone()),
                        );
                    }
                }
            }
            violations
        })
    }
}

impl fmt::Debug for AnomalyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnomalyRule").field("name", &self.name).finish()
    }
}

// Integer epoch time in seconds, milliseconds, or microseconds, picked by
// magnitude: values below 1e12 are seconds, below 1e15 milliseconds.
fn read_timestamp(value: &Value) -> Option<Timestamp> {
    let raw = value.as_u64()?;
    Some(if raw < 1_000_000_000_000 {
        Timestamp::from_secs(raw)
    } else if raw < 1_000_000_000_000_000 {
        Timestamp::from_millis(raw)
    } else {
        Timestamp::from_micros(raw)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store(value: Value) -> NormalizedEntities {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_duplicate_detection_flags_later_record_once() {
        let entities = store(json!({
            "posts": {
                "1": {"id": "1", "title": "Hi", "authorId": "9"},
                "2": {"id": "2", "title": "Hi", "authorId": "9"},
                "3": {"id": "3", "title": "Other", "authorId": "9"}
            }
        }));
        let rule = AnomalyRule::duplicate_detection("posts", &["title", "authorId"]);

        let violations = rule.run(&entities);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].entity_id, "2");
        assert_eq!(violations[0].kind, ViolationKind::Anomaly);
        assert_eq!(
            violations[0].related,
            Some(vec![EntityRef::new("posts", "1")])
        );
    }

    #[test]
    fn test_duplicate_detection_distinguishes_missing_from_null() {
        // absent field and explicit null must not collide with the string "null"
        let entities = store(json!({
            "posts": {
                "1": {"id": "1", "title": "null"},
                "2": {"id": "2", "title": null}
            }
        }));
        let rule = AnomalyRule::duplicate_detection("posts", &["title"]);
        // "null" (string) serializes as "\"null\"", null as "null": no clash
        assert!(rule.run(&entities).is_empty());
    }

    #[test]
    fn test_stale_data_flags_old_entities() {
        let old_secs = Timestamp::now().as_secs() - 10_000;
        let fresh_millis = Timestamp::now().as_millis();
        let entities = store(json!({
            "sessions": {
                "a": {"id": "a", "updatedAt": old_secs},
                "b": {"id": "b", "updatedAt": fresh_millis},
                "c": {"id": "c"}
            }
        }));
        let rule = AnomalyRule::stale_data("sessions", "updatedAt", Duration::from_secs(3_600));

        let violations = rule.run(&entities);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].entity_id, "a");
        assert_eq!(violations[0].severity, Severity::Info);
    }

    #[test]
    fn test_required_fields_flags_missing_and_null() {
        let entities = store(json!({
            "users": {
                "1": {"id": "1", "name": "Alice", "email": "a@x.io"},
                "2": {"id": "2", "name": null, "email": "b@x.io"},
                "3": {"id": "3", "email": "c@x.io"}
            }
        }));
        let rule = AnomalyRule::required_fields("users", &["name"]);

        let violations = rule.run(&entities);
        assert_eq!(violations.len(), 2);
        assert!(violations.iter().all(|v| v.severity == Severity::Error));
        assert!(violations.iter().any(|v| v.entity_id == "2"));
        assert!(violations.iter().any(|v| v.entity_id == "3"));
    }

    #[test]
    fn test_rule_on_absent_type_is_silent() {
        let rule = AnomalyRule::duplicate_detection("posts", &["title"]);
        assert!(rule.run(&NormalizedEntities::new()).is_empty());
    }
}
