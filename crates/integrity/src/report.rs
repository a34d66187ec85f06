//! Integrity reports
//!
//! A report is the point-in-time outcome of one `check()`: the violations
//! found, per-type entity counts, and scan statistics. Reports are plain
//! serializable data for logging and telemetry.

use crate::violation::{IntegrityViolation, Severity, ViolationKind};
use planar_core::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Counters accumulated during one check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckStats {
    /// Entities visited
    pub entities_checked: usize,
    /// Relation rules evaluated (per entity)
    pub relations_checked: usize,
    /// Constraints evaluated (per entity)
    pub constraints_checked: usize,
    /// Anomaly rules run
    pub anomaly_rules_run: usize,
    /// Error-severity violations found
    pub errors: usize,
    /// Warning-severity violations found
    pub warnings: usize,
    /// Info-severity violations found
    pub infos: usize,
    /// True when fail-fast aborted the scan early
    pub aborted: bool,
}

impl CheckStats {
    /// Bump the severity counter for one violation
    pub(crate) fn count(&mut self, severity: Severity) {
        match severity {
            Severity::Error => self.errors += 1,
            Severity::Warning => self.warnings += 1,
            Severity::Info => self.infos += 1,
        }
    }
}

/// Outcome of one integrity check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityReport {
    /// True iff no error-severity violation was found
    pub valid: bool,
    /// When the check ran
    pub timestamp: Timestamp,
    /// How long the check took, in microseconds
    pub duration_micros: u64,
    /// Per-type entity counts at check time
    pub entity_counts: BTreeMap<String, usize>,
    /// Violations, in scan order
    pub violations: Vec<IntegrityViolation>,
    /// Scan statistics
    pub stats: CheckStats,
}

impl IntegrityReport {
    /// Violations of one kind
    pub fn of_kind(&self, kind: ViolationKind) -> impl Iterator<Item = &IntegrityViolation> {
        self.violations.iter().filter(move |v| v.kind == kind)
    }

    /// Error-severity violations
    pub fn errors(&self) -> impl Iterator<Item = &IntegrityViolation> {
        self.violations.iter().filter(|v| v.is_error())
    }

    /// True when the check found nothing at all
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}
