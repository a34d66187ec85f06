//! Integrity checking for the planar store
//!
//! This crate validates a supplied [`NormalizedEntities`] store and can
//! mechanically repair what it finds:
//! - [`RelationDefinition`]: declared referential rules with repair policy
//! - [`ConstraintDefinition`]: custom per-entity-type predicates
//! - [`AnomalyRule`]: whole-store scans (duplicates, stale data, required
//!   fields, arbitrary consistency rules)
//! - [`IntegrityChecker::check`]: produces an [`IntegrityReport`] of typed,
//!   severity-classified [`IntegrityViolation`]s — findings are data, never
//!   errors
//! - [`repair`]: applies violations' attached repairs copy-on-write
//!
//! [`NormalizedEntities`]: planar_core::NormalizedEntities

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod anomaly;
pub mod checker;
pub mod constraint;
pub mod relation;
pub mod repair;
pub mod report;
pub mod violation;

pub use anomaly::{AnomalyDetectFn, AnomalyRule};
pub use checker::{CheckerConfig, IntegrityChecker};
pub use constraint::{ConstraintDefinition, ConstraintFn, ConstraintRepairFn};
pub use relation::{OnDelete, RelationDefinition};
pub use repair::{repair, RepairHandler, RepairOptions, RepairOutcome, RepairRecord};
pub use report::{CheckStats, IntegrityReport};
pub use violation::{EntityRef, IntegrityViolation, Repair, RepairAction, Severity, ViolationKind};
