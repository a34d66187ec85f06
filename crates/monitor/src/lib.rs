//! Consistency monitoring for the planar store
//!
//! Wraps an [`IntegrityChecker`](planar_integrity::IntegrityChecker) with:
//! - on-demand and timer-driven checking ([`ConsistencyMonitor`])
//! - auto-repair wiring (the caller still adopts the repaired store)
//! - population snapshots ([`StateSnapshot`]) in a bounded ring
//! - coarse drift detection between a snapshot and the live store
//! - a typed, bounded event stream with isolated listeners

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod drift;
pub mod event;
pub mod monitor;
pub mod snapshot;

pub use config::MonitorConfig;
pub use drift::{DriftChanges, DriftEndpoints, DriftResult};
pub use event::{MonitorEvent, MonitorEventKind, MonitorStatus};
pub use monitor::{ConsistencyMonitor, SubscriptionId};
pub use snapshot::{SnapshotId, StateSnapshot};
