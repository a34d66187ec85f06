//! Monitor events and status
//!
//! The monitor emits a typed event stream: appended to a bounded history
//! ring and fanned out to subscribed listeners. Events are plain
//! serializable data; payloads are JSON values shaped per kind.

use planar_core::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;

/// Lifecycle state of a [`ConsistencyMonitor`](crate::ConsistencyMonitor)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MonitorStatus {
    /// No check has run yet
    Idle,
    /// A check is in flight
    Checking,
    /// The last check found no error-severity violations
    Valid,
    /// The last check found error-severity violations
    Invalid,
    /// A repair pass is in flight
    Repairing,
    /// The checker itself panicked; sticky until the next successful check
    Error,
}

/// Kind of a monitor event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MonitorEventKind {
    /// A check is starting
    CheckStart,
    /// A check finished; payload carries `valid`, counts, duration
    CheckComplete,
    /// One violation was found; payload is the violation
    ViolationDetected,
    /// A repair pass is starting
    RepairStart,
    /// A repair pass finished; payload carries applied/remaining counts
    RepairComplete,
    /// A drift comparison found changes; payload is the drift result
    DriftDetected,
    /// A snapshot was taken; payload carries id and counts
    SnapshotCreated,
    /// The monitor status changed; payload carries `from` and `to`
    StatusChange,
    /// The checker or entity accessor panicked
    Error,
}

/// One emitted event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorEvent {
    /// Event kind
    pub kind: MonitorEventKind,
    /// When the event was emitted
    pub timestamp: Timestamp,
    /// Kind-specific payload
    pub payload: Value,
}

impl MonitorEvent {
    /// Build an event stamped now
    pub fn new(kind: MonitorEventKind, payload: Value) -> Self {
        Self {
            kind,
            timestamp: Timestamp::now(),
            payload,
        }
    }
}

/// Append-only bounded event history (oldest evicted first)
#[derive(Debug)]
pub(crate) struct EventHistory {
    events: VecDeque<MonitorEvent>,
    capacity: usize,
}

impl EventHistory {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
        }
    }

    pub(crate) fn push(&mut self, event: MonitorEvent) {
        if self.events.len() >= self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub(crate) fn to_vec(&self) -> Vec<MonitorEvent> {
        self.events.iter().cloned().collect()
    }

    pub(crate) fn clear(&mut self) {
        self.events.clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.events.len()
    }
}
