//! Consistency monitor
//!
//! Wraps an [`IntegrityChecker`] with scheduling, snapshots, drift
//! comparison, and a typed event stream. The monitor never owns the
//! canonical store: every check reads a caller-supplied reference (or
//! re-invokes a caller-supplied accessor on scheduled ticks), and repaired
//! stores are handed back for the caller to adopt.
//!
//! The interval timer is one worker thread woken through a condvar timed
//! wait; `stop()` flips the running flag and notifies, so shutdown is
//! explicit. Concurrent `check()` calls are not serialized — `last_report`
//! and status race last-writer-wins; callers needing serialized checks
//! serialize externally.

use crate::config::MonitorConfig;
use crate::drift::{diff_against, DriftResult};
use crate::event::{EventHistory, MonitorEvent, MonitorEventKind, MonitorStatus};
use crate::snapshot::{SnapshotId, StateSnapshot};
use parking_lot::{Condvar, Mutex};
use planar_core::NormalizedEntities;
use planar_integrity::{IntegrityChecker, IntegrityReport, RepairOptions, RepairOutcome};
use serde_json::json;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error};

/// Handle to an active subscription, for [`ConsistencyMonitor::unsubscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&MonitorEvent) + Send + Sync>;

struct MonitorState {
    status: MonitorStatus,
    last_report: Option<IntegrityReport>,
    last_repair: Option<RepairOutcome>,
    snapshots: VecDeque<StateSnapshot>,
    history: EventHistory,
    listeners: Vec<(u64, Listener)>,
    next_subscription: u64,
}

struct MonitorInner {
    checker: IntegrityChecker,
    config: MonitorConfig,
    state: Mutex<MonitorState>,
    // timer gate: true while the timer thread should keep running
    timer_running: Mutex<bool>,
    timer_wakeup: Condvar,
    timer_handle: Mutex<Option<JoinHandle<()>>>,
}

/// Schedules integrity checks and tracks store health over time
pub struct ConsistencyMonitor {
    inner: Arc<MonitorInner>,
}

impl ConsistencyMonitor {
    /// Create a monitor around a preconfigured checker
    pub fn new(checker: IntegrityChecker, config: MonitorConfig) -> Self {
        let history = EventHistory::new(config.max_history);
        Self {
            inner: Arc::new(MonitorInner {
                checker,
                config,
                state: Mutex::new(MonitorState {
                    status: MonitorStatus::Idle,
                    last_report: None,
                    last_repair: None,
                    snapshots: VecDeque::new(),
                    history,
                    listeners: Vec::new(),
                    next_subscription: 0,
                }),
                timer_running: Mutex::new(false),
                timer_wakeup: Condvar::new(),
                timer_handle: Mutex::new(None),
            }),
        }
    }

    /// Current status
    pub fn status(&self) -> MonitorStatus {
        self.inner.state.lock().status
    }

    /// The most recent report, if any check has run
    pub fn last_report(&self) -> Option<IntegrityReport> {
        self.inner.state.lock().last_report.clone()
    }

    /// The most recent repair outcome
    ///
    /// The monitor never writes the canonical store; callers adopt
    /// `outcome.entities` themselves.
    pub fn last_repair(&self) -> Option<RepairOutcome> {
        self.inner.state.lock().last_repair.clone()
    }

    /// Run a check now
    ///
    /// Emits `check-start`, one `violation-detected` per finding, and
    /// `check-complete`; transitions status through `checking` to
    /// `valid`/`invalid`. With `auto_repair` configured, a violation-bearing
    /// check immediately runs a repair pass whose outcome is retained in
    /// [`last_repair`](Self::last_repair).
    ///
    /// A panicking checker moves the monitor to the sticky `error` status,
    /// emits an `error` event, and resumes the panic.
    pub fn check(&self, entities: &NormalizedEntities) -> IntegrityReport {
        match self.inner.run_check(entities) {
            Ok(report) => report,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    /// Run a repair pass for an existing report
    ///
    /// Emits `repair-start`/`repair-complete` and transitions status through
    /// `repairing`. Returns the outcome; the caller writes
    /// `outcome.entities` back to the canonical store.
    pub fn repair(
        &self,
        entities: &NormalizedEntities,
        report: &IntegrityReport,
        options: &RepairOptions,
    ) -> RepairOutcome {
        self.inner.run_repair(entities, report, options)
    }

    /// Snapshot the store's population, ring-buffered at `max_snapshots`
    pub fn create_snapshot(
        &self,
        entities: &NormalizedEntities,
        label: Option<&str>,
    ) -> StateSnapshot {
        let report_valid = {
            let state = self.inner.state.lock();
            state.last_report.as_ref().map(|r| r.valid)
        };
        let snapshot =
            StateSnapshot::capture(entities, label.map(str::to_string), report_valid);
        {
            let mut state = self.inner.state.lock();
            if state.snapshots.len() >= self.inner.config.max_snapshots.max(1) {
                state.snapshots.pop_front();
            }
            state.snapshots.push_back(snapshot.clone());
        }
        self.inner.emit(MonitorEvent::new(
            MonitorEventKind::SnapshotCreated,
            json!({
                "id": snapshot.id.to_string(),
                "label": snapshot.label,
                "entity_counts": snapshot.entity_counts,
            }),
        ));
        snapshot
    }

    /// Retained snapshots, oldest first
    pub fn snapshots(&self) -> Vec<StateSnapshot> {
        self.inner.state.lock().snapshots.iter().cloned().collect()
    }

    /// Compare the live store against the most recent snapshot
    ///
    /// `None` when no snapshot has been taken. Emits `drift-detected` when
    /// changes are found.
    pub fn detect_drift(&self, entities: &NormalizedEntities) -> Option<DriftResult> {
        let snapshot = self.inner.state.lock().snapshots.back().cloned()?;
        Some(self.inner.diff_and_report(&snapshot, entities))
    }

    /// Compare the live store against any retained snapshot
    ///
    /// `None` when the id is unknown (or evicted). Emits `drift-detected`
    /// when changes are found.
    pub fn compare_with_snapshot(
        &self,
        entities: &NormalizedEntities,
        id: SnapshotId,
    ) -> Option<DriftResult> {
        let snapshot = {
            let state = self.inner.state.lock();
            state.snapshots.iter().find(|s| s.id == id).cloned()?
        };
        Some(self.inner.diff_and_report(&snapshot, entities))
    }

    /// Start scheduled checking
    ///
    /// `get_entities` is re-invoked on every tick; the store is never cached
    /// between ticks. Idempotent while already active. With
    /// `check_interval_ms = 0` the monitor stays on-demand and no thread is
    /// spawned. A panicking tick (accessor or checker) moves the monitor to
    /// the sticky `error` status; the timer keeps running.
    pub fn start(
        &self,
        get_entities: impl Fn() -> NormalizedEntities + Send + Sync + 'static,
    ) {
        let Some(interval) = self.inner.config.check_interval() else {
            debug!("check_interval is 0; monitor stays on-demand");
            return;
        };
        {
            let mut running = self.inner.timer_running.lock();
            if *running {
                return;
            }
            *running = true;
        }

        let inner = Arc::clone(&self.inner);
        let handle = std::thread::spawn(move || loop {
            {
                let mut running = inner.timer_running.lock();
                if !*running {
                    break;
                }
                let timed_out = inner
                    .timer_wakeup
                    .wait_for(&mut running, interval)
                    .timed_out();
                if !*running {
                    break;
                }
                if !timed_out {
                    continue;
                }
            }
            let tick = catch_unwind(AssertUnwindSafe(|| {
                let entities = get_entities();
                inner.run_check(&entities)
            }));
            match tick {
                // accessor panicked before the check began
                Err(panic) => inner.mark_error(&panic_message(&panic)),
                // checker panicked: status and event already handled inside
                Ok(Err(_)) => {}
                Ok(Ok(_)) => {}
            }
        });
        *self.inner.timer_handle.lock() = Some(handle);
    }

    /// Stop scheduled checking; idempotent
    pub fn stop(&self) {
        {
            let mut running = self.inner.timer_running.lock();
            if !*running {
                return;
            }
            *running = false;
            self.inner.timer_wakeup.notify_all();
        }
        if let Some(handle) = self.inner.timer_handle.lock().take() {
            let _ = handle.join();
        }
    }

    /// Subscribe to the event stream
    ///
    /// Listener panics are caught and logged; they never reach other
    /// listeners or the emitting call.
    pub fn subscribe(
        &self,
        listener: impl Fn(&MonitorEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let mut state = self.inner.state.lock();
        let id = state.next_subscription;
        state.next_subscription += 1;
        state.listeners.push((id, Arc::new(listener)));
        SubscriptionId(id)
    }

    /// Remove a subscription; true when it existed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = self.inner.state.lock();
        let before = state.listeners.len();
        state.listeners.retain(|(listener_id, _)| *listener_id != id.0);
        state.listeners.len() != before
    }

    /// The event history, oldest first (bounded at `max_history`)
    pub fn history(&self) -> Vec<MonitorEvent> {
        self.inner.state.lock().history.to_vec()
    }

    /// Stop the timer and drop listeners, history, and snapshots
    ///
    /// The monitor remains usable for on-demand checks afterwards.
    pub fn dispose(&self) {
        self.stop();
        let mut state = self.inner.state.lock();
        state.listeners.clear();
        state.history.clear();
        state.snapshots.clear();
        state.status = MonitorStatus::Idle;
    }
}

impl Drop for ConsistencyMonitor {
    fn drop(&mut self) {
        // the timer must not outlive the monitor handle
        self.stop();
    }
}

impl MonitorInner {
    fn run_check(
        &self,
        entities: &NormalizedEntities,
    ) -> std::thread::Result<IntegrityReport> {
        self.set_status(MonitorStatus::Checking);
        self.emit(MonitorEvent::new(MonitorEventKind::CheckStart, json!({})));

        let outcome = catch_unwind(AssertUnwindSafe(|| self.checker.check(entities)));
        let report = match outcome {
            Ok(report) => report,
            Err(panic) => {
                self.mark_error(&panic_message(&panic));
                return Err(panic);
            }
        };

        {
            let mut state = self.state.lock();
            state.last_report = Some(report.clone());
        }
        for violation in &report.violations {
            self.emit(MonitorEvent::new(
                MonitorEventKind::ViolationDetected,
                serde_json::to_value(violation).unwrap_or_default(),
            ));
        }
        self.emit(MonitorEvent::new(
            MonitorEventKind::CheckComplete,
            json!({
                "valid": report.valid,
                "violations": report.violations.len(),
                "duration_micros": report.duration_micros,
            }),
        ));
        self.set_status(if report.valid {
            MonitorStatus::Valid
        } else {
            MonitorStatus::Invalid
        });

        if self.config.auto_repair && !report.violations.is_empty() {
            let mut options = RepairOptions::new();
            if self.config.repair_errors_only {
                options = options.errors_only();
            }
            self.run_repair(entities, &report, &options);
        }

        Ok(report)
    }

    fn run_repair(
        &self,
        entities: &NormalizedEntities,
        report: &IntegrityReport,
        options: &RepairOptions,
    ) -> RepairOutcome {
        self.set_status(MonitorStatus::Repairing);
        self.emit(MonitorEvent::new(
            MonitorEventKind::RepairStart,
            json!({"violations": report.violations.len()}),
        ));

        let outcome = self.checker.repair(entities, report, options);

        {
            let mut state = self.state.lock();
            state.last_repair = Some(outcome.clone());
        }
        self.emit(MonitorEvent::new(
            MonitorEventKind::RepairComplete,
            json!({
                "applied": outcome.repairs.iter().filter(|r| r.success).count(),
                "failed": outcome.repairs.iter().filter(|r| !r.success).count(),
                "remaining": outcome.remaining.len(),
            }),
        ));
        // errors left unrepaired keep the store invalid
        self.set_status(if outcome.remaining.iter().any(|v| v.is_error()) {
            MonitorStatus::Invalid
        } else {
            MonitorStatus::Valid
        });
        outcome
    }

    fn diff_and_report(
        &self,
        snapshot: &StateSnapshot,
        entities: &NormalizedEntities,
    ) -> DriftResult {
        let drift = diff_against(snapshot, entities);
        if drift.has_drift {
            self.emit(MonitorEvent::new(
                MonitorEventKind::DriftDetected,
                serde_json::to_value(&drift).unwrap_or_default(),
            ));
        }
        drift
    }

    fn set_status(&self, to: MonitorStatus) {
        let from = {
            let mut state = self.state.lock();
            let from = state.status;
            state.status = to;
            from
        };
        if from != to {
            self.emit(MonitorEvent::new(
                MonitorEventKind::StatusChange,
                json!({"from": from, "to": to}),
            ));
        }
    }

    fn mark_error(&self, message: &str) {
        error!("integrity check panicked: {message}");
        {
            let mut state = self.state.lock();
            state.status = MonitorStatus::Error;
        }
        self.emit(MonitorEvent::new(
            MonitorEventKind::Error,
            json!({"message": message}),
        ));
    }

    fn emit(&self, event: MonitorEvent) {
        let listeners: Vec<Listener> = {
            let mut state = self.state.lock();
            state.history.push(event.clone());
            state.listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
        };
        // listeners run outside the state lock so they may call back into
        // the monitor; a panicking listener is isolated from the rest
        for listener in listeners {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener(&event))) {
                error!(
                    kind = ?event.kind,
                    "monitor listener panicked: {}",
                    panic_message(&panic)
                );
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "(non-string panic)".to_string()
    }
}
