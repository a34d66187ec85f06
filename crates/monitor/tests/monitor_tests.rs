//! Behavior tests for the consistency monitor
//!
//! 1. Status machine: idle → checking → valid/invalid, sticky error
//! 2. Snapshots and drift: ring buffer, no-op drift, removal detection
//! 3. Eventing: history order, caps, subscribe/unsubscribe, listener
//!    panic isolation
//! 4. Scheduling: start/stop idempotence, per-tick accessor re-invocation
//! 5. Auto-repair flow and config loading
//!
//! These tests verify values, not just is_ok(), one failure mode per test.

use planar_core::NormalizedEntities;
use planar_integrity::{
    AnomalyRule, CheckerConfig, IntegrityChecker, OnDelete, RelationDefinition, RepairOptions,
};
use planar_monitor::{
    ConsistencyMonitor, MonitorConfig, MonitorEventKind, MonitorStatus,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Test Helpers
// ============================================================================

fn store(value: serde_json::Value) -> NormalizedEntities {
    serde_json::from_value(value).unwrap()
}

fn three_users() -> NormalizedEntities {
    store(json!({
        "users": {
            "1": {"id": "1"},
            "2": {"id": "2"},
            "3": {"id": "3"}
        }
    }))
}

fn blog_checker() -> IntegrityChecker {
    IntegrityChecker::new(CheckerConfig {
        relations: vec![RelationDefinition::new("posts", "author", "users")
            .required()
            .on_delete(OnDelete::Cascade)],
        ..Default::default()
    })
}

fn monitor() -> ConsistencyMonitor {
    ConsistencyMonitor::new(blog_checker(), MonitorConfig::default())
}

// ============================================================================
// Module 1: Status Machine
// ============================================================================

#[test]
fn test_initial_status_is_idle() {
    assert_eq!(monitor().status(), MonitorStatus::Idle);
    assert!(monitor().last_report().is_none());
}

#[test]
fn test_clean_check_lands_on_valid() {
    let monitor = monitor();
    let report = monitor.check(&three_users());
    assert!(report.valid);
    assert_eq!(monitor.status(), MonitorStatus::Valid);
    assert!(monitor.last_report().unwrap().valid);
}

#[test]
fn test_violating_check_lands_on_invalid() {
    let monitor = monitor();
    let corrupt = store(json!({"posts": {"1": {"id": "1", "author": "404"}}}));
    let report = monitor.check(&corrupt);
    assert!(!report.valid);
    assert_eq!(monitor.status(), MonitorStatus::Invalid);
}

#[test]
fn test_panicking_rule_marks_sticky_error() {
    let mut checker = IntegrityChecker::default();
    checker.add_anomaly_rule(AnomalyRule::consistency("boom", |_| panic!("rule bug")));
    let monitor = ConsistencyMonitor::new(checker, MonitorConfig::default());

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        monitor.check(&three_users())
    }));
    assert!(outcome.is_err());
    // sticky until a successful check
    assert_eq!(monitor.status(), MonitorStatus::Error);
    assert!(monitor
        .history()
        .iter()
        .any(|e| e.kind == MonitorEventKind::Error));
}

// ============================================================================
// Module 2: Snapshots and Drift
// ============================================================================

#[test]
fn test_no_op_drift_after_snapshot() {
    let monitor = monitor();
    let entities = three_users();
    monitor.create_snapshot(&entities, None);

    let drift = monitor.detect_drift(&entities).unwrap();
    assert!(!drift.has_drift);
    assert_eq!(drift.total_changes, 0);
}

#[test]
fn test_detect_drift_without_snapshot_is_none() {
    assert!(monitor().detect_drift(&three_users()).is_none());
}

#[test]
fn test_removal_drift_is_reported() {
    let monitor = monitor();
    let mut entities = three_users();
    monitor.create_snapshot(&entities, Some("before"));
    entities.remove("users", "2");

    let drift = monitor.detect_drift(&entities).unwrap();
    assert!(drift.has_drift);
    assert_eq!(drift.changes.removed.get("users"), Some(&1));
    assert_eq!(drift.total_changes, 1);
    assert!(monitor
        .history()
        .iter()
        .any(|e| e.kind == MonitorEventKind::DriftDetected));
}

#[test]
fn test_compare_with_retained_snapshot() {
    let monitor = monitor();
    let mut entities = three_users();
    let first = monitor.create_snapshot(&entities, Some("first"));
    entities.upsert("users", "4", planar_core::Entity::new());
    monitor.create_snapshot(&entities, Some("second"));

    let drift = monitor.compare_with_snapshot(&entities, first.id).unwrap();
    assert_eq!(drift.changes.added.get("users"), Some(&1));

    let unknown = planar_monitor::SnapshotId::new();
    assert!(monitor.compare_with_snapshot(&entities, unknown).is_none());
}

#[test]
fn test_snapshot_ring_evicts_oldest() {
    let config = MonitorConfig {
        max_snapshots: 3,
        ..Default::default()
    };
    let monitor = ConsistencyMonitor::new(blog_checker(), config);
    let entities = three_users();

    let first = monitor.create_snapshot(&entities, Some("first"));
    for i in 0..3 {
        let label = format!("later-{i}");
        monitor.create_snapshot(&entities, Some(label.as_str()));
    }

    let snapshots = monitor.snapshots();
    assert_eq!(snapshots.len(), 3);
    assert!(snapshots.iter().all(|s| s.id != first.id));
    assert_eq!(snapshots[0].label.as_deref(), Some("later-0"));
}

// ============================================================================
// Module 3: Eventing
// ============================================================================

#[test]
fn test_check_emits_ordered_events() {
    let monitor = monitor();
    let corrupt = store(json!({"posts": {"1": {"id": "1", "author": "404"}}}));
    monitor.check(&corrupt);

    let kinds: Vec<MonitorEventKind> = monitor.history().iter().map(|e| e.kind).collect();
    let start = kinds
        .iter()
        .position(|k| *k == MonitorEventKind::CheckStart)
        .unwrap();
    let violation = kinds
        .iter()
        .position(|k| *k == MonitorEventKind::ViolationDetected)
        .unwrap();
    let complete = kinds
        .iter()
        .position(|k| *k == MonitorEventKind::CheckComplete)
        .unwrap();
    assert!(start < violation);
    assert!(violation < complete);
}

#[test]
fn test_subscribers_receive_events() {
    let monitor = monitor();
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    let subscription = monitor.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    monitor.check(&three_users());
    let after_check = seen.load(Ordering::SeqCst);
    assert!(after_check > 0);

    assert!(monitor.unsubscribe(subscription));
    monitor.check(&three_users());
    assert_eq!(seen.load(Ordering::SeqCst), after_check);
    assert!(!monitor.unsubscribe(subscription));
}

#[test]
fn test_listener_panic_is_isolated() {
    let monitor = monitor();
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);

    monitor.subscribe(|_| panic!("listener bug"));
    monitor.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    // the emitting check neither panics nor starves the second listener
    let report = monitor.check(&three_users());
    assert!(report.valid);
    assert!(seen.load(Ordering::SeqCst) > 0);
}

#[test]
fn test_history_is_bounded() {
    let config = MonitorConfig {
        max_history: 5,
        ..Default::default()
    };
    let monitor = ConsistencyMonitor::new(blog_checker(), config);
    for _ in 0..10 {
        monitor.check(&three_users());
    }
    assert_eq!(monitor.history().len(), 5);
}

// ============================================================================
// Module 4: Scheduling
// ============================================================================

#[test]
fn test_timer_reinvokes_accessor_each_tick() {
    let config = MonitorConfig {
        check_interval_ms: 20,
        ..Default::default()
    };
    let monitor = ConsistencyMonitor::new(blog_checker(), config);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    monitor.start(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        NormalizedEntities::new()
    });
    // idempotent while active
    monitor.start(|| NormalizedEntities::new());

    std::thread::sleep(Duration::from_millis(130));
    monitor.stop();
    let ticks = calls.load(Ordering::SeqCst);
    assert!(ticks >= 2, "expected at least 2 ticks, saw {ticks}");

    // no further ticks after stop
    std::thread::sleep(Duration::from_millis(60));
    assert_eq!(calls.load(Ordering::SeqCst), ticks);
    monitor.stop();
}

#[test]
fn test_zero_interval_spawns_no_timer() {
    let monitor = monitor();
    monitor.start(|| unreachable!("accessor must not run in on-demand mode"));
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(monitor.status(), MonitorStatus::Idle);
    monitor.stop();
}

#[test]
fn test_panicking_accessor_marks_error_but_timer_survives() {
    let config = MonitorConfig {
        check_interval_ms: 15,
        ..Default::default()
    };
    let monitor = ConsistencyMonitor::new(blog_checker(), config);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    monitor.start(move || {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("accessor bug");
        }
        NormalizedEntities::new()
    });

    std::thread::sleep(Duration::from_millis(90));
    monitor.stop();

    assert!(calls.load(Ordering::SeqCst) >= 2, "timer must outlive the panic");
    // a later successful tick clears the error status
    assert_eq!(monitor.status(), MonitorStatus::Valid);
}

// ============================================================================
// Module 5: Auto-Repair and Config
// ============================================================================

#[test]
fn test_auto_repair_retains_outcome_for_caller() {
    let config = MonitorConfig {
        auto_repair: true,
        ..Default::default()
    };
    let monitor = ConsistencyMonitor::new(blog_checker(), config);
    let corrupt = store(json!({"posts": {"1": {"id": "1", "author": "404"}}}));

    let report = monitor.check(&corrupt);
    assert!(!report.valid);

    let outcome = monitor.last_repair().expect("auto-repair must have run");
    assert!(outcome.entities.get("posts", "1").is_none());
    // the canonical store is untouched until the caller adopts the result
    assert!(corrupt.get("posts", "1").is_some());

    let kinds: Vec<MonitorEventKind> = monitor.history().iter().map(|e| e.kind).collect();
    assert!(kinds.contains(&MonitorEventKind::RepairStart));
    assert!(kinds.contains(&MonitorEventKind::RepairComplete));
    assert_eq!(monitor.status(), MonitorStatus::Valid);
}

#[test]
fn test_manual_repair_emits_events() {
    let monitor = monitor();
    let corrupt = store(json!({"posts": {"1": {"id": "1", "author": "404"}}}));
    let report = monitor.check(&corrupt);

    let outcome = monitor.repair(&corrupt, &report, &RepairOptions::new());
    assert_eq!(outcome.repairs.len(), 1);
    assert!(monitor
        .history()
        .iter()
        .any(|e| e.kind == MonitorEventKind::RepairComplete));
}

#[test]
fn test_dispose_clears_state_but_allows_on_demand_use() {
    let monitor = monitor();
    monitor.subscribe(|_| {});
    monitor.create_snapshot(&three_users(), None);
    monitor.check(&three_users());

    monitor.dispose();
    assert!(monitor.history().is_empty());
    assert!(monitor.snapshots().is_empty());
    assert_eq!(monitor.status(), MonitorStatus::Idle);

    // still usable on demand
    let report = monitor.check(&three_users());
    assert!(report.valid);
}

#[test]
fn test_config_loads_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("monitor.toml");
    std::fs::write(&path, "check_interval_ms = 500\nauto_repair = true\n").unwrap();

    let config = MonitorConfig::load(&path).unwrap();
    assert_eq!(config.check_interval(), Some(Duration::from_millis(500)));
    assert!(config.auto_repair);
    assert_eq!(config.max_history, 100);

    assert!(MonitorConfig::load(dir.path().join("absent.toml")).is_err());
}
