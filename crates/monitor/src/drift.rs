//! Drift detection
//!
//! Compares a retained [`StateSnapshot`] against the live store. Detection
//! is count-plus-membership based: per-type count deltas surface as added/
//! removed, equal counts with differing membership digests surface as
//! modified. No per-field diffing happens here.

use crate::snapshot::{digest_store, SnapshotId, StateSnapshot};
use planar_core::NormalizedEntities;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The two sides of a drift comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftEndpoints {
    /// The retained snapshot the live store was compared against
    pub source: SnapshotId,
    /// The comparison target; always the live store, labeled `"live"`
    pub target: String,
}

/// Per-type population changes between snapshot and live store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftChanges {
    /// Types that gained entities: type → how many more
    pub added: BTreeMap<String, usize>,
    /// Types that lost entities: type → how many fewer
    pub removed: BTreeMap<String, usize>,
    /// Types with unchanged counts but different membership
    pub modified: Vec<String>,
}

/// Outcome of one drift comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftResult {
    /// True when any change was detected
    pub has_drift: bool,
    /// What was compared
    pub snapshots: DriftEndpoints,
    /// The changes, per type
    pub changes: DriftChanges,
    /// Sum of added and removed entities plus modified types
    pub total_changes: usize,
}

/// Compare `entities` against a retained snapshot
pub fn diff_against(snapshot: &StateSnapshot, entities: &NormalizedEntities) -> DriftResult {
    let (live_counts, live_digests, live_hash) = digest_store(entities);
    let mut changes = DriftChanges::default();

    let all_types: std::collections::BTreeSet<&String> = snapshot
        .entity_counts
        .keys()
        .chain(live_counts.keys())
        .collect();

    for entity_type in all_types {
        let before = snapshot.entity_counts.get(entity_type).copied().unwrap_or(0);
        let after = live_counts.get(entity_type).copied().unwrap_or(0);
        match after.cmp(&before) {
            std::cmp::Ordering::Greater => {
                changes.added.insert(entity_type.clone(), after - before);
            }
            std::cmp::Ordering::Less => {
                changes.removed.insert(entity_type.clone(), before - after);
            }
            std::cmp::Ordering::Equal => {
                let digest_before = snapshot.type_digests.get(entity_type);
                let digest_after = live_digests.get(entity_type);
                if digest_before != digest_after {
                    changes.modified.push(entity_type.clone());
                }
            }
        }
    }

    let total_changes = changes.added.values().sum::<usize>()
        + changes.removed.values().sum::<usize>()
        + changes.modified.len();

    DriftResult {
        has_drift: total_changes > 0 || live_hash != snapshot.hash,
        snapshots: DriftEndpoints {
            source: snapshot.id,
            target: "live".to_string(),
        },
        changes,
        total_changes,
    }
}
