//! Store snapshots
//!
//! A snapshot records the *population* of a store at a point in time: per-
//! type entity counts and an xxh3 digest over each type's sorted id list.
//! Digests are membership-based, not content-based — two stores holding the
//! same ids with different payloads hash identically. That keeps snapshots
//! cheap enough to take around every risky operation; drift detection built
//! on them is a coarse O(types) pre-check by design.

use planar_core::{NormalizedEntities, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;
use xxhash_rust::xxh3::xxh3_64;

/// Unique identifier for a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotId(Uuid);

impl SnapshotId {
    /// Create a new random id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from a string representation
    pub fn from_string(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for SnapshotId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable point-in-time record of a store's population
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Snapshot id
    pub id: SnapshotId,
    /// When the snapshot was taken
    pub timestamp: Timestamp,
    /// Per-type entity counts
    pub entity_counts: BTreeMap<String, usize>,
    /// Per-type membership digest (xxh3 over the sorted id list)
    pub type_digests: BTreeMap<String, u64>,
    /// Combined digest over all types
    pub hash: u64,
    /// Caller-supplied label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// `valid` flag of the report current when the snapshot was taken
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_valid: Option<bool>,
}

impl StateSnapshot {
    /// Capture the population of `entities`
    pub fn capture(
        entities: &NormalizedEntities,
        label: Option<String>,
        report_valid: Option<bool>,
    ) -> Self {
        let (entity_counts, type_digests, hash) = digest_store(entities);
        Self {
            id: SnapshotId::new(),
            timestamp: Timestamp::now(),
            entity_counts,
            type_digests,
            hash,
            label,
            report_valid,
        }
    }
}

/// Counts, per-type digests, and the combined digest for a store
pub(crate) fn digest_store(
    entities: &NormalizedEntities,
) -> (BTreeMap<String, usize>, BTreeMap<String, u64>, u64) {
    let mut counts = BTreeMap::new();
    let mut digests = BTreeMap::new();
    let mut combined = Vec::new();

    // NormalizedEntities iterates types and ids in sorted order
    for (entity_type, map) in entities.iter() {
        let mut buffer = Vec::new();
        for id in map.keys() {
            buffer.extend_from_slice(id.as_bytes());
            buffer.push(0);
        }
        let digest = xxh3_64(&buffer);
        counts.insert(entity_type.clone(), map.len());
        digests.insert(entity_type.clone(), digest);
        combined.extend_from_slice(entity_type.as_bytes());
        combined.push(0);
        combined.extend_from_slice(&digest.to_le_bytes());
    }

    (counts, digests, xxh3_64(&combined))
}
