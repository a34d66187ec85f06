//! Bounded cache for denormalized views
//!
//! [`denormalize`](crate::denormalize) memoizes within a single call only.
//! Callers that rebuild the same views across many calls (render loops,
//! selectors) can wrap it in a `DenormalizeCache`: a small LRU keyed by
//! entity type, id, and an options fingerprint.
//!
//! The cache has no knowledge of store mutations. Callers invalidate
//! explicitly — per entity, per type, or wholesale — when they write to the
//! canonical store.

use crate::denormalize::{denormalize, DenormalizeOptions};
use planar_core::{NormalizedEntities, Schema, SchemaRegistry};
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};

type CacheKey = (String, String, u64);

/// LRU cache over denormalized entity views
#[derive(Debug)]
pub struct DenormalizeCache {
    capacity: usize,
    map: FxHashMap<CacheKey, Value>,
    // least-recently-used at the front
    order: VecDeque<CacheKey>,
}

impl DenormalizeCache {
    /// Create a cache holding at most `capacity` views
    ///
    /// A zero capacity is treated as 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            map: FxHashMap::default(),
            order: VecDeque::new(),
        }
    }

    /// Return the cached view for `(entity_type, id)` under `options`, or
    /// denormalize and cache it
    pub fn get_or_compute(
        &mut self,
        entity_type: &str,
        id: &str,
        entities: &NormalizedEntities,
        registry: &SchemaRegistry,
        options: &DenormalizeOptions,
    ) -> Value {
        let key = (
            entity_type.to_string(),
            id.to_string(),
            options_fingerprint(options),
        );
        if let Some(view) = self.map.get(&key) {
            let view = view.clone();
            self.touch(&key);
            return view;
        }

        let view = denormalize(
            &Value::String(id.to_string()),
            &Schema::entity(entity_type),
            entities,
            registry,
            options,
        );
        self.insert(key, view.clone());
        view
    }

    /// Drop every cached view of one entity
    pub fn invalidate(&mut self, entity_type: &str, id: &str) {
        self.retain(|key| !(key.0 == entity_type && key.1 == id));
    }

    /// Drop every cached view of one entity type
    pub fn invalidate_type(&mut self, entity_type: &str) {
        self.retain(|key| key.0 != entity_type);
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
    }

    /// Number of cached views
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True when nothing is cached
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn insert(&mut self, key: CacheKey, view: Value) {
        if self.map.len() >= self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.map.remove(&evicted);
            }
        }
        self.map.insert(key.clone(), view);
        self.order.push_back(key);
    }

    fn touch(&mut self, key: &CacheKey) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
            self.order.push_back(key.clone());
        }
    }

    fn retain(&mut self, keep: impl Fn(&CacheKey) -> bool) {
        self.map.retain(|key, _| keep(key));
        self.order.retain(|key| keep(key));
    }
}

fn options_fingerprint(options: &DenormalizeOptions) -> u64 {
    let mut hasher = rustc_hash::FxHasher::default();
    options.hash(&mut hasher);
    hasher.finish()
}
