//! PlanarDB - schema-driven normalized entity store
//!
//! PlanarDB keeps application entities flat — keyed by type and id instead
//! of nested — so one update touches one record no matter how many places
//! reference it. Around that flat store it provides:
//!
//! - schema-guided normalization and denormalization between nested views
//!   and the flat store
//! - an integrity checker that detects and can mechanically repair
//!   referential violations, constraint failures, orphans, and anomalies
//! - a consistency monitor with scheduled checks, population snapshots,
//!   drift detection, and a typed event stream
//!
//! # Quick Start
//!
//! ```
//! use planardb::{
//!     denormalize, normalize, DenormalizeOptions, EntitySchema, NormalizedEntities,
//!     Schema, SchemaRegistry,
//! };
//! use serde_json::json;
//!
//! let mut registry = SchemaRegistry::new();
//! registry.register(EntitySchema::new("users"))?;
//! registry.register(EntitySchema::new("posts").relation("author", Schema::entity("users")))?;
//!
//! let input = json!({"id": "1", "author": {"id": "9", "name": "Alice"}});
//! let normalized = normalize(&input, &Schema::entity("posts"), &registry)?;
//!
//! let mut store = NormalizedEntities::new();
//! store.merge(normalized.entities);
//!
//! let view = denormalize(
//!     &normalized.result,
//!     &Schema::entity("posts"),
//!     &store,
//!     &registry,
//!     &DenormalizeOptions::default(),
//! );
//! assert_eq!(view["author"]["name"], json!("Alice"));
//! # Ok::<(), planardb::Error>(())
//! ```
//!
//! # Architecture
//!
//! The workspace splits leaves-first: `planar-core` (entity/schema model),
//! `planar-graph` (normalize/denormalize), `planar-integrity` (checker and
//! repair engine), `planar-monitor` (scheduling, snapshots, drift, events).
//! This crate re-exports the public surface of all four.

// Re-export the public API from the member crates
pub use planar_core::*;
pub use planar_graph::*;
pub use planar_integrity::*;
pub use planar_monitor::*;
