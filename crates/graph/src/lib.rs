//! Normalization and denormalization for the planar store
//!
//! This crate holds the two schema-directed transforms:
//! - [`normalize`]: nested input tree → flat entities + skeleton
//! - [`denormalize`]: flat entities → nested view, with cycle/depth control
//!
//! Plus [`DenormalizeCache`], a bounded LRU for callers that rebuild the
//! same views across many calls.
//!
//! Both transforms are pure functions over a caller-supplied store and a
//! caller-owned [`SchemaRegistry`](planar_core::SchemaRegistry).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod denormalize;
pub mod normalize;

pub use cache::DenormalizeCache;
pub use denormalize::{
    denormalize, denormalize_select, denormalize_shallow, CircularBehavior, DenormalizeOptions,
};
pub use normalize::{normalize, Normalized};
