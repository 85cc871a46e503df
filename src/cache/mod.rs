//! Cache module - bounded on-disk cache of fetched sources
//!
//! Provides:
//! - Stable cache key derivation from URLs and local paths
//! - Recency tracking via filesystem modification times
//! - Least-recently-used eviction under size and count bounds

pub mod keys;
pub mod manager;
