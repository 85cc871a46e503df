//! upkeep - transactional file updates with a bounded on-disk cache
//!
//! Applies multi-file changes all-or-nothing: every mutation records an
//! undo action, and an uncommitted scope rolls itself back on drop. A
//! companion cache manager keeps fetched sources under size and count
//! bounds with least-recently-used eviction.

pub mod cache;
pub mod cli;
pub mod core;
pub mod txn;

pub use cache::keys::{derive_local_name, derive_name};
pub use cache::manager::{CacheEntry, CacheLimits, CacheManager};
pub use txn::{FileTransaction, ResourceError, TransactionError};
