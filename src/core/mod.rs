//! Core module - Shared plumbing under the transaction and cache layers
//!
//! This module provides:
//! - Diagnostics sink (explicit, injected, no global logger)
//! - Path adaptation and plain-name validation
//! - Filesystem helpers (atomic replace-copies, directory sizing)
//! - Content hashing utilities
//! - URL credential redaction for diagnostics

pub mod diag;
pub mod fsutil;
pub mod paths;
pub mod redact;
pub mod util;
