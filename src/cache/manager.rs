//! Cache manager - size- and count-bounded eviction
//!
//! The cache root holds one subdirectory per cached source. Filesystem
//! modification time is the recency marker: whoever uses an entry touches
//! it, and `cleanup` deletes the least recently used entries until the
//! cache fits the configured bounds again.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::core::diag::{DiagSink, NullSink};
use crate::core::fsutil::dir_size;
use crate::core::paths::is_plain_name;
use crate::core::util::format_bytes;

/// Default cap on total cache size: 1 GiB.
pub const DEFAULT_MAX_BYTES: u64 = 1024 * 1024 * 1024;

/// Default cap on the number of cached entries.
pub const DEFAULT_MAX_ITEMS: usize = 50;

/// Default advisory free-disk floor: 500 MiB.
pub const DEFAULT_MIN_FREE_BYTES: u64 = 500 * 1024 * 1024;

/// Bounds applied to a cache root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheLimits {
    /// Maximum total size of all entries, in bytes.
    pub max_bytes: u64,
    /// Maximum number of entries.
    pub max_items: usize,
    /// Advisory minimum free disk space, in bytes. Eviction never acts on
    /// it; callers that fill the cache are expected to check it first.
    pub min_free_bytes: u64,
}

impl Default for CacheLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            max_items: DEFAULT_MAX_ITEMS,
            min_free_bytes: DEFAULT_MIN_FREE_BYTES,
        }
    }
}

/// One cached source directory as seen by a scan.
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntry {
    /// Directory name under the cache root (a derived key).
    pub name: String,
    /// Total size in bytes, from a recursive walk.
    pub size_bytes: u64,
    /// Last-used marker, read from the directory's modification time.
    pub last_used: DateTime<Utc>,
    #[serde(skip)]
    path: PathBuf,
}

impl CacheEntry {
    /// Path of the entry directory under the cache root.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Enforces [`CacheLimits`] on a cache root directory.
pub struct CacheManager {
    root: PathBuf,
    limits: CacheLimits,
    diag: Arc<dyn DiagSink>,
}

impl CacheManager {
    /// Manager over `root` with the given limits and no diagnostics.
    pub fn new(root: impl Into<PathBuf>, limits: CacheLimits) -> Self {
        Self::with_diag(root, limits, Arc::new(NullSink))
    }

    /// Manager reporting through an explicit diagnostics sink.
    pub fn with_diag(
        root: impl Into<PathBuf>,
        limits: CacheLimits,
        diag: Arc<dyn DiagSink>,
    ) -> Self {
        Self {
            root: root.into(),
            limits,
            diag,
        }
    }

    /// The cache root this manager watches.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The configured bounds.
    pub fn limits(&self) -> CacheLimits {
        self.limits
    }

    /// Scan the immediate subdirectories of the cache root, least
    /// recently used first.
    ///
    /// A missing root yields an empty list. Entries whose metadata cannot
    /// be read are reported and skipped; non-directories are ignored.
    pub fn entries(&self) -> Vec<CacheEntry> {
        let read_dir = match fs::read_dir(&self.root) {
            Ok(rd) => rd,
            Err(_) => return Vec::new(),
        };

        let mut entries = Vec::new();
        for dir_entry in read_dir.filter_map(Result::ok) {
            let path = dir_entry.path();
            if !path.is_dir() {
                continue;
            }
            let modified = match fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(m) => m,
                Err(err) => {
                    self.diag.warn(
                        "cache",
                        &format!("skipping unreadable entry {}: {}", path.display(), err),
                    );
                    continue;
                }
            };
            entries.push(CacheEntry {
                name: dir_entry.file_name().to_string_lossy().into_owned(),
                size_bytes: dir_size(&path),
                last_used: DateTime::<Utc>::from(modified),
                path,
            });
        }

        entries.sort_by_key(|e| e.last_used);
        entries
    }

    /// Total size in bytes of all entries.
    pub fn total_bytes(&self) -> u64 {
        self.entries().iter().map(|e| e.size_bytes).sum()
    }

    /// Delete least-recently-used entries until the cache fits its
    /// bounds again. Returns how many entries were actually removed.
    ///
    /// The item-count bound is enforced first, then the byte-size bound;
    /// each pass walks oldest-first. An entry that fails to delete is
    /// reported, dropped from the pass, and not counted.
    pub fn cleanup(&self) -> usize {
        if !self.root.exists() {
            return 0;
        }

        let mut entries = self.entries();
        let mut total: u64 = entries.iter().map(|e| e.size_bytes).sum();
        let mut removed = 0;

        while entries.len() > self.limits.max_items {
            let entry = entries.remove(0);
            total = total.saturating_sub(entry.size_bytes);
            if self.evict(&entry) {
                removed += 1;
            }
        }

        while total > self.limits.max_bytes && !entries.is_empty() {
            let entry = entries.remove(0);
            total = total.saturating_sub(entry.size_bytes);
            if self.evict(&entry) {
                removed += 1;
            }
        }

        if removed > 0 {
            self.diag.info(
                "cache",
                &format!("evicted {} entries, {} in use", removed, format_bytes(total)),
            );
        }
        removed
    }

    /// Refresh the recency marker of the named entry to now.
    ///
    /// Returns `Ok(true)` when an entry was touched, `Ok(false)` when no
    /// such entry exists. A name containing path separators or parent
    /// traversal is refused and treated as absent. An I/O failure while
    /// updating an existing entry is returned to the caller.
    pub fn touch(&self, name: &str) -> io::Result<bool> {
        if !is_plain_name(name) {
            self.diag.warn(
                "cache",
                &format!("refusing cache name {:?}: not a plain directory name", name),
            );
            return Ok(false);
        }

        let path = self.root.join(name);
        if !path.is_dir() {
            return Ok(false);
        }

        let handle = fs::File::open(&path)?;
        handle.set_modified(SystemTime::now())?;
        Ok(true)
    }

    /// Delete one entry. Reports and swallows failures; an entry that
    /// vanished since the scan is tolerated silently and not counted.
    fn evict(&self, entry: &CacheEntry) -> bool {
        self.diag.info(
            "cache",
            &format!("evicting {} ({})", entry.name, format_bytes(entry.size_bytes)),
        );
        match fs::remove_dir_all(&entry.path) {
            Ok(()) => true,
            Err(err) if err.kind() == io::ErrorKind::NotFound => false,
            Err(err) => {
                self.diag.warn(
                    "cache",
                    &format!("failed to evict {}: {}", entry.path().display(), err),
                );
                false
            }
        }
    }
}
