//! Path adaptation and containment checks
//!
//! Every path the transaction engine hands to the OS goes through
//! `adapt_path` first, and cache entry names are vetted with
//! `is_plain_name` before being joined under the cache root.

use std::path::{Path, PathBuf};

/// Resolve a path to a form the underlying OS can address reliably.
///
/// Relative paths are made absolute against the current directory. On
/// Windows the result is additionally converted to verbatim (`\\?\`) form
/// so paths longer than 260 characters keep working. Idempotent and free
/// of filesystem side effects.
pub fn adapt_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    #[cfg(windows)]
    let absolute = to_verbatim(&absolute);

    absolute
}

/// Prefix an absolute Windows path with `\\?\` (or `\\?\UNC\` for UNC
/// paths) unless it already carries the prefix.
#[cfg(windows)]
fn to_verbatim(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if s.starts_with(r"\\?\") {
        return path.to_path_buf();
    }
    if let Some(unc) = s.strip_prefix(r"\\") {
        return PathBuf::from(format!(r"\\?\UNC\{}", unc));
    }
    PathBuf::from(format!(r"\\?\{}", s))
}

/// Check that `name` is a plain single-component file name with no
/// separators and no parent traversal, safe to join directly under a
/// trusted root.
pub fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
}

/// Default cache root: `<platform cache dir>/upkeep/sources`.
pub fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("upkeep")
        .join("sources")
}
