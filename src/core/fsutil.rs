//! Filesystem helpers
//!
//! The copy primitive stages bytes in a temporary file next to the
//! destination and renames it into place, so a reader (or a failed call)
//! never observes a half-written file. Directory sizing tolerates
//! unreadable entries.

use std::fs;
use std::io;
use std::path::Path;
use walkdir::WalkDir;

/// Copy `src` over `dest`, creating missing parent directories of `dest`.
///
/// The bytes land in a temporary file beside `dest` and are renamed into
/// place, so `dest` always holds either its old content or the complete
/// new content. Permission bits travel with the copy; the source's
/// modification time is carried across best-effort. Returns the number of
/// bytes copied.
pub fn replace_file(src: &Path, dest: &Path) -> io::Result<u64> {
    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let modified = fs::metadata(src)?.modified().ok();

    let staged = tempfile::NamedTempFile::new_in(parent)?;
    let bytes = fs::copy(src, staged.path())?;
    staged.persist(dest).map_err(|e| e.error)?;

    if let Some(mtime) = modified {
        if let Ok(file) = fs::File::open(dest) {
            let _ = file.set_modified(mtime);
        }
    }
    Ok(bytes)
}

/// Total size in bytes of all files under `path`, recursively.
///
/// Entries that cannot be read are skipped silently; a missing `path`
/// yields zero. Symbolic links are not followed.
pub fn dir_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|meta| meta.len())
        .sum()
}
