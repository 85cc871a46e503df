//! Transaction module - atomic multi-file updates with rollback
//!
//! Provides:
//! - Scoped file mutations (copy, delete) with per-call undo recording
//! - All-or-nothing semantics: commit keeps everything, rollback (or
//!   dropping the scope uncommitted) restores the pre-transaction state
//! - A private scratch directory holding pre-mutation backups
//!
//! Single-writer by design: a transaction owns its undo log and is never
//! shared across threads.

mod undo;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use thiserror::Error;

use crate::core::diag::{DiagSink, NullSink};
use crate::core::fsutil::replace_file;
use crate::core::paths::adapt_path;
use crate::core::util::files_match;
use undo::UndoAction;

/// Scratch directory prefix, visible in temp listings while a
/// transaction is open.
const SCRATCH_PREFIX: &str = "upkeep-txn-";

/// The private scratch area for backups could not be allocated.
#[derive(Debug, Error)]
#[error("failed to allocate transaction scratch directory: {source}")]
pub struct ResourceError {
    #[source]
    source: io::Error,
}

/// A requested mutation failed.
///
/// Whatever the variant, no new undo action was recorded for the failing
/// call and every previously recorded action is still replayable.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// The transaction was already committed or rolled back.
    #[error("transaction is not active")]
    NotActive,

    /// Capturing the pre-mutation backup failed; the target was not
    /// modified.
    #[error("failed to back up {path}: {source}")]
    Backup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The copy onto the destination failed.
    #[error("failed to copy {src} to {dest}: {source}")]
    Copy {
        src: PathBuf,
        dest: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The delete failed after its backup was captured; the restore
    /// action stays recorded, so rollback still recovers the file.
    #[error("failed to delete {path}: {source}")]
    Delete {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A scoped sequence of file mutations with all-or-nothing effect.
///
/// Every successful mutation records one undo action in an append-only
/// log. [`commit`](Self::commit) keeps the mutations and discards the
/// log; [`rollback`](Self::rollback) replays it newest-first. Dropping an
/// uncommitted transaction rolls back automatically, and the scratch
/// directory is removed either way.
pub struct FileTransaction {
    scratch: Option<TempDir>,
    undo: Vec<UndoAction>,
    active: bool,
    diag: Arc<dyn DiagSink>,
}

impl FileTransaction {
    /// Open a transaction with a fresh private scratch directory and no
    /// diagnostics.
    pub fn open() -> Result<Self, ResourceError> {
        Self::open_with(Arc::new(NullSink))
    }

    /// Open a transaction reporting through an explicit diagnostics sink.
    pub fn open_with(diag: Arc<dyn DiagSink>) -> Result<Self, ResourceError> {
        let scratch = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir()
            .map_err(|source| ResourceError { source })?;

        diag.info(
            "txn",
            &format!("opened transaction, scratch {}", scratch.path().display()),
        );
        Ok(Self {
            scratch: Some(scratch),
            undo: Vec::new(),
            active: true,
            diag,
        })
    }

    /// Whether mutations are still accepted.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Number of undo actions recorded so far.
    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    /// Copy `src` onto `dest`, recording how to undo it.
    ///
    /// An existing `dest` is first backed up into scratch and the undo
    /// action restores it; a `dest` that did not exist gets a
    /// delete-on-undo action. Missing parent directories of `dest` are
    /// created. On failure nothing is recorded and `dest` keeps its prior
    /// content.
    pub fn copy_file(&mut self, src: &Path, dest: &Path) -> Result<(), TransactionError> {
        if !self.active {
            return Err(TransactionError::NotActive);
        }

        let src = adapt_path(src);
        let dest = adapt_path(dest);

        let action = if dest.exists() {
            let backup = self.backup_path("", &dest);
            replace_file(&dest, &backup).map_err(|source| TransactionError::Backup {
                path: dest.clone(),
                source,
            })?;
            UndoAction::Restore {
                backup,
                dest: dest.clone(),
            }
        } else {
            UndoAction::Remove { path: dest.clone() }
        };

        if let Err(source) = replace_file(&src, &dest) {
            return Err(TransactionError::Copy { src, dest, source });
        }

        self.diag.info(
            "txn",
            &format!("copied {} -> {}", src.display(), dest.display()),
        );
        self.undo.push(action);
        Ok(())
    }

    /// Copy `src` onto `dest` unless both already hold identical bytes.
    /// Returns whether a copy actually happened.
    pub fn copy_if_changed(&mut self, src: &Path, dest: &Path) -> Result<bool, TransactionError> {
        if !self.active {
            return Err(TransactionError::NotActive);
        }

        let src_abs = adapt_path(src);
        let dest_abs = adapt_path(dest);
        if dest_abs.exists() && files_match(&src_abs, &dest_abs) {
            self.diag.info(
                "txn",
                &format!("unchanged, skipping {}", dest_abs.display()),
            );
            return Ok(false);
        }

        self.copy_file(src, dest)?;
        Ok(true)
    }

    /// Delete `target`, recording how to restore it.
    ///
    /// A `target` that does not exist is a successful no-op and records
    /// nothing. The backup is captured before the delete, so even a
    /// failed delete leaves the restore action recorded and rollback
    /// still recovers the original bytes.
    pub fn delete_file(&mut self, target: &Path) -> Result<(), TransactionError> {
        if !self.active {
            return Err(TransactionError::NotActive);
        }

        let target = adapt_path(target);
        if !target.exists() {
            return Ok(());
        }

        let backup = self.backup_path("del_", &target);
        replace_file(&target, &backup).map_err(|source| TransactionError::Backup {
            path: target.clone(),
            source,
        })?;
        self.undo.push(UndoAction::Restore {
            backup,
            dest: target.clone(),
        });

        if let Err(source) = fs::remove_file(&target) {
            return Err(TransactionError::Delete {
                path: target,
                source,
            });
        }

        self.diag
            .info("txn", &format!("deleted {}", target.display()));
        Ok(())
    }

    /// Keep all mutations: discard the undo log and deactivate. Calling
    /// this on an inactive transaction is a no-op.
    pub fn commit(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        self.undo.clear();
        self.diag.info("txn", "transaction committed");
    }

    /// Replay every undo action newest-first, then deactivate. A failing
    /// action is reported through the diagnostics sink and the remaining
    /// actions still run. A no-op on an inactive transaction.
    pub fn rollback(&mut self) {
        if !self.active {
            return;
        }

        self.diag.info(
            "txn",
            &format!("rolling back {} actions", self.undo.len()),
        );
        for action in self.undo.drain(..).rev() {
            if let Err(err) = action.apply() {
                self.diag.warn(
                    "txn",
                    &format!("rollback step failed ({}): {}", action.describe(), err),
                );
            }
        }
        self.active = false;
    }

    /// Backup file name inside scratch: the undo index keeps repeated
    /// mutations of same-named files apart.
    fn backup_path(&self, tag: &str, origin: &Path) -> PathBuf {
        let file_name = origin
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        self.scratch
            .as_ref()
            .expect("scratch directory lives until drop")
            .path()
            .join(format!("{}_{}{}", self.undo.len(), tag, file_name))
    }
}

impl Drop for FileTransaction {
    fn drop(&mut self) {
        self.rollback();
        if let Some(scratch) = self.scratch.take() {
            let path = scratch.path().to_path_buf();
            if let Err(err) = scratch.close() {
                self.diag.warn(
                    "txn",
                    &format!("failed to remove scratch {}: {}", path.display(), err),
                );
            }
        }
    }
}
