//! Undo log actions
//!
//! Every successful mutation appends exactly one action describing how to
//! reverse it. Rollback replays the log newest-first; an action that
//! fails is reported by the caller and the rest still run.

use std::fs;
use std::io;
use std::path::PathBuf;

use crate::core::fsutil::replace_file;

/// How to reverse one prior mutation.
#[derive(Debug)]
pub enum UndoAction {
    /// Copy a captured backup back onto the destination. A backup that no
    /// longer exists is skipped; a destination that was deleted in the
    /// meantime is recreated.
    Restore { backup: PathBuf, dest: PathBuf },
    /// Delete a path that did not exist before the mutation created it.
    Remove { path: PathBuf },
}

impl UndoAction {
    /// Apply the reversal. Idempotent: replaying an already-applied
    /// action succeeds.
    pub fn apply(&self) -> io::Result<()> {
        match self {
            UndoAction::Restore { backup, dest } => {
                if !backup.exists() {
                    return Ok(());
                }
                replace_file(backup, dest)?;
                Ok(())
            }
            UndoAction::Remove { path } => match fs::remove_file(path) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(err) => Err(err),
            },
        }
    }

    /// Short description for rollback diagnostics.
    pub fn describe(&self) -> String {
        match self {
            UndoAction::Restore { dest, .. } => format!("restore {}", dest.display()),
            UndoAction::Remove { path } => format!("remove {}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restore_overwrites_destination() {
        let temp = tempfile::tempdir().unwrap();
        let backup = temp.path().join("backup.txt");
        let dest = temp.path().join("dest.txt");
        fs::write(&backup, "original").unwrap();
        fs::write(&dest, "mutated").unwrap();

        let action = UndoAction::Restore {
            backup,
            dest: dest.clone(),
        };
        action.apply().unwrap();
        assert_eq!(fs::read_to_string(&dest).unwrap(), "original");
    }

    #[test]
    fn test_restore_recreates_deleted_destination() {
        let temp = tempfile::tempdir().unwrap();
        let backup = temp.path().join("backup.txt");
        let dest = temp.path().join("sub/dest.txt");
        fs::write(&backup, "original").unwrap();

        let action = UndoAction::Restore {
            backup,
            dest: dest.clone(),
        };
        action.apply().unwrap();
        assert_eq!(fs::read_to_string(&dest).unwrap(), "original");
    }

    #[test]
    fn test_restore_missing_backup_is_noop() {
        let temp = tempfile::tempdir().unwrap();
        let dest = temp.path().join("dest.txt");
        fs::write(&dest, "kept").unwrap();

        let action = UndoAction::Restore {
            backup: temp.path().join("gone.txt"),
            dest: dest.clone(),
        };
        action.apply().unwrap();
        assert_eq!(fs::read_to_string(&dest).unwrap(), "kept");
    }

    #[test]
    fn test_remove_is_idempotent() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("created.txt");
        fs::write(&path, "x").unwrap();

        let action = UndoAction::Remove { path: path.clone() };
        action.apply().unwrap();
        assert!(!path.exists());
        action.apply().unwrap();
    }

    #[test]
    fn test_remove_blocked_by_directory_fails() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("taken");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("blocker.txt"), "x").unwrap();

        let action = UndoAction::Remove { path: path.clone() };
        assert!(action.apply().is_err());
        assert!(path.is_dir());
    }
}
