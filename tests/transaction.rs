//! End-to-end transaction scenarios through the library surface.

use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tempfile::tempdir;

use upkeep::{FileTransaction, TransactionError};

fn write_file(path: &Path, content: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

#[test]
fn multi_file_update_commits_atomically() {
    let temp = tempdir().unwrap();
    let staged = temp.path().join("staged");
    let live = temp.path().join("live");
    write_file(&staged.join("tool.py"), b"new tool");
    write_file(&staged.join("README.md"), b"new readme");
    write_file(&live.join("tool.py"), b"old tool");
    write_file(&live.join("legacy.py"), b"legacy");

    let mut txn = FileTransaction::open().unwrap();
    txn.copy_file(&staged.join("tool.py"), &live.join("tool.py"))
        .unwrap();
    txn.copy_file(&staged.join("README.md"), &live.join("README.md"))
        .unwrap();
    txn.delete_file(&live.join("legacy.py")).unwrap();
    txn.commit();

    assert_eq!(fs::read(live.join("tool.py")).unwrap(), b"new tool");
    assert_eq!(fs::read(live.join("README.md")).unwrap(), b"new readme");
    assert!(!live.join("legacy.py").exists());
}

#[test]
fn failed_step_rolls_back_to_byte_identical_state() {
    let temp = tempdir().unwrap();
    let staged = temp.path().join("staged");
    let live = temp.path().join("live");
    // Non-text payloads so restoration is checked byte for byte.
    let original: Vec<u8> = (0u8..=255).cycle().take(4096).collect();
    write_file(&staged.join("a.bin"), b"replacement a");
    write_file(&live.join("a.bin"), &original);
    write_file(&live.join("b.bin"), &original);

    let mut txn = FileTransaction::open().unwrap();
    txn.copy_file(&staged.join("a.bin"), &live.join("a.bin"))
        .unwrap();
    txn.delete_file(&live.join("b.bin")).unwrap();

    // Third step fails: the source does not exist.
    let err = txn.copy_file(&staged.join("ghost.bin"), &live.join("c.bin"));
    assert!(matches!(err, Err(TransactionError::Copy { .. })));

    txn.rollback();
    assert_eq!(fs::read(live.join("a.bin")).unwrap(), original);
    assert_eq!(fs::read(live.join("b.bin")).unwrap(), original);
    assert!(!live.join("c.bin").exists());
}

#[test]
fn rollback_restores_original_mtime() {
    let temp = tempdir().unwrap();
    let src = temp.path().join("src.txt");
    let dest = temp.path().join("dest.txt");
    write_file(&src, b"new");
    write_file(&dest, b"old");

    let past = SystemTime::UNIX_EPOCH + Duration::from_secs(1_500_000_000);
    fs::File::open(&dest).unwrap().set_modified(past).unwrap();

    let mut txn = FileTransaction::open().unwrap();
    txn.copy_file(&src, &dest).unwrap();
    txn.rollback();

    let restored = fs::metadata(&dest).unwrap().modified().unwrap();
    assert_eq!(restored, past);
}

#[test]
fn dropping_scope_without_commit_undoes_everything() {
    let temp = tempdir().unwrap();
    let src = temp.path().join("src.txt");
    let dest = temp.path().join("nested/deep/dest.txt");
    write_file(&src, b"payload");

    {
        let mut txn = FileTransaction::open().unwrap();
        txn.copy_file(&src, &dest).unwrap();
        assert!(dest.exists());
        // No commit: leaving the scope must undo the copy.
    }

    assert!(!dest.exists());
}

#[test]
fn mutations_after_commit_are_rejected() {
    let temp = tempdir().unwrap();
    let src = temp.path().join("src.txt");
    write_file(&src, b"payload");

    let mut txn = FileTransaction::open().unwrap();
    txn.commit();

    assert!(matches!(
        txn.delete_file(&src),
        Err(TransactionError::NotActive)
    ));
    assert!(matches!(
        txn.copy_file(&src, &temp.path().join("dest.txt")),
        Err(TransactionError::NotActive)
    ));
    assert!(src.exists());
}

#[test]
fn repeated_overwrites_of_one_file_roll_back_to_first_state() {
    let temp = tempdir().unwrap();
    let dest = temp.path().join("dest.txt");
    let v1 = temp.path().join("v1.txt");
    let v2 = temp.path().join("v2.txt");
    write_file(&dest, b"original");
    write_file(&v1, b"version 1");
    write_file(&v2, b"version 2");

    let mut txn = FileTransaction::open().unwrap();
    txn.copy_file(&v1, &dest).unwrap();
    txn.copy_file(&v2, &dest).unwrap();
    assert_eq!(txn.undo_len(), 2);
    assert_eq!(fs::read(&dest).unwrap(), b"version 2");

    txn.rollback();
    assert_eq!(fs::read(&dest).unwrap(), b"original");
}

#[test]
fn rollback_continues_past_a_failed_undo_action() {
    let temp = tempdir().unwrap();
    let src = temp.path().join("src.txt");
    let a = temp.path().join("a.txt");
    let b = temp.path().join("b.txt");
    write_file(&src, b"incoming");
    write_file(&b, b"b original");

    let mut txn = FileTransaction::open().unwrap();
    txn.copy_file(&src, &b).unwrap();
    txn.copy_file(&src, &a).unwrap();
    assert_eq!(fs::read(&b).unwrap(), b"incoming");

    // Sabotage the newest undo action: "a" is now a non-empty directory,
    // which remove_file cannot unlink.
    fs::remove_file(&a).unwrap();
    fs::create_dir(&a).unwrap();
    fs::write(a.join("blocker.txt"), b"x").unwrap();

    txn.rollback();

    // The blocked removal is skipped; the older restore still ran.
    assert!(a.is_dir());
    assert_eq!(fs::read(&b).unwrap(), b"b original");
    assert!(!txn.is_active());
    assert_eq!(txn.undo_len(), 0);
}

#[test]
fn backup_failure_records_nothing_and_leaves_target() {
    let temp = tempdir().unwrap();
    // A directory target makes the file backup fail before any mutation.
    let target = temp.path().join("subdir");
    fs::create_dir_all(&target).unwrap();

    let mut txn = FileTransaction::open().unwrap();
    let err = txn.delete_file(&target);
    assert!(matches!(err, Err(TransactionError::Backup { .. })));
    assert_eq!(txn.undo_len(), 0);
    assert!(target.exists());
    txn.commit();
}
