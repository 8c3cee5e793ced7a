//! End-to-end WAL recovery test (S5): a crash between WAL append and
//! task-file save must replay cleanly to the same final state, and
//! `checkpoint()` must leave no uncommitted changes behind.

use coordination::wal::{replay, TaskWal, WalEntry};
use tempfile::tempdir;

#[derive(Clone, PartialEq, Debug)]
enum Status {
    Pending,
    InProgress,
    Completed,
}

fn status_of(s: &str) -> Option<Status> {
    match s {
        "Pending" => Some(Status::Pending),
        "InProgress" => Some(Status::InProgress),
        "Completed" => Some(Status::Completed),
        _ => None,
    }
}

#[test]
fn replay_after_crash_reaches_completed_and_checkpoint_clears_wal() {
    let dir = tempdir().unwrap();
    let state_file = dir.path().join("task-42.json");
    std::fs::write(&state_file, r#"{"status":"Pending"}"#).unwrap();

    let wal = TaskWal::for_state_file(&state_file);
    wal.append(&WalEntry::new("task-42", "Pending", "InProgress"))
        .unwrap();
    wal.append(&WalEntry::new("task-42", "InProgress", "InProgress"))
        .unwrap();
    wal.append(&WalEntry::new("task-42", "InProgress", "Completed"))
        .unwrap();

    // Simulate a crash: the task-file save never happened, only the WAL
    // survives. Recovery replays it to find the final status.
    let entries = wal.read_all().unwrap();
    assert_eq!(entries.len(), 3);
    let recovered = replay(Status::Pending, &entries, status_of);
    assert_eq!(recovered, Status::Completed);

    // A real caller now persists `recovered` into the task file before
    // checkpointing; here we just assert the checkpoint clears the WAL
    // so a subsequent run finds no uncommitted changes.
    wal.checkpoint().unwrap();
    assert!(!wal.has_uncommitted_changes().unwrap());
}

#[test]
fn heartbeat_entries_are_idempotent_during_replay() {
    let dir = tempdir().unwrap();
    let state_file = dir.path().join("task-7.json");
    std::fs::write(&state_file, r#"{"status":"InProgress"}"#).unwrap();

    let wal = TaskWal::for_state_file(&state_file);
    wal.append(&WalEntry::new("task-7", "InProgress", "InProgress"))
        .unwrap();
    wal.append(&WalEntry::new("task-7", "InProgress", "InProgress"))
        .unwrap();

    let entries = wal.read_all().unwrap();
    let recovered = replay(Status::Pending, &entries, status_of);
    assert_eq!(recovered, Status::InProgress);
    assert!(wal.has_uncommitted_changes().unwrap());
}
