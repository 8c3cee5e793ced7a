//! Task-State Write-Ahead Log — guarantees no state transition is lost
//! across crashes.
//!
//! One WAL file sits beside each task-state file it protects, named by
//! replacing the state file's extension with `.wal`. Entries are appended
//! as self-describing JSON lines (one record per line) under an exclusive
//! file lock so concurrent writers from different threads serialize
//! cleanly; a malformed line (partial write from a crash mid-append) is
//! skipped with a warning rather than aborting recovery.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A single recorded state transition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WalEntry {
    pub timestamp: DateTime<Utc>,
    pub task_id: String,
    pub previous_status: String,
    pub new_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl WalEntry {
    pub fn new(
        task_id: impl Into<String>,
        previous_status: impl Into<String>,
        new_status: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            task_id: task_id.into(),
            previous_status: previous_status.into(),
            new_status: new_status.into(),
            assigned_agent: None,
            error_message: None,
        }
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.assigned_agent = Some(agent.into());
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

/// Errors from WAL operations.
#[derive(Debug, thiserror::Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type WalResult<T> = Result<T, WalError>;

/// Derive the sibling `.wal` path for a task-state file.
pub fn wal_path_for(state_file: &Path) -> PathBuf {
    state_file.with_extension("wal")
}

/// Append-only log co-located with one task-state file.
pub struct TaskWal {
    path: PathBuf,
    lock: Mutex<()>,
}

impl TaskWal {
    /// Open (without creating) the WAL for `state_file`.
    pub fn for_state_file(state_file: &Path) -> Self {
        Self {
            path: wal_path_for(state_file),
            lock: Mutex::new(()),
        }
    }

    /// Open a WAL at an explicit path (tests may want this directly).
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry, flushing to disk under an exclusive lock.
    ///
    /// Fails with an IO error on disk failure; the caller must surface this
    /// (a WAL append failure aborts the transition it was meant to record —
    /// see the ordering guarantee in the concurrency model).
    pub fn append(&self, entry: &WalEntry) -> WalResult<()> {
        let _guard = self.lock.lock().expect("wal mutex poisoned");
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.lock_exclusive()?;
        let line = serde_json::to_string(entry)?;
        let result = (|| -> std::io::Result<()> {
            writeln!(file, "{}", line)?;
            file.flush()
        })();
        let _ = file.unlock();
        result?;
        Ok(())
    }

    /// Read all entries in file order. Malformed lines are skipped with a
    /// warning so a crash mid-write doesn't poison the whole recovery pass.
    pub fn read_all(&self) -> WalResult<Vec<WalEntry>> {
        let _guard = self.lock.lock().expect("wal mutex poisoned");
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.path)?;
        file.lock_shared()?;
        let reader = BufReader::new(&file);
        let mut entries = Vec::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    warn!(line = lineno, error = %e, "skipping unreadable WAL line");
                    continue;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<WalEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!(line = lineno, error = %e, "skipping malformed WAL line");
                }
            }
        }
        let _ = file.unlock();
        Ok(entries)
    }

    /// Delete the WAL file under the lock.
    pub fn checkpoint(&self) -> WalResult<()> {
        let _guard = self.lock.lock().expect("wal mutex poisoned");
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    /// True if the WAL exists and is non-empty.
    pub fn has_uncommitted_changes(&self) -> WalResult<bool> {
        let _guard = self.lock.lock().expect("wal mutex poisoned");
        match std::fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len() > 0),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Recovery protocol: replay a WAL onto the in-memory status, returning the
/// final status after applying every entry in order. Idempotent — a
/// `new_status` that matches the already-current status is a no-op
/// heartbeat entry.
pub fn replay<S>(current: S, entries: &[WalEntry], status_of: impl Fn(&str) -> Option<S>) -> S
where
    S: Clone + PartialEq,
{
    let mut state = current;
    for entry in entries {
        if let Some(new_state) = status_of(&entry.new_status) {
            if new_state != state {
                state = new_state;
            }
        }
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn append_and_read_all_preserves_order() {
        let dir = tempdir().unwrap();
        let wal = TaskWal::at_path(dir.path().join("task.wal"));
        wal.append(&WalEntry::new("t1", "Pending", "InProgress")).unwrap();
        wal.append(&WalEntry::new("t1", "InProgress", "InProgress")).unwrap();
        wal.append(&WalEntry::new("t1", "InProgress", "Completed")).unwrap();

        let entries = wal.read_all().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].new_status, "InProgress");
        assert_eq!(entries[2].new_status, "Completed");
    }

    #[test]
    fn checkpoint_removes_file() {
        let dir = tempdir().unwrap();
        let wal = TaskWal::at_path(dir.path().join("task.wal"));
        wal.append(&WalEntry::new("t1", "Pending", "InProgress")).unwrap();
        assert!(wal.has_uncommitted_changes().unwrap());
        wal.checkpoint().unwrap();
        assert!(!wal.has_uncommitted_changes().unwrap());
        assert!(wal.read_all().unwrap().is_empty());
    }

    #[test]
    fn malformed_line_is_skipped_not_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("task.wal");
        let wal = TaskWal::at_path(&path);
        wal.append(&WalEntry::new("t1", "Pending", "InProgress")).unwrap();
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            writeln!(f, "{{not valid json").unwrap();
        }
        wal.append(&WalEntry::new("t1", "InProgress", "Completed")).unwrap();

        let entries = wal.read_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].new_status, "Completed");
    }

    #[test]
    fn wal_path_for_replaces_extension() {
        let p = wal_path_for(Path::new("/a/b/task-state.json"));
        assert_eq!(p, Path::new("/a/b/task-state.wal"));
    }

    #[test]
    fn replay_applies_entries_idempotently() {
        #[derive(Clone, PartialEq, Debug)]
        enum St {
            Pending,
            InProgress,
            Completed,
        }
        let entries = vec![
            WalEntry::new("t1", "Pending", "InProgress"),
            WalEntry::new("t1", "InProgress", "InProgress"),
            WalEntry::new("t1", "InProgress", "Completed"),
        ];
        let of = |s: &str| match s {
            "Pending" => Some(St::Pending),
            "InProgress" => Some(St::InProgress),
            "Completed" => Some(St::Completed),
            _ => None,
        };
        let result = replay(St::Pending, &entries, of);
        assert_eq!(result, St::Completed);
    }

    #[test]
    fn has_uncommitted_changes_false_when_absent() {
        let dir = tempdir().unwrap();
        let wal = TaskWal::at_path(dir.path().join("missing.wal"));
        assert!(!wal.has_uncommitted_changes().unwrap());
    }
}
