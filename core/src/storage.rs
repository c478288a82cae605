//! Storage runtime: the snapshot and write-ahead log of one directory.
//!
//! Lifecycle:
//!
//! ```text
//! Uninitialized --start(tree)--> Running --shutdown(tree)--> Closed
//! ```
//!
//! `start` restores the snapshot, replays the log records past it, and
//! attaches the runtime to the tree. While running, every mutation is
//! appended and synced before the tree applies it. `shutdown` writes a new
//! snapshot tagged with the last sequence and truncates the log.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{ConfigError, Result};
use crate::snapshot::checkpoint::{create_dir_durable, save_snapshot, sync_parent_dir};
use crate::snapshot::journal::{LogRecord, Mutation};
use crate::snapshot::recovery::{plan_recovery, RecoveryPlan};
use crate::tree::{ConfigTree, RecordSink};

/// Default snapshot file name inside a storage directory.
pub const SNAPSHOT_FILE: &str = "snapshot.cx";
/// Default log file name inside a storage directory.
pub const LOG_FILE: &str = "wal.cx";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    Uninitialized,
    Running,
    Closed,
}

// ---------------------------------------------------------------------------
// LogFile
// ---------------------------------------------------------------------------

/// The open, exclusively locked log file.
#[derive(Debug)]
struct LogFile {
    file: File,
    path: PathBuf,
    len: u64,
}

impl LogFile {
    fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            create_dir_durable(parent)?;
        }
        let created = !path.exists();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;
        // A fresh log's directory entry must be durable before any append
        // is reported committed.
        if created {
            sync_parent_dir(path)?;
        }
        lock_exclusive(&file, path)?;
        let len = file.metadata()?.len();
        Ok(LogFile {
            file,
            path: path.to_path_buf(),
            len,
        })
    }

    /// Write one encoded record and sync it. On failure the file is cut
    /// back to its previous length so no torn record is left behind.
    fn append(&mut self, line: &str) -> Result<()> {
        let result = self
            .file
            .write_all(line.as_bytes())
            .and_then(|_| self.file.sync_data());
        match result {
            Ok(()) => {
                self.len += line.len() as u64;
                Ok(())
            }
            Err(e) => {
                if let Err(trunc) = self.file.set_len(self.len) {
                    warn!(path = %self.path.display(), error = %trunc, "could not roll back torn log write");
                }
                Err(e.into())
            }
        }
    }

    fn truncate(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.set_len(0)?;
        self.file.sync_all()?;
        self.len = 0;
        Ok(())
    }
}

impl Drop for LogFile {
    fn drop(&mut self) {
        unlock(&self.file);
    }
}

#[cfg(unix)]
fn lock_exclusive(file: &File, path: &Path) -> Result<()> {
    use std::os::unix::io::AsRawFd;

    let ret = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if ret == 0 {
        return Ok(());
    }
    let err = std::io::Error::last_os_error();
    if err.kind() == std::io::ErrorKind::WouldBlock {
        return Err(ConfigError::StorageLocked {
            path: path.to_path_buf(),
        });
    }
    Err(err.into())
}

#[cfg(not(unix))]
fn lock_exclusive(_file: &File, _path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn unlock(file: &File) {
    use std::os::unix::io::AsRawFd;

    unsafe {
        libc::flock(file.as_raw_fd(), libc::LOCK_UN);
    }
}

#[cfg(not(unix))]
fn unlock(_file: &File) {}

// ---------------------------------------------------------------------------
// StorageRuntime
// ---------------------------------------------------------------------------

/// Owns the snapshot and log files for one tree.
#[derive(Debug)]
pub struct StorageRuntime {
    snapshot_path: PathBuf,
    log_path: PathBuf,
    state: RuntimeState,
    log: Option<LogFile>,
    last_sequence: u64,
    appended: u64,
}

impl StorageRuntime {
    pub fn new(snapshot_path: impl Into<PathBuf>, log_path: impl Into<PathBuf>) -> Self {
        StorageRuntime {
            snapshot_path: snapshot_path.into(),
            log_path: log_path.into(),
            state: RuntimeState::Uninitialized,
            log: None,
            last_sequence: 0,
            appended: 0,
        }
    }

    /// Runtime over `dir/snapshot.cx` and `dir/wal.cx`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(SNAPSHOT_FILE), dir.join(LOG_FILE))
    }

    pub fn state(&self) -> RuntimeState {
        self.state
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Records appended since `start`.
    pub fn appended(&self) -> u64 {
        self.appended
    }

    /// Read both files and describe what `start` would replay.
    pub fn plan(&self) -> Result<RecoveryPlan> {
        plan_recovery(&self.snapshot_path, &self.log_path)
    }

    /// Recover `tree` from disk and attach this runtime to it.
    ///
    /// The tree's previous contents are replaced by the recovered state
    /// (empty on a cold start). Any unreadable or inconsistent file fails
    /// with `RecoveryFailure` and leaves the tree detached.
    pub fn start(mut self, tree: &mut ConfigTree) -> Result<()> {
        match self.state {
            RuntimeState::Uninitialized => {}
            RuntimeState::Running => return Err(ConfigError::AlreadyAttached),
            RuntimeState::Closed => return Err(ConfigError::StorageClosed),
        }
        if tree.is_attached() {
            return Err(ConfigError::AlreadyAttached);
        }

        // Lock before reading so no other process appends mid-recovery.
        let log = LogFile::open(&self.log_path)?;
        let plan = self.plan()?;
        info!(
            snapshot = %self.snapshot_path.display(),
            log = %self.log_path.display(),
            "recovery: {}",
            plan.summary()
        );
        if plan.skipped > 0 {
            warn!(
                skipped = plan.skipped,
                "log holds records already folded into the snapshot; last compaction was interrupted"
            );
        }

        // Rebuild into a scratch tree so a failed recovery leaves the
        // caller's tree untouched.
        let mut rebuilt = ConfigTree::new();
        if let Some(snapshot) = &plan.snapshot {
            rebuilt
                .restore(snapshot)
                .map_err(|e| ConfigError::recovery(&self.snapshot_path, e.to_string()))?;
        }
        for record in &plan.records {
            rebuilt.replay(&record.operation).map_err(|e| {
                ConfigError::recovery(
                    &self.log_path,
                    format!("record {} ({}): {}", record.sequence, record.operation.kind(), e),
                )
            })?;
        }
        *tree = rebuilt;

        self.last_sequence = plan.last_sequence();
        self.log = Some(log);
        self.state = RuntimeState::Running;
        info!(
            sequence = self.last_sequence,
            replayed = plan.records.len(),
            nodes = tree.node_count(),
            "recovery complete"
        );
        tree.attach(Box::new(self))
    }

    /// Durably append one mutation. Returns its sequence number.
    pub fn append(&mut self, mutation: &Mutation) -> Result<u64> {
        if self.state != RuntimeState::Running {
            return Err(ConfigError::StorageClosed);
        }
        let log = self.log.as_mut().ok_or(ConfigError::StorageClosed)?;
        let sequence = self.last_sequence + 1;
        let record = LogRecord::new(sequence, mutation.clone());
        log.append(&record.encode()?)?;
        self.last_sequence = sequence;
        self.appended += 1;
        debug!(sequence, op = mutation.kind(), "appended log record");
        Ok(sequence)
    }

    /// Fold the tree into a fresh snapshot and truncate the log. A second
    /// call is a no-op.
    pub fn shutdown(&mut self, tree: &ConfigTree) -> Result<()> {
        match self.state {
            RuntimeState::Closed => return Ok(()),
            RuntimeState::Uninitialized => {
                self.state = RuntimeState::Closed;
                return Ok(());
            }
            RuntimeState::Running => {}
        }

        let snapshot = tree.snapshot(self.last_sequence);
        save_snapshot(&snapshot, &self.snapshot_path)?;
        if let Some(mut log) = self.log.take() {
            log.truncate()?;
        }
        self.state = RuntimeState::Closed;
        info!(
            sequence = self.last_sequence,
            nodes = snapshot.entries.len(),
            appended = self.appended,
            "compacted log into snapshot"
        );
        Ok(())
    }
}

impl RecordSink for StorageRuntime {
    fn append(&mut self, mutation: &Mutation) -> Result<u64> {
        StorageRuntime::append(self, mutation)
    }

    fn shutdown(&mut self, tree: &ConfigTree) -> Result<()> {
        StorageRuntime::shutdown(self, tree)
    }

    fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    fn is_closed(&self) -> bool {
        self.state == RuntimeState::Closed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
