//! Recovery planning from the snapshot and log files.
//!
//! On startup the snapshot (if any) is the base and every log record past
//! its sequence is replayed in append order. Records at or below the
//! snapshot sequence are already folded in; they only exist when a crash hit
//! between writing a snapshot and truncating the log, and are skipped.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::Serialize;

use super::checkpoint::load_snapshot;
use super::journal::{Journal, LogRecord};
use super::state::TreeSnapshot;
use crate::error::{ConfigError, Result};

// ---------------------------------------------------------------------------
// RecoveryPlan
// ---------------------------------------------------------------------------

/// What `StorageRuntime::start` will do to rebuild the tree.
#[derive(Debug, Clone, Serialize)]
pub struct RecoveryPlan {
    /// Base state; `None` on cold start.
    pub snapshot: Option<TreeSnapshot>,
    /// Records to replay, in order.
    pub records: Vec<LogRecord>,
    /// Records already covered by the snapshot.
    pub skipped: usize,
}

impl RecoveryPlan {
    /// Combine a snapshot and a decoded log. Fails if the records to replay
    /// do not continue the snapshot's sequence without a gap.
    pub fn build(snapshot: Option<TreeSnapshot>, journal: &Journal) -> std::result::Result<Self, String> {
        let base = snapshot.as_ref().map(|s| s.sequence).unwrap_or(0);
        let records = journal.entries_after(base).to_vec();
        let skipped = journal.len() - records.len();

        let mut expected = base + 1;
        for record in &records {
            if record.sequence != expected {
                return Err(format!(
                    "expected record {} but found {}: log history is incomplete",
                    expected, record.sequence
                ));
            }
            expected += 1;
        }

        Ok(RecoveryPlan {
            snapshot,
            records,
            skipped,
        })
    }

    pub fn snapshot_sequence(&self) -> u64 {
        self.snapshot.as_ref().map(|s| s.sequence).unwrap_or(0)
    }

    /// Sequence of the last mutation the rebuilt tree will contain.
    pub fn last_sequence(&self) -> u64 {
        self.records
            .last()
            .map(|r| r.sequence)
            .unwrap_or_else(|| self.snapshot_sequence())
    }

    /// Whether there is nothing on disk to recover.
    pub fn is_empty(&self) -> bool {
        self.snapshot.is_none() && self.records.is_empty()
    }

    /// A brief summary of the plan.
    pub fn summary(&self) -> String {
        match &self.snapshot {
            Some(s) => format!(
                "restore snapshot @{} ({} nodes) then replay {} records ({} skipped)",
                s.sequence,
                s.entries.len(),
                self.records.len(),
                self.skipped
            ),
            None if self.records.is_empty() => "nothing to recover".to_string(),
            None => format!("replay {} records from log (no snapshot)", self.records.len()),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Read and decode a log file. A missing file is an empty journal.
pub fn load_journal(path: &Path) -> Result<Journal> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Journal::new()),
        Err(e) => return Err(ConfigError::recovery(path, format!("read error: {}", e))),
    };
    Journal::from_json_lines(&content).map_err(|e| ConfigError::recovery(path, e))
}

/// Load both files and build the plan.
pub fn plan_recovery(snapshot_path: &Path, log_path: &Path) -> Result<RecoveryPlan> {
    let snapshot = load_snapshot(snapshot_path)?;
    let journal = load_journal(log_path)?;
    RecoveryPlan::build(snapshot, &journal).map_err(|e| ConfigError::recovery(log_path, e))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
