//! Write-ahead log record codec.
//!
//! Each committed mutation is recorded as a `LogRecord` before it is applied
//! to the tree. On startup the records past the snapshot's sequence are
//! replayed to reconstruct the pre-crash state. Records are serialized as
//! JSON lines (one record per line) and carry an FNV-1a checksum so a
//! damaged line is detected rather than replayed.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::tree::{ConfigPath, Scalar};

// ---------------------------------------------------------------------------
// Mutation
// ---------------------------------------------------------------------------

/// An effective change to the tree, as recorded in the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "UPPERCASE")]
pub enum Mutation {
    /// Store a scalar at `path`, creating interior nodes on the way.
    Write { path: ConfigPath, value: Scalar },
    /// Remove the node at `path` and its whole subtree.
    Delete { path: ConfigPath },
    /// Materialize interior nodes down to `path` without a value.
    Branch { path: ConfigPath },
}

impl Mutation {
    pub fn path(&self) -> &ConfigPath {
        match self {
            Mutation::Write { path, .. } => path,
            Mutation::Delete { path } => path,
            Mutation::Branch { path } => path,
        }
    }

    /// Upper-case operation label, as written to the log.
    pub fn kind(&self) -> &'static str {
        match self {
            Mutation::Write { .. } => "WRITE",
            Mutation::Delete { .. } => "DELETE",
            Mutation::Branch { .. } => "BRANCH",
        }
    }
}

// ---------------------------------------------------------------------------
// LogRecord
// ---------------------------------------------------------------------------

/// A single log record with sequence number and checksum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub sequence: u64,
    pub operation: Mutation,
    pub checksum: String,
}

impl LogRecord {
    /// Stamp `operation` with `sequence` and its checksum.
    pub fn new(sequence: u64, operation: Mutation) -> Self {
        let checksum = Self::compute_checksum(sequence, &operation);
        LogRecord {
            sequence,
            operation,
            checksum,
        }
    }

    fn compute_checksum(sequence: u64, op: &Mutation) -> String {
        let op_json = serde_json::to_string(op).unwrap_or_default();
        let data = format!("{}:{}", sequence, op_json);
        format!("{:016x}", fnv1a_hash(data.as_bytes()))
    }

    /// Verify that the stored checksum matches the content.
    pub fn verify_checksum(&self) -> bool {
        self.checksum == Self::compute_checksum(self.sequence, &self.operation)
    }

    /// Encode as one newline-terminated JSON line.
    pub fn encode(&self) -> Result<String> {
        if let Mutation::Write { value, .. } = &self.operation {
            if !value.is_persistable() {
                return Err(ConfigError::InvalidValue(format!(
                    "{} cannot be written to the log",
                    value
                )));
            }
        }
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    /// Decode one JSON line and verify its checksum.
    pub fn decode(line: &str) -> std::result::Result<Self, String> {
        let record: LogRecord =
            serde_json::from_str(line.trim()).map_err(|e| format!("parse error: {}", e))?;
        if !record.verify_checksum() {
            return Err(format!(
                "checksum mismatch on record {}",
                record.sequence
            ));
        }
        Ok(record)
    }
}

// ---------------------------------------------------------------------------
// Journal
// ---------------------------------------------------------------------------

/// The decoded contents of a log file: records in append order with strictly
/// increasing sequence numbers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Journal {
    records: Vec<LogRecord>,
}

impl Journal {
    pub fn new() -> Self {
        Journal {
            records: Vec::new(),
        }
    }

    /// Append a record. Its sequence must exceed the last one.
    pub fn push(&mut self, record: LogRecord) -> std::result::Result<(), String> {
        if let Some(last) = self.last_sequence() {
            if record.sequence <= last {
                return Err(format!(
                    "sequence {} follows {}: log is out of order",
                    record.sequence, last
                ));
            }
        }
        self.records.push(record);
        Ok(())
    }

    /// Records with a sequence number strictly greater than `sequence`.
    pub fn entries_after(&self, sequence: u64) -> &[LogRecord] {
        let start = self.records.partition_point(|r| r.sequence <= sequence);
        &self.records[start..]
    }

    pub fn last_sequence(&self) -> Option<u64> {
        self.records.last().map(|r| r.sequence)
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    // -------------------------------------------------------------------
    // JSON lines serialization
    // -------------------------------------------------------------------

    /// Serialize every record as JSON lines.
    pub fn to_json_lines(&self) -> Result<String> {
        let mut out = String::new();
        for record in &self.records {
            out.push_str(&record.encode()?);
        }
        Ok(out)
    }

    /// Deserialize a journal from JSON lines.
    ///
    /// Blank lines are skipped. A malformed line, a checksum mismatch, or a
    /// sequence that does not increase is an error naming the line.
    pub fn from_json_lines(data: &str) -> std::result::Result<Self, String> {
        let mut journal = Journal::new();
        for (i, line) in data.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record = LogRecord::decode(line).map_err(|e| format!("line {}: {}", i + 1, e))?;
            journal
                .push(record)
                .map_err(|e| format!("line {}: {}", i + 1, e))?;
        }
        Ok(journal)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// FNV-1a 64-bit hash.
pub(crate) fn fnv1a_hash(data: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;
    let mut hash = FNV_OFFSET;
    for &byte in data {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
