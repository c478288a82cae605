//! Full tree snapshot, tagged with the last log sequence it incorporates.
//!
//! The snapshot is a flat, path-sorted list of nodes rather than a nested
//! document, so neither writing nor reading it recurses with tree depth.
//! Sorting puts every parent before its children, which is the order
//! restoration needs.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::journal::fnv1a_hash;
use crate::tree::{ConfigPath, Scalar};

/// Snapshot format version written by this crate.
pub const SNAPSHOT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// SnapshotEntry
// ---------------------------------------------------------------------------

/// One node: a leaf with its value, or an interior node with `value: None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub path: ConfigPath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Scalar>,
}

// ---------------------------------------------------------------------------
// SnapshotMetadata
// ---------------------------------------------------------------------------

/// Lightweight summary for logs and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub sequence: u64,
    pub node_count: usize,
    pub leaf_count: usize,
    pub checksum: String,
}

// ---------------------------------------------------------------------------
// TreeSnapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeSnapshot {
    pub version: u32,
    /// Sequence of the last log record folded into this snapshot; 0 if none.
    pub sequence: u64,
    pub entries: Vec<SnapshotEntry>,
    pub checksum: String,
}

impl TreeSnapshot {
    /// Build a snapshot from unordered entries.
    pub fn new(sequence: u64, mut entries: Vec<SnapshotEntry>) -> Self {
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        let checksum = Self::compute_checksum(sequence, &entries);
        TreeSnapshot {
            version: SNAPSHOT_VERSION,
            sequence,
            entries,
            checksum,
        }
    }

    /// The cold-start base: no nodes, nothing folded in.
    pub fn empty() -> Self {
        Self::new(0, Vec::new())
    }

    fn compute_checksum(sequence: u64, entries: &[SnapshotEntry]) -> String {
        let json = serde_json::to_string(entries).unwrap_or_default();
        let data = format!("{}:{}", sequence, json);
        format!("{:016x}", fnv1a_hash(data.as_bytes()))
    }

    pub fn verify_checksum(&self) -> bool {
        self.checksum == Self::compute_checksum(self.sequence, &self.entries)
    }

    pub fn metadata(&self) -> SnapshotMetadata {
        SnapshotMetadata {
            sequence: self.sequence,
            node_count: self.entries.len(),
            leaf_count: self.entries.iter().filter(|e| e.value.is_some()).count(),
            checksum: self.checksum.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // -------------------------------------------------------------------
    // Serialization
    // -------------------------------------------------------------------

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| format!("snapshot parse error: {}", e))
    }

    // -------------------------------------------------------------------
    // Validation
    // -------------------------------------------------------------------

    /// Check the snapshot can be restored exactly. Returns every problem
    /// found; an empty list means it is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.version != SNAPSHOT_VERSION {
            errors.push(format!("unsupported snapshot version {}", self.version));
        }
        if !self.verify_checksum() {
            errors.push("snapshot checksum mismatch".into());
        }

        let mut seen: HashSet<&ConfigPath> = HashSet::new();
        for (i, entry) in self.entries.iter().enumerate() {
            if let Some(prev) = i.checked_sub(1).map(|p| &self.entries[p]) {
                if prev.path >= entry.path {
                    errors.push(format!("entries not sorted at '{}'", entry.path));
                }
            }
            if !seen.insert(&entry.path) {
                errors.push(format!("duplicate entry '{}'", entry.path));
            }
            if let Some(parent) = entry.path.parent() {
                if !seen.contains(&parent) {
                    errors.push(format!("entry '{}' has no parent entry", entry.path));
                }
            }
            if let Some(value) = &entry.value {
                if !value.is_persistable() {
                    errors.push(format!("entry '{}' holds a non-finite float", entry.path));
                }
                // Sorted order places descendants directly after their ancestor.
                if let Some(next) = self.entries.get(i + 1) {
                    if next.path.starts_with(&entry.path) {
                        errors.push(format!("leaf '{}' has children", entry.path));
                    }
                }
            }
        }
        errors
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
