//! Operation dispatch: maps each parsed `Operation` onto the matching
//! `ConfigTree` call and reports the result as an `Outcome`.
//!
//! Dispatch holds no state and interprets nothing; errors from the tree
//! pass through unchanged.

use serde::Serialize;

use crate::error::Result;
use crate::query::Operation;
use crate::tree::{ConfigPath, ConfigTree, GetResult, TreeValue};

/// Result of executing one operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "value", rename_all = "snake_case")]
pub enum Outcome {
    /// A read found a leaf or a branch.
    Found(TreeValue),
    /// A safe read found nothing.
    Absent,
    /// A write or delete was applied.
    Applied,
}

impl Outcome {
    pub fn value(&self) -> Option<&TreeValue> {
        match self {
            Outcome::Found(v) => Some(v),
            _ => None,
        }
    }

    /// JSON form of a read result: the value itself, or `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Outcome::Found(v) => v.to_json(),
            Outcome::Absent | Outcome::Applied => serde_json::Value::Null,
        }
    }
}

impl From<GetResult> for Outcome {
    fn from(result: GetResult) -> Self {
        match result.into_value() {
            Some(value) => Outcome::Found(value),
            None => Outcome::Absent,
        }
    }
}

/// Execute `op` against `tree`.
pub fn dispatch(tree: &mut ConfigTree, op: Operation) -> Result<Outcome> {
    match op {
        Operation::Read { path, safe } => dispatch_read(tree, &path, safe),
        Operation::Write { path, value } => {
            tree.set(&path, value)?;
            Ok(Outcome::Applied)
        }
        Operation::Delete { path } => {
            tree.delete(&path)?;
            Ok(Outcome::Applied)
        }
    }
}

/// Execute a read. Needs only shared access to the tree.
pub fn dispatch_read(tree: &ConfigTree, path: &ConfigPath, safe: bool) -> Result<Outcome> {
    tree.get(path, safe).map(Outcome::from)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
