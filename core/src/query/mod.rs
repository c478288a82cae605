//! ConfigXQL: the three-operation query language.
//!
//! ```text
//! app.ui.theme            read, PathNotFound if missing
//! app.ui.theme!           safe read, absent if missing
//! app.ui.theme="dark"     write
//! app.ui.theme-           delete
//! ```

pub mod parser;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tree::{ConfigPath, Scalar};

pub use parser::{parse, parse_script};

/// One parsed statement, ready for dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Read { path: ConfigPath, safe: bool },
    Write { path: ConfigPath, value: Scalar },
    Delete { path: ConfigPath },
}

impl Operation {
    pub fn path(&self) -> &ConfigPath {
        match self {
            Operation::Read { path, .. }
            | Operation::Write { path, .. }
            | Operation::Delete { path } => path,
        }
    }

    /// Whether executing this operation changes the tree.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Operation::Read { .. })
    }
}

/// Formats back to ConfigXQL source.
impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Read { path, safe: false } => write!(f, "{}", path),
            Operation::Read { path, safe: true } => write!(f, "{}!", path),
            Operation::Write { path, value } => write!(f, "{}={}", path, value),
            Operation::Delete { path } => write!(f, "{}-", path),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
