//! Values stored in and read out of the tree.
//!
//! Leaves hold a `Scalar`. Reads of interior nodes produce a `Mapping`, a
//! nested, key-ordered projection of the live subtree.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A typed leaf value. Types are preserved end to end: `1`, `1.0`, `"1"` and
/// `true` are four different values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Scalar {
    /// Short type label used by the tree renderer and error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Scalar::Bool(_) => "bool",
            Scalar::Int(_) => "int",
            Scalar::Float(_) => "float",
            Scalar::Str(_) => "str",
        }
    }

    /// Floats must be finite to survive a trip through the log.
    pub fn is_persistable(&self) -> bool {
        match self {
            Scalar::Float(f) => f.is_finite(),
            _ => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// Renders in query-literal form: strings quoted, floats with a decimal point.
impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{:?}", x),
            Scalar::Str(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Str(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Str(s)
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Int(i)
    }
}

impl From<i32> for Scalar {
    fn from(i: i32) -> Self {
        Scalar::Int(i as i64)
    }
}

impl From<f64> for Scalar {
    fn from(f: f64) -> Self {
        Scalar::Float(f)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

/// Key-ordered projection of a branch.
pub type Mapping = BTreeMap<String, TreeValue>;

/// Either a leaf scalar or a nested mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeValue {
    Leaf(Scalar),
    Branch(Mapping),
}

impl TreeValue {
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            TreeValue::Leaf(s) => Some(s),
            TreeValue::Branch(_) => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            TreeValue::Leaf(_) => None,
            TreeValue::Branch(m) => Some(m),
        }
    }

    /// Convert to a plain JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        // Every Scalar variant has a JSON counterpart; non-finite floats
        // become null, matching serde_json's own behaviour.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl From<Scalar> for TreeValue {
    fn from(s: Scalar) -> Self {
        TreeValue::Leaf(s)
    }
}

/// Result of a read. `NotFound` only appears on a safe read; it is never
/// conflated with a stored `false`, `0`, `""`, or an empty branch.
#[derive(Debug, Clone, PartialEq)]
pub enum GetResult {
    /// The path resolved to a leaf.
    Leaf(Scalar),
    /// The path resolved to an interior node (possibly childless).
    Branch(Mapping),
    /// Safe read of a path that does not exist.
    NotFound,
}

impl GetResult {
    pub fn is_found(&self) -> bool {
        !matches!(self, GetResult::NotFound)
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            GetResult::Leaf(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            GetResult::Branch(m) => Some(m),
            _ => None,
        }
    }

    /// Collapse into an optional `TreeValue`.
    pub fn into_value(self) -> Option<TreeValue> {
        match self {
            GetResult::Leaf(s) => Some(TreeValue::Leaf(s)),
            GetResult::Branch(m) => Some(TreeValue::Branch(m)),
            GetResult::NotFound => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
