//! JSON bootstrap: load a JSON document into the tree.
//!
//! Objects become branches (via `ensure_branch`, so empty objects survive)
//! and scalars become leaves (via `set`). Each step is an ordinary logged
//! mutation. Arrays and `null` have no tree counterpart and are rejected
//! before anything is applied.

use std::path::Path;

use serde_json::{Map, Value};
use tracing::info;

use crate::error::{ConfigError, Result};
use crate::tree::{ConfigPath, ConfigTree, Scalar};

/// One step of an ingestion plan.
#[derive(Debug, Clone, PartialEq)]
enum Step {
    Branch(ConfigPath),
    Set(ConfigPath, Scalar),
}

/// Ingest a JSON object into `tree`. Returns the number of mutations
/// issued. The document is fully validated first; a `TypeConflict` against
/// existing contents can still stop ingestion part way.
pub fn ingest(tree: &mut ConfigTree, document: &Value) -> Result<usize> {
    let steps = plan(document)?;
    for step in &steps {
        match step {
            Step::Branch(path) => tree.ensure_branch(path)?,
            Step::Set(path, value) => tree.set(path, value.clone())?,
        }
    }
    Ok(steps.len())
}

/// Read a JSON file and ingest it.
pub fn load_json(tree: &mut ConfigTree, path: &Path) -> Result<usize> {
    let content = std::fs::read_to_string(path)?;
    let document: Value = serde_json::from_str(&content)?;
    let count = ingest(tree, &document)?;
    info!(path = %path.display(), mutations = count, "ingested JSON document");
    Ok(count)
}

/// Flatten the document into steps in document order, parents before
/// children. Walks with an explicit stack.
fn plan(document: &Value) -> Result<Vec<Step>> {
    let root = match document {
        Value::Object(map) => map,
        other => {
            return Err(ConfigError::InvalidValue(format!(
                "JSON document must be an object, found {}",
                json_kind(other)
            )))
        }
    };

    let mut steps = Vec::new();
    let mut stack: Vec<(Option<ConfigPath>, &Map<String, Value>)> = vec![(None, root)];
    while let Some((prefix, map)) = stack.pop() {
        let mut nested = Vec::new();
        for (key, value) in map {
            let path = match &prefix {
                Some(p) => p.child(key)?,
                None => ConfigPath::from_segments([key.as_str()])?,
            };
            match value {
                Value::Object(inner) => {
                    steps.push(Step::Branch(path.clone()));
                    nested.push((Some(path), inner));
                }
                other => steps.push(Step::Set(path.clone(), scalar(&path, other)?)),
            }
        }
        // Reverse so siblings are expanded in document order.
        stack.extend(nested.into_iter().rev());
    }
    Ok(steps)
}

fn scalar(path: &ConfigPath, value: &Value) -> Result<Scalar> {
    match value {
        Value::Bool(b) => Ok(Scalar::Bool(*b)),
        Value::String(s) => Ok(Scalar::Str(s.clone())),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Scalar::Int(i))
            } else if n.is_u64() {
                Err(ConfigError::InvalidValue(format!(
                    "integer {} at '{}' does not fit in 64 signed bits",
                    n, path
                )))
            } else {
                n.as_f64().map(Scalar::Float).ok_or_else(|| {
                    ConfigError::InvalidValue(format!("number {} at '{}'", n, path))
                })
            }
        }
        other => Err(ConfigError::InvalidValue(format!(
            "{} at '{}' cannot be stored",
            json_kind(other),
            path
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
