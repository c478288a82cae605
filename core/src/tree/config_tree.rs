//! The configuration tree.
//!
//! `ConfigTree` owns the node arena and implements path resolution and the
//! get / set / delete / ensure_branch / to_dict contract. Every mutation is
//! validated first, handed to the attached `RecordSink` (if any), and only
//! then applied, so a rejected or unlogged mutation never touches the tree.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use super::node::{NodeArena, NodeId};
use super::path::ConfigPath;
use super::value::{GetResult, Mapping, Scalar, TreeValue};
use crate::error::{ConfigError, Result};
use crate::snapshot::journal::Mutation;
use crate::snapshot::state::{SnapshotEntry, TreeSnapshot};

// ---------------------------------------------------------------------------
// RecordSink
// ---------------------------------------------------------------------------

/// Durability backend attached to a tree.
///
/// `append` must not return until the record is durable. `shutdown` folds
/// the tree's state into permanent storage and must be idempotent.
pub trait RecordSink: Send + Sync {
    /// Record a mutation; returns the sequence number assigned to it.
    fn append(&mut self, mutation: &Mutation) -> Result<u64>;

    /// Compact the tree's current state and close.
    fn shutdown(&mut self, tree: &ConfigTree) -> Result<()>;

    /// Sequence of the last record appended or recovered.
    fn last_sequence(&self) -> u64;

    /// True once `shutdown` has completed.
    fn is_closed(&self) -> bool;
}

// ---------------------------------------------------------------------------
// ConfigTree
// ---------------------------------------------------------------------------

/// Hierarchical key/value tree addressed by dotted paths.
pub struct ConfigTree {
    arena: NodeArena,
    sink: Option<Box<dyn RecordSink>>,
}

impl ConfigTree {
    /// Create an empty tree with no storage attached.
    pub fn new() -> Self {
        ConfigTree {
            arena: NodeArena::new(),
            sink: None,
        }
    }

    /// Attach a durability backend. A tree takes at most one for its whole
    /// life.
    pub fn attach(&mut self, sink: Box<dyn RecordSink>) -> Result<()> {
        if self.sink.is_some() {
            return Err(ConfigError::AlreadyAttached);
        }
        self.sink = Some(sink);
        Ok(())
    }

    pub fn is_attached(&self) -> bool {
        self.sink.is_some()
    }

    /// Sequence of the last durable mutation, if storage is attached.
    pub fn last_sequence(&self) -> Option<u64> {
        self.sink.as_ref().map(|s| s.last_sequence())
    }

    /// Whether attached storage has been shut down.
    pub fn is_closed(&self) -> bool {
        self.sink.as_ref().is_some_and(|s| s.is_closed())
    }

    // -------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------

    /// Resolve `path`. A leaf yields its scalar, an interior node yields a
    /// nested mapping of its live subtree. A miss fails with `PathNotFound`
    /// unless `safe`, in which case it yields `GetResult::NotFound`.
    pub fn get(&self, path: &ConfigPath, safe: bool) -> Result<GetResult> {
        let id = match self.resolve(path) {
            Some(id) => id,
            None if safe => return Ok(GetResult::NotFound),
            None => return Err(ConfigError::not_found(path)),
        };
        match self.arena.node(id).value() {
            Some(value) => Ok(GetResult::Leaf(value.clone())),
            None => Ok(GetResult::Branch(self.project(id))),
        }
    }

    /// Whether `path` resolves to a node.
    pub fn contains(&self, path: &ConfigPath) -> bool {
        self.resolve(path).is_some()
    }

    /// The whole tree as a nested mapping.
    pub fn to_dict(&self) -> Mapping {
        self.project(self.arena.root())
    }

    /// Number of nodes, excluding the root.
    pub fn node_count(&self) -> usize {
        self.arena.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Structural invariant check; empty when the tree is consistent.
    pub fn validate(&self) -> Vec<String> {
        self.arena.validate()
    }

    // -------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------

    /// Store `value` at `path`, creating missing interior nodes. Fails with
    /// `TypeConflict` if the terminal node has children or an ancestor on
    /// the way is a leaf.
    pub fn set(&mut self, path: &ConfigPath, value: Scalar) -> Result<()> {
        if !value.is_persistable() {
            return Err(ConfigError::InvalidValue(format!(
                "non-finite float {} at '{}'",
                value, path
            )));
        }
        self.check_write(path)?;
        let mutation = Mutation::Write {
            path: path.clone(),
            value,
        };
        self.log(&mutation)?;
        self.apply_unchecked(mutation);
        Ok(())
    }

    /// Remove the node at `path` and its whole subtree. Ancestors stay,
    /// even when left childless.
    pub fn delete(&mut self, path: &ConfigPath) -> Result<()> {
        if self.resolve(path).is_none() {
            return Err(ConfigError::not_found(path));
        }
        let mutation = Mutation::Delete { path: path.clone() };
        self.log(&mutation)?;
        self.apply_unchecked(mutation);
        Ok(())
    }

    /// Materialize every interior node down to `path` without assigning a
    /// value. Idempotent; fails with `TypeConflict` if a leaf is in the way.
    pub fn ensure_branch(&mut self, path: &ConfigPath) -> Result<()> {
        self.check_branch(path)?;
        if self.resolve(path).is_some() {
            return Ok(());
        }
        let mutation = Mutation::Branch { path: path.clone() };
        self.log(&mutation)?;
        self.apply_unchecked(mutation);
        Ok(())
    }

    /// Shut down the attached storage, if any. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        match self.sink.take() {
            Some(sink) if sink.is_closed() => {
                self.sink = Some(sink);
                Ok(())
            }
            Some(mut sink) => {
                let result = sink.shutdown(self);
                self.sink = Some(sink);
                result
            }
            None => Ok(()),
        }
    }

    // -------------------------------------------------------------------
    // Recovery hooks (no logging)
    // -------------------------------------------------------------------

    /// Apply a recorded mutation directly, bypassing the sink. Used to
    /// replay history that is already in the log.
    pub(crate) fn replay(&mut self, mutation: &Mutation) -> Result<()> {
        match mutation {
            Mutation::Write { path, value } => {
                self.check_write(path)?;
                if !value.is_persistable() {
                    return Err(ConfigError::InvalidValue(value.to_string()));
                }
            }
            Mutation::Delete { path } => {
                if self.resolve(path).is_none() {
                    return Err(ConfigError::not_found(path));
                }
            }
            Mutation::Branch { path } => self.check_branch(path)?,
        }
        self.apply_unchecked(mutation.clone());
        Ok(())
    }

    /// Replace the whole tree with the contents of `snapshot`.
    pub(crate) fn restore(&mut self, snapshot: &TreeSnapshot) -> Result<()> {
        self.arena.clear();
        for entry in &snapshot.entries {
            let mutation = match &entry.value {
                Some(value) => Mutation::Write {
                    path: entry.path.clone(),
                    value: value.clone(),
                },
                None => Mutation::Branch {
                    path: entry.path.clone(),
                },
            };
            self.replay(&mutation)?;
        }
        Ok(())
    }

    /// Every node except the root, with its value if it is a leaf.
    pub fn snapshot_entries(&self) -> Vec<SnapshotEntry> {
        let root = self.arena.root();
        self.arena
            .preorder(root)
            .into_iter()
            .filter(|id| *id != root)
            .map(|id| SnapshotEntry {
                path: ConfigPath::from_trusted(self.arena.path_of(id)),
                value: self.arena.node(id).value().cloned(),
            })
            .collect()
    }

    /// Capture the tree as a snapshot tagged with `sequence`.
    pub fn snapshot(&self, sequence: u64) -> TreeSnapshot {
        TreeSnapshot::new(sequence, self.snapshot_entries())
    }

    // -------------------------------------------------------------------
    // Internal
    // -------------------------------------------------------------------

    fn resolve(&self, path: &ConfigPath) -> Option<NodeId> {
        let mut cursor = self.arena.root();
        for seg in path.segments() {
            cursor = self.arena.child(cursor, seg)?;
        }
        Some(cursor)
    }

    /// Walk the existing prefix of `path`, failing on a leaf ancestor.
    /// Returns the deepest existing node and how many segments it covers.
    fn walk_existing(&self, path: &ConfigPath) -> Result<(NodeId, usize)> {
        let segments = path.segments();
        let mut cursor = self.arena.root();
        for (i, seg) in segments.iter().enumerate() {
            match self.arena.child(cursor, seg) {
                Some(next) => {
                    let is_terminal = i + 1 == segments.len();
                    if !is_terminal && self.arena.node(next).is_leaf() {
                        return Err(ConfigError::conflict(
                            segments[..=i].join("."),
                            format!("is a leaf; cannot create '{}' beneath it", path),
                        ));
                    }
                    cursor = next;
                }
                None => return Ok((cursor, i)),
            }
        }
        Ok((cursor, segments.len()))
    }

    fn check_write(&self, path: &ConfigPath) -> Result<()> {
        let (node, covered) = self.walk_existing(path)?;
        if covered == path.depth() && self.arena.node(node).has_children() {
            return Err(ConfigError::conflict(
                path,
                format!(
                    "has {} children; a scalar cannot replace a subtree",
                    self.arena.node(node).child_count()
                ),
            ));
        }
        Ok(())
    }

    fn check_branch(&self, path: &ConfigPath) -> Result<()> {
        let (node, covered) = self.walk_existing(path)?;
        if covered == path.depth() && self.arena.node(node).is_leaf() {
            return Err(ConfigError::conflict(
                path,
                "is a leaf; cannot turn it into a branch",
            ));
        }
        Ok(())
    }

    fn log(&mut self, mutation: &Mutation) -> Result<()> {
        if let Some(sink) = self.sink.as_mut() {
            let sequence = sink.append(mutation)?;
            debug!(sequence, op = mutation.kind(), path = %mutation.path(), "logged mutation");
        }
        Ok(())
    }

    /// Apply a mutation that has already been validated.
    fn apply_unchecked(&mut self, mutation: Mutation) {
        match mutation {
            Mutation::Write { path, value } => {
                let id = self.materialize(&path);
                self.arena.set_value(id, value);
                debug!(path = %path, "set value");
            }
            Mutation::Delete { path } => {
                if let Some(id) = self.resolve(&path) {
                    let freed = self.arena.remove_subtree(id);
                    debug!(path = %path, freed, "deleted subtree");
                }
            }
            Mutation::Branch { path } => {
                self.materialize(&path);
                debug!(path = %path, "ensured branch");
            }
        }
    }

    fn materialize(&mut self, path: &ConfigPath) -> NodeId {
        let mut cursor = self.arena.root();
        for seg in path.segments() {
            cursor = self.arena.get_or_create_child(cursor, seg);
        }
        cursor
    }

    /// Nested mapping of the subtree under `start`, built bottom-up from a
    /// reversed pre-order walk so no call recurses.
    fn project(&self, start: NodeId) -> Mapping {
        let order = self.arena.preorder(start);
        let mut built: HashMap<NodeId, Mapping> = HashMap::new();
        for &id in order.iter().rev() {
            let node = self.arena.node(id);
            if node.is_leaf() {
                continue;
            }
            let mut map = Mapping::new();
            for (name, child) in node.children() {
                let value = match self.arena.node(child).value() {
                    Some(scalar) => TreeValue::Leaf(scalar.clone()),
                    None => TreeValue::Branch(built.remove(&child).unwrap_or_default()),
                };
                map.insert(name.to_string(), value);
            }
            built.insert(id, map);
        }
        built.remove(&start).unwrap_or_default()
    }
}

impl Default for ConfigTree {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConfigTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigTree")
            .field("nodes", &self.node_count())
            .field("attached", &self.is_attached())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn p(s: &str) -> ConfigPath {
        ConfigPath::parse(s).unwrap()
    }

    fn leaf(tree: &ConfigTree, path: &str) -> Scalar {
        match tree.get(&p(path), false).unwrap() {
            GetResult::Leaf(s) => s,
            other => panic!("expected Leaf at {}, got {:?}", path, other),
        }
    }

    fn branch(tree: &ConfigTree, path: &str) -> Mapping {
        match tree.get(&p(path), false).unwrap() {
            GetResult::Branch(m) => m,
            other => panic!("expected Branch at {}, got {:?}", path, other),
        }
    }

    /// Sink that records what it is handed, optionally failing.
    #[derive(Clone, Default)]
    struct RecordingSink {
        seen: Arc<Mutex<Vec<Mutation>>>,
        fail: bool,
        shutdowns: Arc<Mutex<usize>>,
    }

    impl RecordSink for RecordingSink {
        fn append(&mut self, mutation: &Mutation) -> Result<u64> {
            if self.fail {
                return Err(ConfigError::StorageClosed);
            }
            let mut seen = self.seen.lock().unwrap();
            seen.push(mutation.clone());
            Ok(seen.len() as u64)
        }

        fn shutdown(&mut self, _tree: &ConfigTree) -> Result<()> {
            *self.shutdowns.lock().unwrap() += 1;
            Ok(())
        }

        fn last_sequence(&self) -> u64 {
            self.seen.lock().unwrap().len() as u64
        }

        fn is_closed(&self) -> bool {
            *self.shutdowns.lock().unwrap() > 0
        }
    }

    // --- get / set ---

    #[test]
    fn set_then_get_preserves_type() {
        let mut tree = ConfigTree::new();
        tree.set(&p("a.s"), Scalar::from("1")).unwrap();
        tree.set(&p("a.i"), Scalar::from(1)).unwrap();
        tree.set(&p("a.f"), Scalar::from(1.0)).unwrap();
        tree.set(&p("a.b"), Scalar::from(false)).unwrap();
        assert_eq!(leaf(&tree, "a.s"), Scalar::Str("1".into()));
        assert_eq!(leaf(&tree, "a.i"), Scalar::Int(1));
        assert_eq!(leaf(&tree, "a.f"), Scalar::Float(1.0));
        assert_eq!(leaf(&tree, "a.b"), Scalar::Bool(false));
    }

    #[test]
    fn get_missing_fails_unless_safe() {
        let tree = ConfigTree::new();
        match tree.get(&p("app.ui.missing"), false) {
            Err(ConfigError::PathNotFound { path }) => assert_eq!(path, "app.ui.missing"),
            other => panic!("expected PathNotFound, got {:?}", other),
        }
        assert_eq!(
            tree.get(&p("app.ui.missing"), true).unwrap(),
            GetResult::NotFound
        );
    }

    #[test]
    fn safe_get_distinguishes_false_from_absent() {
        let mut tree = ConfigTree::new();
        tree.set(&p("flag"), Scalar::from(false)).unwrap();
        assert_eq!(
            tree.get(&p("flag"), true).unwrap(),
            GetResult::Leaf(Scalar::Bool(false))
        );
        assert_eq!(tree.get(&p("other"), true).unwrap(), GetResult::NotFound);
    }

    #[test]
    fn interior_node_returns_mapping() {
        let mut tree = ConfigTree::new();
        tree.set(&p("app.ui.theme"), "dark".into()).unwrap();
        let ui = branch(&tree, "app.ui");
        assert_eq!(ui.len(), 1);
        assert_eq!(ui["theme"], TreeValue::Leaf("dark".into()));
    }

    #[test]
    fn deep_interior_retrieval() {
        let mut tree = ConfigTree::new();
        tree.set(&p("a.b.c"), "x".into()).unwrap();
        let a = branch(&tree, "a");
        let b = a["b"].as_mapping().unwrap();
        assert_eq!(b["c"], TreeValue::Leaf("x".into()));
    }

    #[test]
    fn set_through_missing_creates_interior_nodes() {
        let mut tree = ConfigTree::new();
        tree.set(&p("x.y.z"), 1.into()).unwrap();
        assert_eq!(tree.node_count(), 3);
        assert!(tree.contains(&p("x.y")));
    }

    #[test]
    fn overwrite_same_shape_allowed() {
        let mut tree = ConfigTree::new();
        tree.set(&p("a.b"), "x".into()).unwrap();
        tree.set(&p("a.b"), "y".into()).unwrap();
        assert_eq!(leaf(&tree, "a.b"), Scalar::from("y"));
    }

    #[test]
    fn overwrite_leaf_with_other_type_allowed() {
        let mut tree = ConfigTree::new();
        tree.set(&p("n"), "x".into()).unwrap();
        tree.set(&p("n"), 5.into()).unwrap();
        assert_eq!(leaf(&tree, "n"), Scalar::Int(5));
    }

    #[test]
    fn scalar_over_subtree_is_type_conflict() {
        let mut tree = ConfigTree::new();
        tree.set(&p("a.b.c"), "x".into()).unwrap();
        let before = tree.to_dict();
        match tree.set(&p("a.b"), "y".into()) {
            Err(ConfigError::TypeConflict { path, .. }) => assert_eq!(path, "a.b"),
            other => panic!("expected TypeConflict, got {:?}", other),
        }
        assert_eq!(tree.to_dict(), before);
    }

    #[test]
    fn child_under_leaf_is_type_conflict() {
        let mut tree = ConfigTree::new();
        tree.set(&p("a"), "x".into()).unwrap();
        let before = tree.to_dict();
        match tree.set(&p("a.b.c"), "y".into()) {
            Err(ConfigError::TypeConflict { path, .. }) => assert_eq!(path, "a"),
            other => panic!("expected TypeConflict, got {:?}", other),
        }
        assert_eq!(tree.to_dict(), before);
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn set_on_empty_branch_makes_leaf() {
        let mut tree = ConfigTree::new();
        tree.set(&p("a.b.c"), "x".into()).unwrap();
        tree.delete(&p("a.b.c")).unwrap();
        tree.set(&p("a.b"), "y".into()).unwrap();
        assert_eq!(leaf(&tree, "a.b"), Scalar::from("y"));
    }

    #[test]
    fn non_finite_float_rejected() {
        let mut tree = ConfigTree::new();
        assert!(matches!(
            tree.set(&p("x"), Scalar::Float(f64::NAN)),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(tree.is_empty());
    }

    // --- delete ---

    #[test]
    fn delete_then_get() {
        let mut tree = ConfigTree::new();
        tree.set(&p("app.ui.theme"), "dark".into()).unwrap();
        tree.delete(&p("app.ui.theme")).unwrap();
        assert!(tree.get(&p("app.ui.theme"), false).unwrap_err().is_not_found());
        assert_eq!(
            tree.get(&p("app.ui.theme"), true).unwrap(),
            GetResult::NotFound
        );
    }

    #[test]
    fn delete_subtree_leaves_empty_ancestor() {
        let mut tree = ConfigTree::new();
        tree.set(&p("a.b.c"), "x".into()).unwrap();
        tree.delete(&p("a.b")).unwrap();
        assert_eq!(branch(&tree, "a"), Mapping::new());
        assert!(tree.get(&p("a.b.c"), false).unwrap_err().is_not_found());
        assert_eq!(tree.node_count(), 1);
        assert!(tree.validate().is_empty());
    }

    #[test]
    fn delete_missing_is_path_not_found() {
        let mut tree = ConfigTree::new();
        tree.set(&p("a.b"), 1.into()).unwrap();
        assert!(tree.delete(&p("a.c")).unwrap_err().is_not_found());
        assert!(tree.delete(&p("a.b.c")).unwrap_err().is_not_found());
    }

    // --- ensure_branch ---

    #[test]
    fn ensure_branch_creates_empty_mapping() {
        let mut tree = ConfigTree::new();
        tree.ensure_branch(&p("a.b")).unwrap();
        assert_eq!(branch(&tree, "a.b"), Mapping::new());
        tree.ensure_branch(&p("a.b")).unwrap();
        assert_eq!(tree.node_count(), 2);
    }

    #[test]
    fn ensure_branch_over_leaf_is_type_conflict() {
        let mut tree = ConfigTree::new();
        tree.set(&p("a.b"), 1.into()).unwrap();
        assert!(matches!(
            tree.ensure_branch(&p("a.b")),
            Err(ConfigError::TypeConflict { .. })
        ));
        assert!(matches!(
            tree.ensure_branch(&p("a.b.c")),
            Err(ConfigError::TypeConflict { .. })
        ));
        assert_eq!(leaf(&tree, "a.b"), Scalar::Int(1));
    }

    #[test]
    fn ensure_branch_on_existing_branch_is_noop() {
        let mut tree = ConfigTree::new();
        tree.set(&p("a.b"), 1.into()).unwrap();
        tree.ensure_branch(&p("a")).unwrap();
        assert_eq!(leaf(&tree, "a.b"), Scalar::Int(1));
    }

    // --- to_dict ---

    #[test]
    fn to_dict_mirrors_tree() {
        let mut tree = ConfigTree::new();
        tree.set(&p("ui.theme"), "dark".into()).unwrap();
        tree.set(&p("user.loginCount"), 1.into()).unwrap();
        tree.ensure_branch(&p("features")).unwrap();
        let json = TreeValue::Branch(tree.to_dict()).to_json();
        assert_eq!(
            json,
            serde_json::json!({
                "ui": {"theme": "dark"},
                "user": {"loginCount": 1},
                "features": {}
            })
        );
    }

    #[test]
    fn empty_tree_dict_is_empty() {
        assert!(ConfigTree::new().to_dict().is_empty());
    }

    #[test]
    fn projection_handles_max_depth() {
        let mut tree = ConfigTree::new();
        let deep = ConfigPath::from_segments(vec!["n"; crate::tree::MAX_DEPTH]).unwrap();
        tree.set(&deep, 7.into()).unwrap();
        let dict = tree.to_dict();
        let mut cursor = &dict;
        let mut depth = 1;
        while let Some(TreeValue::Branch(next)) = cursor.get("n") {
            cursor = next;
            depth += 1;
        }
        assert_eq!(depth, crate::tree::MAX_DEPTH);
        assert_eq!(cursor["n"], TreeValue::Leaf(Scalar::Int(7)));
    }

    // --- snapshot / restore ---

    #[test]
    fn snapshot_restore_reproduces_tree() {
        let mut tree = ConfigTree::new();
        tree.set(&p("a.b.c"), "x".into()).unwrap();
        tree.set(&p("a.d"), 2.5.into()).unwrap();
        tree.ensure_branch(&p("e.f")).unwrap();
        let snap = tree.snapshot(3);
        assert!(snap.validate().is_empty());

        let mut other = ConfigTree::new();
        other.set(&p("stale"), 1.into()).unwrap();
        other.restore(&snap).unwrap();
        assert_eq!(other.to_dict(), tree.to_dict());
        assert_eq!(other.node_count(), tree.node_count());
    }

    #[test]
    fn replay_rejects_conflicting_history() {
        let mut tree = ConfigTree::new();
        tree.set(&p("a.b"), 1.into()).unwrap();
        let bad = Mutation::Write {
            path: p("a"),
            value: 2.into(),
        };
        assert!(tree.replay(&bad).is_err());
        assert!(tree.replay(&Mutation::Delete { path: p("zz") }).is_err());
    }

    // --- sink wiring ---

    #[test]
    fn mutations_reach_sink_in_order() {
        let sink = RecordingSink::default();
        let seen = sink.seen.clone();
        let mut tree = ConfigTree::new();
        tree.attach(Box::new(sink)).unwrap();

        tree.set(&p("a.b"), 1.into()).unwrap();
        tree.ensure_branch(&p("c")).unwrap();
        tree.ensure_branch(&p("c")).unwrap();
        tree.delete(&p("a")).unwrap();
        tree.get(&p("c"), false).unwrap();

        let kinds: Vec<&str> = seen.lock().unwrap().iter().map(|m| m.kind()).collect();
        assert_eq!(kinds, vec!["WRITE", "BRANCH", "DELETE"]);
        assert_eq!(tree.last_sequence(), Some(3));
    }

    #[test]
    fn rejected_mutation_is_not_logged() {
        let sink = RecordingSink::default();
        let seen = sink.seen.clone();
        let mut tree = ConfigTree::new();
        tree.attach(Box::new(sink)).unwrap();
        tree.set(&p("a.b"), 1.into()).unwrap();
        assert!(tree.set(&p("a"), 2.into()).is_err());
        assert!(tree.delete(&p("nope")).is_err());
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn failed_append_leaves_tree_unchanged() {
        let sink = RecordingSink {
            fail: true,
            ..Default::default()
        };
        let mut tree = ConfigTree::new();
        tree.attach(Box::new(sink)).unwrap();
        assert!(tree.set(&p("a"), 1.into()).is_err());
        assert!(tree.is_empty());
    }

    #[test]
    fn second_attach_is_rejected() {
        let mut tree = ConfigTree::new();
        tree.attach(Box::new(RecordingSink::default())).unwrap();
        assert!(matches!(
            tree.attach(Box::new(RecordingSink::default())),
            Err(ConfigError::AlreadyAttached)
        ));
    }

    #[test]
    fn close_delegates_to_sink() {
        let sink = RecordingSink::default();
        let shutdowns = sink.shutdowns.clone();
        let mut tree = ConfigTree::new();
        tree.close().unwrap();
        tree.attach(Box::new(sink)).unwrap();
        tree.close().unwrap();
        assert_eq!(*shutdowns.lock().unwrap(), 1);
        assert!(tree.is_attached());
    }

    #[test]
    fn close_skips_sink_already_shut_down() {
        let sink = RecordingSink::default();
        let shutdowns = sink.shutdowns.clone();
        let mut tree = ConfigTree::new();
        assert!(!tree.is_closed());
        tree.attach(Box::new(sink)).unwrap();
        assert!(!tree.is_closed());
        tree.close().unwrap();
        assert!(tree.is_closed());
        tree.close().unwrap();
        tree.close().unwrap();
        assert_eq!(*shutdowns.lock().unwrap(), 1);
    }
}
