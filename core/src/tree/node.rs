//! Node storage for the configuration tree.
//!
//! Nodes live in a slot arena and refer to each other by `NodeId`. A parent
//! owns its children through its `children` map; the `parent` handle on a
//! child is a plain back-reference used for path reconstruction and subtree
//! removal, never for lifetime. Freed slots are recycled.

use std::collections::HashMap;

use super::value::Scalar;

/// Handle to a node slot in a `NodeArena`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// A single addressable unit of the tree.
///
/// A node never holds both a value and children. A node with neither is a
/// valid, empty interior node.
#[derive(Debug, Clone)]
pub struct Node {
    name: String,
    parent: Option<NodeId>,
    children: HashMap<String, NodeId>,
    value: Option<Scalar>,
}

impl Node {
    fn new(name: &str, parent: Option<NodeId>) -> Self {
        Node {
            name: name.to_string(),
            parent,
            children: HashMap::new(),
            value: None,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn value(&self) -> Option<&Scalar> {
        self.value.as_ref()
    }

    pub fn child(&self, name: &str) -> Option<NodeId> {
        self.children.get(name).copied()
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.children.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Holds a scalar.
    pub fn is_leaf(&self) -> bool {
        self.value.is_some()
    }

    /// Has at least one child.
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

/// Slot arena owning every node of one tree.
#[derive(Debug, Clone)]
pub struct NodeArena {
    slots: Vec<Option<Node>>,
    free: Vec<usize>,
    root: NodeId,
}

impl NodeArena {
    /// Create an arena holding only the root node (empty name, no parent).
    pub fn new() -> Self {
        NodeArena {
            slots: vec![Some(Node::new("", None))],
            free: Vec::new(),
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Borrow a live node. Handles are only produced by this arena and are
    /// dropped from the parent map before their slot is freed, so a stale
    /// handle is a logic error.
    pub fn node(&self, id: NodeId) -> &Node {
        match self.slots.get(id.0) {
            Some(Some(node)) => node,
            _ => panic!("stale node handle {:?}", id),
        }
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        match self.slots.get_mut(id.0) {
            Some(Some(node)) => node,
            _ => panic!("stale node handle {:?}", id),
        }
    }

    /// Number of live nodes, root included.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// True when only the root remains.
    pub fn is_empty(&self) -> bool {
        self.len() == 1
    }

    /// Look up a direct child by name.
    pub fn child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.node(parent).child(name)
    }

    /// Return the existing child `name` of `parent`, creating an empty
    /// interior node if absent. The caller must have checked that `parent`
    /// is not a leaf.
    pub fn get_or_create_child(&mut self, parent: NodeId, name: &str) -> NodeId {
        if let Some(existing) = self.child(parent, name) {
            return existing;
        }
        debug_assert!(!self.node(parent).is_leaf(), "child added under a leaf");
        let node = Node::new(name, Some(parent));
        let id = match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(node);
                NodeId(index)
            }
            None => {
                self.slots.push(Some(node));
                NodeId(self.slots.len() - 1)
            }
        };
        self.node_mut(parent).children.insert(name.to_string(), id);
        id
    }

    /// Store a scalar on a childless node, turning it into a leaf.
    pub fn set_value(&mut self, id: NodeId, value: Scalar) {
        let node = self.node_mut(id);
        debug_assert!(node.children.is_empty(), "value set on a branch");
        node.value = Some(value);
    }

    /// Detach `id` from its parent and free it together with every
    /// descendant. Returns the number of nodes freed. The root is never
    /// removed.
    pub fn remove_subtree(&mut self, id: NodeId) -> usize {
        if id == self.root {
            return 0;
        }
        let (parent, name) = {
            let node = self.node(id);
            (node.parent, node.name.clone())
        };
        if let Some(parent) = parent {
            self.node_mut(parent).children.remove(&name);
        }

        let mut freed = 0;
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.slots[next.0].take() {
                stack.extend(node.children.values().copied());
                self.free.push(next.0);
                freed += 1;
            }
        }
        freed
    }

    /// Drop every node except the root, and clear the root.
    pub fn clear(&mut self) {
        *self = NodeArena::new();
    }

    /// Rebuild the segment list of `id` by following parent handles.
    pub fn path_of(&self, id: NodeId) -> Vec<String> {
        let mut segments = Vec::new();
        let mut cursor = id;
        while let Some(parent) = self.node(cursor).parent {
            segments.push(self.node(cursor).name.clone());
            cursor = parent;
        }
        segments.reverse();
        segments
    }

    /// Every live node id in pre-order (parents before children), walked
    /// with an explicit stack.
    pub fn preorder(&self, start: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.node(id).children.values().copied());
        }
        out
    }

    /// Check structural invariants. Returns a description of every
    /// violation; an empty list means the arena is consistent.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let root = self.node(self.root);
        if root.value.is_some() {
            errors.push("root carries a value".to_string());
        }
        if root.parent.is_some() {
            errors.push("root has a parent".to_string());
        }
        let mut reachable = 0;
        for id in self.preorder(self.root) {
            reachable += 1;
            let node = self.node(id);
            if node.value.is_some() && !node.children.is_empty() {
                errors.push(format!(
                    "node '{}' holds a value and {} children",
                    self.path_of(id).join("."),
                    node.children.len()
                ));
            }
            for (name, child) in &node.children {
                let c = self.node(*child);
                if c.parent != Some(id) {
                    errors.push(format!("child '{}' has a wrong parent handle", name));
                }
                if &c.name != name {
                    errors.push(format!("child keyed '{}' is named '{}'", name, c.name));
                }
            }
        }
        if reachable != self.len() {
            errors.push(format!(
                "{} live nodes but {} reachable from root",
                self.len(),
                reachable
            ));
        }
        errors
    }
}

impl Default for NodeArena {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
