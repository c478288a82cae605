//! Path-addressed configuration tree.
//!
//! Nodes live in an arena owned by `ConfigTree`; reads project subtrees into
//! key-ordered mappings, and mutations are validated, logged through an
//! attached `RecordSink`, and only then applied.
//!
//! Node handles never leave the crate:
//!
//! ```compile_fail
//! use configx_core::tree::node::NodeArena;
//! ```

pub mod config_tree;
mod node;
pub mod path;
pub mod value;

pub use config_tree::{ConfigTree, RecordSink};
pub use path::{ConfigPath, MAX_DEPTH};
pub use value::{GetResult, Mapping, Scalar, TreeValue};
