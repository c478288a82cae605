//! ConfigX: an embedded, path-addressed configuration store with
//! write-ahead logging and snapshot compaction.

pub mod dispatch;
pub mod error;
pub mod ingest;
pub mod query;
pub mod runtime;
pub mod settings;
pub mod snapshot;
pub mod storage;
pub mod tree;

pub use dispatch::Outcome;
pub use error::{ConfigError, Result};
pub use query::{parse, parse_script, Operation};
pub use runtime::ConfigX;
pub use settings::{Settings, StoragePaths};
pub use storage::{RuntimeState, StorageRuntime};
pub use tree::{ConfigPath, ConfigTree, GetResult, Mapping, Scalar, TreeValue};
