//! `ConfigX`: the public entry point.
//!
//! Wraps one `ConfigTree` (and, when persistent, its storage runtime) behind
//! a `parking_lot::RwLock`. Reads share the lock; each mutation holds it
//! exclusively across validate, log append, and apply, so log sequence
//! order always matches the order mutations hit the tree.
//!
//! ```no_run
//! use configx_core::{ConfigX, Outcome};
//!
//! let cx = ConfigX::persistent(".configx")?;
//! cx.resolve(r#"app.ui.theme="dark""#)?;
//! if let Outcome::Found(theme) = cx.resolve("app.ui.theme")? {
//!     println!("{:?}", theme);
//! }
//! cx.close()?;
//! # Ok::<(), configx_core::ConfigError>(())
//! ```

use std::path::Path;

use parking_lot::RwLock;
use tracing::{debug, error, info};

use crate::dispatch::{dispatch, dispatch_read, Outcome};
use crate::error::{ConfigError, Result};
use crate::ingest;
use crate::query::{self, Operation};
use crate::settings::{Settings, StoragePaths};
use crate::snapshot::checkpoint::create_dir_durable;
use crate::storage::StorageRuntime;
use crate::tree::{ConfigPath, ConfigTree, Mapping, Scalar, TreeValue};

struct Inner {
    tree: ConfigTree,
    closed: bool,
}

pub struct ConfigX {
    inner: RwLock<Inner>,
    paths: Option<StoragePaths>,
}

impl ConfigX {
    /// A store with no files behind it.
    pub fn in_memory() -> Self {
        ConfigX {
            inner: RwLock::new(Inner {
                tree: ConfigTree::new(),
                closed: false,
            }),
            paths: None,
        }
    }

    /// Open a store per `settings`: recover from disk when persistent, then
    /// ingest the bootstrap document if one is named.
    pub fn open(settings: &Settings) -> Result<Self> {
        settings.validate()?;
        let paths = settings.storage_paths()?;
        let mut tree = ConfigTree::new();

        if let Some(paths) = &paths {
            create_dir_durable(&paths.dir)?;
            StorageRuntime::new(&paths.snapshot, &paths.log).start(&mut tree)?;
            info!(dir = %paths.dir.display(), nodes = tree.node_count(), "opened persistent store");
        }

        let cx = ConfigX {
            inner: RwLock::new(Inner {
                tree,
                closed: false,
            }),
            paths,
        };
        if let Some(json) = &settings.load_json {
            cx.load_json(json)?;
        }
        Ok(cx)
    }

    /// Persistent store in `dir` with default file names.
    pub fn persistent(dir: impl AsRef<Path>) -> Result<Self> {
        Self::open(&Settings::persistent(dir.as_ref()))
    }

    pub fn is_persistent(&self) -> bool {
        self.paths.is_some()
    }

    pub fn storage_paths(&self) -> Option<&StoragePaths> {
        self.paths.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.read().closed
    }

    /// Sequence of the last durable mutation; `None` when in-memory.
    pub fn last_sequence(&self) -> Option<u64> {
        self.inner.read().tree.last_sequence()
    }

    // -------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------

    /// Parse and execute one ConfigXQL statement.
    pub fn resolve(&self, query: &str) -> Result<Outcome> {
        let op = query::parse(query)?;
        self.execute(op)
    }

    /// Parse a whole script, then execute its statements in order. Stops
    /// at the first failure; earlier statements stay applied.
    pub fn run_script(&self, script: &str) -> Result<Vec<Outcome>> {
        let ops = query::parse_script(script)?;
        ops.into_iter().map(|op| self.execute(op)).collect()
    }

    /// Execute an already-parsed operation.
    pub fn execute(&self, op: Operation) -> Result<Outcome> {
        debug!(op = %op, "execute");
        match op {
            Operation::Read { path, safe } => dispatch_read(&self.inner.read().tree, &path, safe),
            op => dispatch(&mut self.inner.write().tree, op),
        }
    }

    /// Read `path`; `PathNotFound` if absent.
    pub fn get(&self, path: &str) -> Result<TreeValue> {
        match self.execute(Operation::Read {
            path: ConfigPath::parse(path)?,
            safe: false,
        })? {
            Outcome::Found(value) => Ok(value),
            _ => Err(ConfigError::not_found(path)),
        }
    }

    /// Read `path`; `None` if absent.
    pub fn get_safe(&self, path: &str) -> Result<Option<TreeValue>> {
        let outcome = self.execute(Operation::Read {
            path: ConfigPath::parse(path)?,
            safe: true,
        })?;
        Ok(match outcome {
            Outcome::Found(value) => Some(value),
            _ => None,
        })
    }

    pub fn set(&self, path: &str, value: impl Into<Scalar>) -> Result<()> {
        self.execute(Operation::Write {
            path: ConfigPath::parse(path)?,
            value: value.into(),
        })
        .map(drop)
    }

    pub fn delete(&self, path: &str) -> Result<()> {
        self.execute(Operation::Delete {
            path: ConfigPath::parse(path)?,
        })
        .map(drop)
    }

    pub fn ensure_branch(&self, path: &str) -> Result<()> {
        let path = ConfigPath::parse(path)?;
        self.inner.write().tree.ensure_branch(&path)
    }

    /// The whole tree as a nested mapping.
    pub fn dump(&self) -> Mapping {
        self.inner.read().tree.to_dict()
    }

    pub fn dump_json(&self) -> serde_json::Value {
        TreeValue::Branch(self.dump()).to_json()
    }

    // -------------------------------------------------------------------
    // Bootstrap
    // -------------------------------------------------------------------

    /// Ingest a JSON file. Returns the number of mutations issued.
    pub fn load_json(&self, path: &Path) -> Result<usize> {
        ingest::load_json(&mut self.inner.write().tree, path)
    }

    /// Ingest an in-memory JSON object.
    pub fn ingest(&self, document: &serde_json::Value) -> Result<usize> {
        ingest::ingest(&mut self.inner.write().tree, document)
    }

    // -------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------

    /// Compact storage and close. Safe to call more than once. A failed
    /// close leaves the store open so it can be retried.
    pub fn close(&self) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.closed {
            return Ok(());
        }
        inner.tree.close()?;
        inner.closed = true;
        Ok(())
    }

    /// Multi-statement transactions are not available.
    pub fn transaction(&self) -> Result<()> {
        Err(ConfigError::UnsupportedOperation(
            "transactions are not implemented; each mutation is durable on its own".into(),
        ))
    }
}

impl Default for ConfigX {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl Drop for ConfigX {
    fn drop(&mut self) {
        if self.paths.is_none() {
            return;
        }
        if let Err(e) = self.close() {
            error!(error = %e, "failed to close store on drop; the log still holds every mutation");
        }
    }
}

impl std::fmt::Debug for ConfigX {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("ConfigX")
            .field("paths", &self.paths)
            .field("closed", &inner.closed)
            .field("nodes", &inner.tree.node_count())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
