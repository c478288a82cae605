//! Error types for the ConfigX engine.

use std::path::PathBuf;

/// Errors surfaced by the tree, the storage runtime, and the query front end.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A path segment chain did not fully resolve.
    #[error("path not found: {path}")]
    PathNotFound { path: String },

    /// A write would replace a non-empty subtree with a scalar, or a branch
    /// was requested where a leaf already lives.
    #[error("type conflict at '{path}': {reason}")]
    TypeConflict { path: String, reason: String },

    /// The snapshot or log exists but could not be read back.
    #[error("recovery failed for {}: {reason}", file.display())]
    RecoveryFailure { file: PathBuf, reason: String },

    /// Feature intentionally not implemented.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Empty path, empty segment, or a segment with illegal characters.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// A value that cannot be stored or persisted.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// The tree already has a storage runtime attached.
    #[error("a storage runtime is already attached to this tree")]
    AlreadyAttached,

    /// The storage runtime has been shut down.
    #[error("storage runtime is closed")]
    StorageClosed,

    /// Another process holds the storage directory.
    #[error("storage is locked by another process: {}", path.display())]
    StorageLocked { path: PathBuf },

    /// Query text rejected by the parser.
    #[error("parse error at column {position}: {message}")]
    Parse { position: usize, message: String },

    /// Settings that parsed but describe an unusable layout.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// Filesystem I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding or decoding error (JSON or YAML).
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl ConfigError {
    pub(crate) fn not_found(path: impl ToString) -> Self {
        ConfigError::PathNotFound {
            path: path.to_string(),
        }
    }

    pub(crate) fn conflict(path: impl ToString, reason: impl Into<String>) -> Self {
        ConfigError::TypeConflict {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn recovery(file: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ConfigError::RecoveryFailure {
            file: file.into(),
            reason: reason.into(),
        }
    }

    /// True for `PathNotFound`, the one error the safe-read path absorbs.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ConfigError::PathNotFound { .. })
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(e: serde_yaml::Error) -> Self {
        ConfigError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
