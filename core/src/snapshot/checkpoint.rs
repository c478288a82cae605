//! Snapshot file persistence.
//!
//! A snapshot is written to a sibling temporary file, synced, and renamed
//! over the previous one, so a crash during compaction leaves either the old
//! or the new snapshot on disk, never a partial one.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::state::TreeSnapshot;
use crate::error::{ConfigError, Result};

/// Save a snapshot atomically.
pub fn save_snapshot(snapshot: &TreeSnapshot, path: &Path) -> Result<()> {
    let tmp = temp_path(path);
    {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)?;
        file.write_all(snapshot.to_json_pretty().as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    sync_parent_dir(path)?;
    debug!(
        path = %path.display(),
        sequence = snapshot.sequence,
        nodes = snapshot.entries.len(),
        "wrote snapshot"
    );
    Ok(())
}

/// Load a snapshot. A missing file is `Ok(None)` (cold start); a file that
/// exists but cannot be read, parsed, or validated is a `RecoveryFailure`.
pub fn load_snapshot(path: &Path) -> Result<Option<TreeSnapshot>> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ConfigError::recovery(path, format!("read error: {}", e))),
    };
    let snapshot = TreeSnapshot::from_json(&content).map_err(|e| ConfigError::recovery(path, e))?;
    let problems = snapshot.validate();
    if !problems.is_empty() {
        return Err(ConfigError::recovery(path, problems.join("; ")));
    }
    Ok(Some(snapshot))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Create `dir` and any missing ancestors, syncing the parent of each
/// directory created so the new entries survive a power loss.
pub(crate) fn create_dir_durable(dir: &Path) -> Result<()> {
    let mut missing = Vec::new();
    let mut cur = Some(dir);
    while let Some(d) = cur {
        if d.as_os_str().is_empty() || d.exists() {
            break;
        }
        missing.push(d);
        cur = d.parent();
    }
    if missing.is_empty() {
        return Ok(());
    }
    fs::create_dir_all(dir)?;
    for created in missing.iter().rev() {
        sync_parent_dir(created)?;
    }
    debug!(dir = %dir.display(), created = missing.len(), "created storage directories");
    Ok(())
}

/// Make a new or renamed entry durable by syncing the containing directory.
#[cfg(unix)]
pub(crate) fn sync_parent_dir(path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn sync_parent_dir(_path: &Path) -> Result<()> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
