//! Store settings, loaded from YAML or the environment.
//!
//! ```yaml
//! persistent: true
//! storage_dir: /var/lib/myapp/config   # default: <cwd>/.configx
//! snapshot_file: snapshot.cx
//! log_file: wal.cx
//! load_json: seed.json                 # ingested after recovery
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::storage::{LOG_FILE, SNAPSHOT_FILE};

/// Directory used when persistence is on and no directory is given.
pub const DEFAULT_STORAGE_DIR: &str = ".configx";

/// Environment variable naming a storage directory; setting it turns
/// persistence on.
pub const ENV_DIR: &str = "CONFIGX_DIR";
/// Environment variable naming a JSON bootstrap document.
pub const ENV_LOAD_JSON: &str = "CONFIGX_LOAD_JSON";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Attach a storage runtime. Off means a purely in-memory tree.
    #[serde(default)]
    pub persistent: bool,

    #[serde(default)]
    pub storage_dir: Option<PathBuf>,

    #[serde(default = "default_snapshot_file")]
    pub snapshot_file: String,

    #[serde(default = "default_log_file")]
    pub log_file: String,

    #[serde(default)]
    pub load_json: Option<PathBuf>,
}

fn default_snapshot_file() -> String {
    SNAPSHOT_FILE.into()
}

fn default_log_file() -> String {
    LOG_FILE.into()
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            persistent: false,
            storage_dir: None,
            snapshot_file: default_snapshot_file(),
            log_file: default_log_file(),
            load_json: None,
        }
    }
}

/// Resolved locations of the two storage files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    pub dir: PathBuf,
    pub snapshot: PathBuf,
    pub log: PathBuf,
}

impl Settings {
    /// Persistent settings rooted at `dir`.
    pub fn persistent(dir: impl Into<PathBuf>) -> Self {
        Settings {
            persistent: true,
            storage_dir: Some(dir.into()),
            ..Settings::default()
        }
    }

    /// Load settings from a YAML file.
    pub fn load(path: &Path) -> Result<Settings> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse settings from a YAML string. An empty document yields the
    /// defaults.
    pub fn parse(content: &str) -> Result<Settings> {
        if content.trim().is_empty() {
            return Ok(Settings::default());
        }
        let settings: Settings = serde_yaml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Settings from `CONFIGX_DIR` and `CONFIGX_LOAD_JSON`.
    pub fn from_env() -> Result<Settings> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` with an explicit variable lookup.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Settings> {
        let mut settings = Settings::default();
        if let Some(dir) = lookup(ENV_DIR).filter(|d| !d.is_empty()) {
            settings.persistent = true;
            settings.storage_dir = Some(PathBuf::from(dir));
        }
        if let Some(json) = lookup(ENV_LOAD_JSON).filter(|j| !j.is_empty()) {
            settings.load_json = Some(PathBuf::from(json));
        }
        settings.validate()?;
        Ok(settings)
    }

    /// File names must be plain, non-empty, and distinct.
    pub fn validate(&self) -> Result<()> {
        for (field, name) in [("snapshot_file", &self.snapshot_file), ("log_file", &self.log_file)] {
            let plain = !name.is_empty()
                && name != "."
                && name != ".."
                && !name.contains('/')
                && !name.contains('\\');
            if !plain {
                return Err(ConfigError::InvalidSettings(format!(
                    "{} must be a plain file name, got '{}'",
                    field, name
                )));
            }
        }
        if self.snapshot_file == self.log_file {
            return Err(ConfigError::InvalidSettings(format!(
                "snapshot_file and log_file must differ (both '{}')",
                self.log_file
            )));
        }
        Ok(())
    }

    /// The storage directory: `storage_dir`, or `.configx` under the
    /// current directory.
    pub fn resolved_dir(&self) -> Result<PathBuf> {
        match &self.storage_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(std::env::current_dir()?.join(DEFAULT_STORAGE_DIR)),
        }
    }

    /// File locations, or `None` when persistence is off.
    pub fn storage_paths(&self) -> Result<Option<StoragePaths>> {
        if !self.persistent {
            return Ok(None);
        }
        let dir = self.resolved_dir()?;
        Ok(Some(StoragePaths {
            snapshot: dir.join(&self.snapshot_file),
            log: dir.join(&self.log_file),
            dir,
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn parse_full_settings() {
        let yaml = r#"
persistent: true
storage_dir: "/data/cfg"
snapshot_file: "state.cx"
log_file: "journal.cx"
load_json: "seed.json"
"#;
        let s = Settings::parse(yaml).unwrap();
        assert!(s.persistent);
        assert_eq!(s.storage_dir, Some(PathBuf::from("/data/cfg")));
        assert_eq!(s.snapshot_file, "state.cx");
        assert_eq!(s.log_file, "journal.cx");
        assert_eq!(s.load_json, Some(PathBuf::from("seed.json")));
    }

    #[test]
    fn parse_minimal_settings() {
        let s = Settings::parse("persistent: true\n").unwrap();
        assert!(s.persistent);
        assert_eq!(s.storage_dir, None);
        assert_eq!(s.snapshot_file, "snapshot.cx");
        assert_eq!(s.log_file, "wal.cx");
    }

    #[test]
    fn parse_empty_is_default() {
        assert_eq!(Settings::parse("").unwrap(), Settings::default());
        assert_eq!(Settings::parse("\n  \n").unwrap(), Settings::default());
    }

    #[test]
    fn parse_unknown_field_fails() {
        let err = Settings::parse("persistant: true\n").unwrap_err();
        assert!(matches!(err, ConfigError::Serialization(_)));
    }

    #[test]
    fn parse_wrong_type_fails() {
        assert!(Settings::parse("persistent: maybe\n").is_err());
    }

    #[test]
    fn nested_file_name_rejected() {
        assert!(matches!(
            Settings::parse("log_file: logs/wal.cx\n"),
            Err(ConfigError::InvalidSettings(_))
        ));
        assert!(matches!(
            Settings::parse("snapshot_file: \"\"\n"),
            Err(ConfigError::InvalidSettings(_))
        ));
    }

    #[test]
    fn same_file_names_rejected() {
        let yaml = "snapshot_file: one.cx\nlog_file: one.cx\n";
        match Settings::parse(yaml) {
            Err(ConfigError::InvalidSettings(msg)) => assert!(msg.contains("must differ"), "{}", msg),
            other => panic!("expected InvalidSettings, got {:?}", other),
        }
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("configx.yaml");
        std::fs::write(&path, "persistent: true\nstorage_dir: here\n").unwrap();
        let s = Settings::load(&path).unwrap();
        assert_eq!(s.storage_dir, Some(PathBuf::from("here")));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Settings::load(&dir.path().join("absent.yaml")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn vars_enable_persistence() {
        let vars: HashMap<&str, &str> =
            [(ENV_DIR, "/tmp/cx"), (ENV_LOAD_JSON, "boot.json")].into_iter().collect();
        let s = Settings::from_vars(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert!(s.persistent);
        assert_eq!(s.storage_dir, Some(PathBuf::from("/tmp/cx")));
        assert_eq!(s.load_json, Some(PathBuf::from("boot.json")));
    }

    #[test]
    fn no_vars_is_in_memory() {
        let s = Settings::from_vars(|_| None).unwrap();
        assert!(!s.persistent);
        assert!(s.storage_paths().unwrap().is_none());
    }

    #[test]
    fn empty_dir_var_ignored() {
        let s = Settings::from_vars(|k| (k == ENV_DIR).then(String::new)).unwrap();
        assert!(!s.persistent);
    }

    #[test]
    fn storage_paths_join_dir() {
        let s = Settings::persistent("/srv/cfg");
        let paths = s.storage_paths().unwrap().unwrap();
        assert_eq!(paths.dir, PathBuf::from("/srv/cfg"));
        assert_eq!(paths.snapshot, PathBuf::from("/srv/cfg/snapshot.cx"));
        assert_eq!(paths.log, PathBuf::from("/srv/cfg/wal.cx"));
    }

    #[test]
    fn default_dir_is_under_cwd() {
        let s = Settings {
            persistent: true,
            ..Settings::default()
        };
        let dir = s.resolved_dir().unwrap();
        assert!(dir.ends_with(DEFAULT_STORAGE_DIR));
        assert!(dir.is_absolute());
    }
}
