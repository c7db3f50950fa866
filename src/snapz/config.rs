//! # Configuration
//!
//! Settings are loaded with [`confique`] from the environment and TOML files.
//!
//! ## Storage Hierarchy
//!
//! Configuration is resolved in priority order:
//! 1. **Environment variables**: `SNAPZ_STATE_FILE`, `SNAPZ_SOURCE_SYSTEM`, etc.
//! 2. **Explicit file**: the path given with `--config`.
//! 3. **User config**: `snapz.toml` in the OS config directory (via `directories`).
//! 4. **Compiled defaults**: `#[config(default = ...)]`.
//!
//! ## Available Settings
//!
//! | Key | Env | Default |
//! |-----|-----|---------|
//! | `state_file` | `SNAPZ_STATE_FILE` | `state.json` in the OS data directory |
//! | `lock_file` | `SNAPZ_LOCK_FILE` | `/run/lock/snapz.lock` |
//! | `zfs_path` | `SNAPZ_ZFS_PATH` | `zfs` |
//! | `source_system` | `SNAPZ_SOURCE_SYSTEM` | `standalone` |
//! | `snapshot_prefix` | `SNAPZ_SNAPSHOT_PREFIX` | `autosnap` |
//! | `[timing]` | | see [`TimingPolicy`] |

use confique::Config;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, SnapzError};
use crate::timing::TimingPolicy;

pub const CONFIG_FILENAME: &str = "snapz.toml";
const STATE_FILENAME: &str = "state.json";

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SnapzConfig {
    /// Where the record tree is persisted. Defaults to the OS data directory.
    #[config(env = "SNAPZ_STATE_FILE")]
    pub state_file: Option<PathBuf>,

    #[config(env = "SNAPZ_LOCK_FILE", default = "/run/lock/snapz.lock")]
    pub lock_file: PathBuf,

    #[config(env = "SNAPZ_ZFS_PATH", default = "zfs")]
    pub zfs_path: String,

    /// Tag written to every snapshot this host creates. Pruning only touches
    /// snapshots carrying it.
    #[config(env = "SNAPZ_SOURCE_SYSTEM", default = "standalone")]
    pub source_system: String,

    #[config(env = "SNAPZ_SNAPSHOT_PREFIX", default = "autosnap")]
    pub snapshot_prefix: String,

    #[config(nested)]
    pub timing: TimingPolicy,
}

impl Default for SnapzConfig {
    fn default() -> Self {
        Self {
            state_file: None,
            lock_file: PathBuf::from("/run/lock/snapz.lock"),
            zfs_path: "zfs".to_string(),
            source_system: "standalone".to_string(),
            snapshot_prefix: "autosnap".to_string(),
            timing: TimingPolicy::default(),
        }
    }
}

impl SnapzConfig {
    /// Load from the environment, `explicit` (which must exist when given)
    /// and the user config file.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::load_layers(explicit, user_config_file().as_deref(), true)
    }

    /// Load from a single file, ignoring the environment.
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::load_layers(Some(path), None, false)
    }

    fn load_layers(explicit: Option<&Path>, user: Option<&Path>, env: bool) -> Result<Self> {
        let mut builder = SnapzConfig::builder();
        if env {
            builder = builder.env();
        }
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(SnapzError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            builder = builder.file(path);
        }
        if let Some(path) = user {
            builder = builder.file(path);
        }

        let config = builder
            .load()
            .map_err(|e| SnapzError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.source_system.is_empty() || self.source_system.contains(char::is_whitespace) {
            return Err(SnapzError::Config(format!(
                "source_system must be a non-empty word, got {:?}",
                self.source_system
            )));
        }
        if self.snapshot_prefix.is_empty()
            || self
                .snapshot_prefix
                .contains(|c: char| c == '/' || c == '@' || c.is_whitespace())
        {
            return Err(SnapzError::Config(format!(
                "snapshot_prefix must not be empty or contain '/', '@' or spaces, got {:?}",
                self.snapshot_prefix
            )));
        }
        self.timing.validate()
    }

    /// The configured state file, or `state.json` in the OS data directory.
    pub fn state_file(&self) -> PathBuf {
        match &self.state_file {
            Some(path) => path.clone(),
            None => project_dirs()
                .map(|dirs| dirs.data_dir().join(STATE_FILENAME))
                .unwrap_or_else(|| PathBuf::from("/var/lib/snapz").join(STATE_FILENAME)),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "snapz")
}

pub fn user_config_file() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILENAME))
}
