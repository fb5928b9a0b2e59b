//! User configuration, read from `~/.assetkit/config.json`.

use crate::error::Result;
use crate::freshness::register_known_writable_paths;
use crate::provider::PackageFlags;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetkitConfig {
    /// Prefixes whose archives are stamped even on read-only filesystems.
    pub known_writable_paths: Vec<PathBuf>,
    /// Map zip entries without checking them against the archive length.
    pub disable_incremental_hardening: bool,
}

impl AssetkitConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Loads the per-user config, or defaults when there is none.
    pub fn load_default() -> Result<Self> {
        match default_config_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn flags(&self) -> PackageFlags {
        if self.disable_incremental_hardening {
            PackageFlags::DISABLE_INCREMENTAL_HARDENING
        } else {
            PackageFlags::NONE
        }
    }

    /// Registers the known-writable prefixes for the whole process. Only the
    /// first registration sticks; returns whether this one did.
    pub fn install(&self) -> bool {
        register_known_writable_paths(self.known_writable_paths.iter().cloned())
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".assetkit").join(CONFIG_FILE_NAME))
}
