//! Provider serving assets from a directory tree.

use super::{AssetLookup, AssetsProvider, FileType, create_asset_from_file};
use crate::asset::AccessMode;
use crate::error::{AssetError, Result};
use crate::freshness::{ModDate, UpToDate, is_readonly_filesystem_path, path_mod_date};
use std::path::{MAIN_SEPARATOR, Path, PathBuf};
use tracing::{debug, error};

/// Serves `<dir>/<path>` for every lookup.
#[derive(Debug)]
pub struct DirectoryAssetsProvider {
    /// Always ends with the path separator.
    dir: String,
    last_mod_time: ModDate,
}

impl DirectoryAssetsProvider {
    pub fn create(path: impl Into<String>) -> Result<Box<Self>> {
        let mut path = path.into();

        let metadata = match std::fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(source) => {
                error!("Failed to find directory '{}': {}", path, source);
                return Err(AssetError::DirectoryNotFound {
                    path: PathBuf::from(path),
                    source,
                });
            }
        };

        if !metadata.is_dir() {
            error!("Path '{}' is not a directory.", path);
            return Err(AssetError::NotADirectory(PathBuf::from(path)));
        }

        if !path.ends_with(MAIN_SEPARATOR) {
            path.push(MAIN_SEPARATOR);
        }

        let last_mod_time = if is_readonly_filesystem_path(Path::new(&path)) {
            ModDate::INVALID
        } else {
            ModDate::from_metadata(&metadata)
        };

        Ok(Box::new(Self {
            dir: path,
            last_mod_time,
        }))
    }
}

impl AssetsProvider for DirectoryAssetsProvider {
    fn lookup(&self, path: &str, _mode: AccessMode) -> AssetLookup {
        let resolved = PathBuf::from(format!("{}{}", self.dir, path));
        let file_exists = std::fs::metadata(&resolved).is_ok_and(|m| m.is_file());
        debug!(
            "Directory lookup '{}' in '{}': exists={}",
            path, self.dir, file_exists
        );

        if !file_exists {
            return AssetLookup::not_found();
        }
        AssetLookup::found(create_asset_from_file(&resolved))
    }

    fn for_each_file(&self, _root_path: &str, _f: &mut dyn FnMut(&str, FileType)) -> Result<()> {
        Ok(())
    }

    fn path(&self) -> Option<&str> {
        Some(&self.dir)
    }

    fn debug_name(&self) -> &str {
        &self.dir
    }

    fn is_up_to_date(&self) -> UpToDate {
        if self.last_mod_time == ModDate::INVALID {
            return UpToDate::Always;
        }
        UpToDate::from_bool(self.last_mod_time == path_mod_date(Path::new(&self.dir)))
    }
}
