//! Provider that resolves nothing.

use super::{AssetLookup, AssetsProvider, EMPTY_DEBUG_NAME, FileType};
use crate::asset::AccessMode;
use crate::error::Result;
use crate::freshness::UpToDate;

/// Placeholder provider: lookups miss, enumeration is empty and it is always
/// fresh. An optional path only shows up in diagnostics.
#[derive(Debug, Default)]
pub struct EmptyAssetsProvider {
    path: Option<String>,
}

impl EmptyAssetsProvider {
    pub fn create() -> Box<dyn AssetsProvider> {
        Box::new(Self::default())
    }

    /// Empty provider that still reports `path`.
    pub fn create_with_path(path: impl Into<String>) -> Box<dyn AssetsProvider> {
        Box::new(Self {
            path: Some(path.into()),
        })
    }
}

impl AssetsProvider for EmptyAssetsProvider {
    fn lookup(&self, _path: &str, _mode: AccessMode) -> AssetLookup {
        AssetLookup::not_found()
    }

    fn for_each_file(&self, _root_path: &str, _f: &mut dyn FnMut(&str, FileType)) -> Result<()> {
        Ok(())
    }

    fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    fn debug_name(&self) -> &str {
        self.path.as_deref().unwrap_or(EMPTY_DEBUG_NAME)
    }

    fn is_up_to_date(&self) -> UpToDate {
        UpToDate::Always
    }
}
