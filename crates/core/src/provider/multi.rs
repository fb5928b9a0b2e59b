//! Two providers layered into one.

use super::{AssetLookup, AssetsProvider, EMPTY_DEBUG_NAME, FileType};
use crate::asset::AccessMode;
use crate::error::Result;
use crate::freshness::{UpToDate, combine};

/// Consults `primary` first and falls back to `secondary`.
pub struct MultiAssetsProvider {
    primary: Box<dyn AssetsProvider>,
    secondary: Box<dyn AssetsProvider>,
    debug_name: String,
}

impl MultiAssetsProvider {
    /// Composes two providers; `None` unless both are present.
    pub fn create(
        primary: Option<Box<dyn AssetsProvider>>,
        secondary: Option<Box<dyn AssetsProvider>>,
    ) -> Option<Box<dyn AssetsProvider>> {
        let (primary, secondary) = (primary?, secondary?);
        let debug_name = format!("{} and {}", primary.debug_name(), secondary.debug_name());
        Some(Box::new(Self {
            primary,
            secondary,
            debug_name,
        }))
    }
}

impl AssetsProvider for MultiAssetsProvider {
    fn lookup(&self, path: &str, mode: AccessMode) -> AssetLookup {
        let primary = self.primary.lookup(path, mode);
        if primary.asset.is_some() {
            return primary;
        }
        let secondary = self.secondary.lookup(path, mode);
        AssetLookup {
            asset: secondary.asset,
            file_exists: primary.file_exists || secondary.file_exists,
        }
    }

    fn for_each_file(&self, root_path: &str, f: &mut dyn FnMut(&str, FileType)) -> Result<()> {
        self.primary.for_each_file(root_path, f)?;
        self.secondary.for_each_file(root_path, f)
    }

    /// The primary's path, unless the primary is a placeholder.
    fn path(&self) -> Option<&str> {
        if self.primary.debug_name() == EMPTY_DEBUG_NAME {
            self.secondary.path()
        } else {
            self.primary.path()
        }
    }

    fn debug_name(&self) -> &str {
        &self.debug_name
    }

    fn is_up_to_date(&self) -> UpToDate {
        combine(self.primary.is_up_to_date(), || self.secondary.is_up_to_date())
    }

    fn crc(&self, path: &str) -> Option<u32> {
        self.primary.crc(path).or_else(|| self.secondary.crc(path))
    }
}
