//! Asset providers: named sources of assets.
//!
//! ## Architecture
//!
//! ```text
//!                 create_with_override(base, override)
//!                               │
//!                               ▼
//!                 ┌───────────────────────────┐
//!                 │   MultiAssetsProvider     │
//!                 │   primary ─▶ secondary    │
//!                 └─────────────┬─────────────┘
//!              ┌────────────────┼─────────────────┐
//!              ▼                ▼                 ▼
//!   ┌──────────────────┐ ┌──────────────┐ ┌──────────────────┐
//!   │ ZipAssets        │ │ Directory    │ │ EmptyAssets      │
//!   │ (stored/deflate) │ │ Assets       │ │ (never resolves) │
//!   └──────────────────┘ └──────────────┘ └──────────────────┘
//! ```
//!
//! Providers are built through their `create*` factories only and are
//! immutable afterwards, so every query takes `&self` and may run from
//! several threads at once.

pub mod directory;
pub mod empty;
pub mod multi;
pub mod zip;

pub use directory::DirectoryAssetsProvider;
pub use empty::EmptyAssetsProvider;
pub use multi::MultiAssetsProvider;
pub use zip::ZipAssetsProvider;

use crate::asset::{AccessMode, Asset, FileMap};
use crate::error::Result;
use crate::freshness::UpToDate;
use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::Path;
use tracing::error;

/// Debug name of a provider that has nothing behind it.
pub const EMPTY_DEBUG_NAME: &str = "<empty>";

/// Kind of a child reported by [`AssetsProvider::for_each_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    Regular,
    Directory,
}

/// Property bits of the package a provider serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PackageFlags(u32);

impl PackageFlags {
    pub const NONE: PackageFlags = PackageFlags(0);
    /// Map entries without checking them against the archive's length.
    pub const DISABLE_INCREMENTAL_HARDENING: PackageFlags = PackageFlags(1 << 5);

    pub const fn contains(self, other: PackageFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Outcome of a provider lookup.
///
/// `file_exists` is set whenever the provider holds an entry for the path,
/// even if the entry could not be mapped, so callers can tell a corrupt
/// asset from a missing one.
#[derive(Debug, Default)]
pub struct AssetLookup {
    pub asset: Option<Asset>,
    pub file_exists: bool,
}

impl AssetLookup {
    pub fn not_found() -> Self {
        Self::default()
    }

    pub fn found(asset: Option<Asset>) -> Self {
        Self {
            asset,
            file_exists: true,
        }
    }
}

/// A source of assets supporting lookup, enumeration and freshness queries.
pub trait AssetsProvider: Send + Sync {
    /// Looks up `path` and opens it.
    fn lookup(&self, path: &str, mode: AccessMode) -> AssetLookup;

    /// Opens `path`, discarding the existence flag.
    fn open(&self, path: &str, mode: AccessMode) -> Option<Asset> {
        self.lookup(path, mode).asset
    }

    /// Visits every direct child of `root_path` once, files first.
    fn for_each_file(&self, root_path: &str, f: &mut dyn FnMut(&str, FileType)) -> Result<()>;

    /// Filesystem path this provider is rooted at, if it has exactly one.
    fn path(&self) -> Option<&str>;

    /// Human readable name, never empty.
    fn debug_name(&self) -> &str;

    /// Re-measures the backing source against the stamp taken when opened.
    fn is_up_to_date(&self) -> UpToDate;

    /// Stored CRC-32 of `path`, for providers that keep one.
    fn crc(&self, _path: &str) -> Option<u32> {
        None
    }
}

impl std::fmt::Debug for dyn AssetsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetsProvider")
            .field("debug_name", &self.debug_name())
            .field("path", &self.path())
            .finish()
    }
}

// ==================== Composition ====================

/// Layers `override_provider` on top of `base`.
///
/// No base means nothing to override; no override returns `base` as is.
pub fn create_with_override(
    base: Option<Box<dyn AssetsProvider>>,
    override_provider: Option<Box<dyn AssetsProvider>>,
) -> Option<Box<dyn AssetsProvider>> {
    let base = base?;
    match override_provider {
        None => Some(base),
        Some(override_provider) => MultiAssetsProvider::create(Some(override_provider), Some(base)),
    }
}

/// Guarantees a usable provider, substituting an empty one for `None`.
pub fn create_from_nullable(nullable: Option<Box<dyn AssetsProvider>>) -> Box<dyn AssetsProvider> {
    nullable.unwrap_or_else(EmptyAssetsProvider::create)
}

// ==================== Asset opening ====================

/// Opens a file and maps all of it as a random-access asset.
pub fn create_asset_from_file(path: &Path) -> Option<Asset> {
    let fd = match File::open(path) {
        Ok(fd) => fd,
        Err(e) => {
            error!("Failed to open file '{}': {}", path.display(), e);
            return None;
        }
    };
    create_asset_from_fd(fd, Some(path), 0, None)
}

/// Maps `[offset, offset + length)` of `fd` as a random-access asset.
///
/// A `None` length maps up to the end of the file and requires `offset` to
/// be zero. With a `path`, the asset drops `fd` and reopens the path when it
/// needs a descriptor; without one, it keeps `fd`. A range reaching past
/// the end of the file is logged and yields `None`.
///
/// # Panics
///
/// Panics if `length` is `None` and `offset` is not zero.
pub fn create_asset_from_fd(
    mut fd: File,
    path: Option<&Path>,
    offset: u64,
    length: Option<u64>,
) -> Option<Asset> {
    assert!(
        length.is_some() || offset == 0,
        "offset must be 0 if length is unknown"
    );
    let display_name = path
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "anon".to_string());

    let length = match length {
        Some(length) => length,
        None => match fd.seek(SeekFrom::End(0)) {
            Ok(length) => length,
            Err(e) => {
                error!("Failed to get size of file '{}': {}", display_name, e);
                return None;
            }
        },
    };

    let map = match FileMap::create(&fd, offset, length, &display_name, true) {
        Ok(map) => map,
        Err(e) => {
            error!("Failed to mmap file '{}': {}", display_name, e);
            return None;
        }
    };

    let owned_fd = if path.is_some() { None } else { Some(fd) };
    Some(Asset::from_uncompressed_map(
        map,
        AccessMode::Random,
        owned_fd,
    ))
}
