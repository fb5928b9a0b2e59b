use assetkit_core::{
    AssetsProvider, DirectoryAssetsProvider, PackageFlags, ZipAssetsProvider, create_with_override,
};
use std::path::Path;
use tracing::info;

/// Opens `path` as a directory source or, for a regular file, a zip archive.
pub fn open(path: &Path, flags: PackageFlags) -> Result<Box<dyn AssetsProvider>, Box<dyn std::error::Error>> {
    let name = path
        .to_str()
        .ok_or_else(|| format!("Path is not valid UTF-8: {}", path.display()))?;

    let provider: Box<dyn AssetsProvider> = if path.is_dir() {
        DirectoryAssetsProvider::create(name)?
    } else {
        ZipAssetsProvider::create(name, flags, None)?
    };
    info!("Opened source {}", provider.debug_name());
    Ok(provider)
}

/// Opens `base`, with `override_path` layered on top when given.
pub fn open_layered(
    base: &Path,
    override_path: Option<&Path>,
    flags: PackageFlags,
) -> Result<Box<dyn AssetsProvider>, Box<dyn std::error::Error>> {
    let base = open(base, flags)?;
    let override_provider = override_path.map(|path| open(path, flags)).transpose()?;
    create_with_override(Some(base), override_provider).ok_or_else(|| "No source to read from".into())
}
