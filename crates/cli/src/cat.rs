use assetkit_core::{AccessMode, Asset, AssetsProvider};
use std::io::Write;

/// Opens `path` for sequential reading, telling a missing asset apart from
/// one that exists but cannot be read.
pub fn open_streaming(
    provider: &dyn AssetsProvider,
    path: &str,
) -> Result<Asset, Box<dyn std::error::Error>> {
    let lookup = provider.lookup(path, AccessMode::Streaming);
    match lookup.asset {
        Some(asset) => Ok(asset),
        None if lookup.file_exists => Err(format!(
            "'{}' exists in {} but could not be read",
            path,
            provider.debug_name()
        )
        .into()),
        None => Err(format!("'{}' not found in {}", path, provider.debug_name()).into()),
    }
}

pub fn run(provider: &dyn AssetsProvider, path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut asset = open_streaming(provider, path)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    std::io::copy(&mut asset, &mut out)?;
    out.flush()?;
    Ok(())
}
