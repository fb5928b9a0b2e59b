use assetkit_core::{AccessMode, AssetsProvider};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetStat {
    pub exists: bool,
    pub readable: bool,
    pub length: Option<u64>,
    pub compressed: Option<bool>,
    pub crc32: Option<u32>,
}

pub fn describe(provider: &dyn AssetsProvider, path: &str) -> AssetStat {
    let lookup = provider.lookup(path, AccessMode::Random);
    let asset = lookup.asset.as_ref();
    AssetStat {
        exists: lookup.file_exists,
        readable: asset.is_some(),
        length: asset.map(|a| a.len()),
        compressed: asset.map(|a| a.is_compressed()),
        crc32: provider.crc(path),
    }
}

pub fn run(provider: &dyn AssetsProvider, path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let stat = describe(provider, path);

    println!("Source:     {}", provider.debug_name());
    println!("Asset:      {}", path);
    println!("Exists:     {}", stat.exists);
    println!("Readable:   {}", stat.readable);
    if let Some(length) = stat.length {
        println!("Length:     {} B", length);
    }
    if let Some(compressed) = stat.compressed {
        println!("Compressed: {}", compressed);
    }
    if let Some(crc) = stat.crc32 {
        println!("CRC-32:     {:08x}", crc);
    }
    Ok(())
}
