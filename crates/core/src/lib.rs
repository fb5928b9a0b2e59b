pub mod asset;
pub mod config;
pub mod error;
pub mod freshness;
pub mod logging;
pub mod provider;

pub use asset::{AccessMode, Asset};
pub use config::AssetkitConfig;
pub use error::{AssetError, Result};
pub use freshness::UpToDate;
pub use provider::{
    AssetLookup, AssetsProvider, DirectoryAssetsProvider, EmptyAssetsProvider, FileType,
    MultiAssetsProvider, PackageFlags, ZipAssetsProvider, create_asset_from_fd,
    create_asset_from_file, create_from_nullable, create_with_override,
};
