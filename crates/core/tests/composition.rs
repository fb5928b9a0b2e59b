mod common;

use assetkit_core::freshness::UpToDate;
use assetkit_core::provider::EMPTY_DEBUG_NAME;
use assetkit_core::{
    AccessMode, AssetsProvider, DirectoryAssetsProvider, EmptyAssetsProvider, FileType,
    MultiAssetsProvider, PackageFlags, ZipAssetsProvider, create_from_nullable,
    create_with_override,
};
use common::{list, read_asset, set_mtime, write_zip};
use zip::CompressionMethod;

fn base_archive(dir: &std::path::Path) -> Box<dyn AssetsProvider> {
    let path = dir.join("base.apk");
    write_zip(
        &path,
        &[
            ("res/values.xml", b"<base/>", CompressionMethod::Deflated),
            ("res/only-base.xml", b"base only", CompressionMethod::Stored),
        ],
    );
    ZipAssetsProvider::create(path.to_str().unwrap(), PackageFlags::NONE, None).unwrap()
}

fn overlay_dir(dir: &std::path::Path) -> Box<dyn AssetsProvider> {
    let root = dir.join("overlay");
    std::fs::create_dir_all(root.join("res")).unwrap();
    std::fs::write(root.join("res/values.xml"), b"<overlay/>").unwrap();
    DirectoryAssetsProvider::create(root.to_str().unwrap()).unwrap()
}

#[test]
fn test_override_wins_and_base_fills_gaps() {
    let dir = tempfile::tempdir().unwrap();
    let combined =
        create_with_override(Some(base_archive(dir.path())), Some(overlay_dir(dir.path()))).unwrap();

    assert_eq!(
        read_asset(combined.as_ref(), "res/values.xml", AccessMode::Buffer),
        b"<overlay/>"
    );
    assert_eq!(
        read_asset(combined.as_ref(), "res/only-base.xml", AccessMode::Random),
        b"base only"
    );
    assert!(combined.path().unwrap().ends_with(std::path::MAIN_SEPARATOR));
    assert!(combined.debug_name().contains(" and "));
}

#[test]
fn test_override_absent_returns_base() {
    let dir = tempfile::tempdir().unwrap();
    let base = base_archive(dir.path());
    let base_name = base.debug_name().to_string();

    let result = create_with_override(Some(base), None).unwrap();
    assert_eq!(result.debug_name(), base_name);
    assert!(create_with_override(None, Some(overlay_dir(dir.path()))).is_none());
}

#[test]
fn test_nullable_becomes_empty() {
    let provider = create_from_nullable(None);
    assert_eq!(provider.debug_name(), EMPTY_DEBUG_NAME);
    assert!(!provider.lookup("x", AccessMode::Random).file_exists);

    let dir = tempfile::tempdir().unwrap();
    let kept = create_from_nullable(Some(overlay_dir(dir.path())));
    assert_ne!(kept.debug_name(), EMPTY_DEBUG_NAME);
}

#[test]
fn test_composite_requires_both_children() {
    assert!(MultiAssetsProvider::create(Some(EmptyAssetsProvider::create()), None).is_none());
    assert!(MultiAssetsProvider::create(None, Some(EmptyAssetsProvider::create())).is_none());
}

#[test]
fn test_composite_enumerates_both_children() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.apk");
    let second = dir.path().join("second.apk");
    write_zip(&first, &[("x/one.txt", b"1", CompressionMethod::Stored)]);
    write_zip(
        &second,
        &[
            ("x/one.txt", b"1", CompressionMethod::Stored),
            ("x/two.txt", b"2", CompressionMethod::Stored),
        ],
    );

    let combined = MultiAssetsProvider::create(
        Some(ZipAssetsProvider::create(first.to_str().unwrap(), PackageFlags::NONE, None).unwrap()),
        Some(ZipAssetsProvider::create(second.to_str().unwrap(), PackageFlags::NONE, None).unwrap()),
    )
    .unwrap();

    // No deduplication across children.
    assert_eq!(
        list(combined.as_ref(), "x"),
        vec![
            ("one.txt".to_string(), FileType::Regular),
            ("one.txt".to_string(), FileType::Regular),
            ("two.txt".to_string(), FileType::Regular),
        ]
    );
}

#[test]
fn test_composite_freshness_is_conjunction() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("base.apk");
    write_zip(&path, &[("a.txt", b"a", CompressionMethod::Stored)]);
    set_mtime(&path, 5_000);

    let combined = MultiAssetsProvider::create(
        Some(EmptyAssetsProvider::create()),
        Some(ZipAssetsProvider::create(path.to_str().unwrap(), PackageFlags::NONE, None).unwrap()),
    )
    .unwrap();
    assert_eq!(combined.is_up_to_date(), UpToDate::Yes);

    set_mtime(&path, 6_000);
    assert_eq!(combined.is_up_to_date(), UpToDate::No);
}

#[test]
fn test_unreadable_primary_entry_still_exists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("truncated.apk");
    write_zip(&path, &[("res/big.bin", &[9u8; 16_384], CompressionMethod::Stored)]);
    let primary = ZipAssetsProvider::create(path.to_str().unwrap(), PackageFlags::NONE, None).unwrap();

    // Cut the archive inside the entry's data once its index has been read.
    std::fs::File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_len(200)
        .unwrap();

    let secondary_root = dir.path().join("fallback");
    std::fs::create_dir(&secondary_root).unwrap();
    let secondary = DirectoryAssetsProvider::create(secondary_root.to_str().unwrap()).unwrap();

    let combined = MultiAssetsProvider::create(Some(primary), Some(secondary)).unwrap();
    let lookup = combined.lookup("res/big.bin", AccessMode::Random);
    assert!(lookup.file_exists);
    assert!(lookup.asset.is_none());

    assert!(!combined.lookup("res/other.bin", AccessMode::Random).file_exists);
}
