#![allow(dead_code)]

use assetkit_core::{AccessMode, AssetsProvider, FileType};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::{Duration, SystemTime};
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

pub fn write_zip(path: &Path, entries: &[(&str, &[u8], CompressionMethod)]) {
    let file = File::create(path).expect("Failed to create archive");
    let mut zip = zip::ZipWriter::new(file);
    for (name, data, method) in entries {
        let options = SimpleFileOptions::default().compression_method(*method);
        zip.start_file(*name, options).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap();
}

/// Works for files and directories alike; only ownership is required.
pub fn set_mtime(path: &Path, secs: u64) {
    File::open(path)
        .unwrap()
        .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
        .unwrap();
}

pub fn read_asset(provider: &dyn AssetsProvider, path: &str, mode: AccessMode) -> Vec<u8> {
    let mut asset = provider
        .open(path, mode)
        .unwrap_or_else(|| panic!("'{}' should open in {}", path, provider.debug_name()));
    let mut bytes = Vec::new();
    asset.read_to_end(&mut bytes).unwrap();
    bytes
}

pub fn list(provider: &dyn AssetsProvider, root: &str) -> Vec<(String, FileType)> {
    let mut seen = Vec::new();
    provider
        .for_each_file(root, &mut |name, kind| seen.push((name.to_string(), kind)))
        .unwrap();
    seen
}
