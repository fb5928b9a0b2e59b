//! Provider serving entries of a zip archive.
//!
//! The central directory is read once when the provider is created and kept
//! as an immutable, name-ordered index. Lookups and enumeration never touch
//! the archive's file cursor afterwards; entry data is reached by mapping
//! byte ranges of the archive file directly.
//!
//! # Supported
//! - Stored (method 0) entries: mapped zero-copy.
//! - Deflated (method 8) entries: compressed range mapped, inflated by the
//!   asset.
//! - Archives embedded at an offset inside a larger file.

use super::{AssetLookup, AssetsProvider, FileType, PackageFlags};
use crate::asset::{AccessMode, Asset, FileMap};
use crate::error::{AssetError, Result};
use crate::freshness::{
    ModDate, UpToDate, file_mod_date, is_known_writable_path, is_readonly_filesystem,
};
use ::zip::result::{ZipError, ZipResult};
use ::zip::{CompressionMethod, ZipArchive};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::ops::Bound;
use std::path::Path;
use tracing::{debug, error, warn};

/// Local file header signature `PK\x03\x04`.
const SIG_LFH: u32 = 0x0403_4b50;
/// Local file header fixed length.
const LFH_LEN: usize = 30;
/// Longest name a zip entry can carry; longer prefixes cannot match.
const MAX_ENTRY_NAME_LEN: usize = u16::MAX as usize;

/// Either a real filesystem path or a label that only serves diagnostics.
///
/// Kept as an explicit tag: a friendly name may happen to look like a path.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PathOrDebugName {
    Path(String),
    DebugName(String),
}

impl PathOrDebugName {
    fn path(&self) -> Option<&str> {
        match self {
            PathOrDebugName::Path(path) => Some(path),
            PathOrDebugName::DebugName(_) => None,
        }
    }

    fn debug_name(&self) -> &str {
        match self {
            PathOrDebugName::Path(value) | PathOrDebugName::DebugName(value) => value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryMethod {
    Stored,
    Deflated,
    Unsupported,
}

/// Central-directory record of one entry.
#[derive(Debug, Clone, Copy)]
struct EntryRecord {
    /// Offset of the entry data, relative to the start of the archive range.
    data_offset: u64,
    compressed_len: u64,
    uncompressed_len: u64,
    method: EntryMethod,
    crc32: u32,
}

/// Reader over `[start, start + len)` of a file.
struct RangeReader<'a> {
    file: &'a File,
    start: u64,
    len: u64,
    pos: u64,
}

impl<'a> RangeReader<'a> {
    fn new(file: &'a File, start: u64, len: u64) -> Self {
        Self {
            file,
            start,
            len,
            pos: 0,
        }
    }
}

impl Read for RangeReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.len.saturating_sub(self.pos);
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let want = (buf.len() as u64).min(remaining) as usize;
        let mut file = self.file;
        file.seek(SeekFrom::Start(self.start + self.pos))?;
        let n = file.read(&mut buf[..want])?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for RangeReader<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::End(delta) => i128::from(self.len) + i128::from(delta),
            SeekFrom::Current(delta) => i128::from(self.pos) + i128::from(delta),
        };
        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of archive range",
            ));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }
}

/// Opened archive: the file it lives in and its entry index.
struct ZipHandle {
    file: File,
    /// Offset of the archive range within `file`.
    fd_offset: u64,
    entries: BTreeMap<String, EntryRecord>,
}

impl ZipHandle {
    /// Reads the central directory of the archive stored in
    /// `[offset, offset + len)` of `file`; `None` extends to end of file.
    fn open(file: File, offset: u64, len: Option<u64>) -> ZipResult<Self> {
        let file_len = file.metadata()?.len();
        let len = len.unwrap_or_else(|| file_len.saturating_sub(offset));
        if offset.checked_add(len).is_none_or(|end| end > file_len) {
            return Err(ZipError::InvalidArchive("archive range exceeds file".into()));
        }

        let mut headers = Vec::new();
        {
            let mut archive = ZipArchive::new(RangeReader::new(&file, offset, len))?;
            headers.reserve(archive.len());
            for index in 0..archive.len() {
                let entry = archive.by_index_raw(index)?;
                let method = match entry.compression() {
                    CompressionMethod::Stored => EntryMethod::Stored,
                    CompressionMethod::Deflated => EntryMethod::Deflated,
                    _ => EntryMethod::Unsupported,
                };
                headers.push((
                    entry.name().to_string(),
                    entry.header_start(),
                    EntryRecord {
                        data_offset: 0,
                        compressed_len: entry.compressed_size(),
                        uncompressed_len: entry.size(),
                        method,
                        crc32: entry.crc32(),
                    },
                ));
            }
        }

        let mut reader = RangeReader::new(&file, offset, len);
        let mut entries = BTreeMap::new();
        for (name, header_start, mut record) in headers {
            record.data_offset = local_data_offset(&mut reader, header_start)?;
            // First record wins for duplicated names.
            entries.entry(name).or_insert(record);
        }

        Ok(Self {
            file,
            fd_offset: offset,
            entries,
        })
    }
}

/// Resolves where an entry's data begins by reading its local header.
fn local_data_offset(reader: &mut RangeReader<'_>, header_start: u64) -> ZipResult<u64> {
    let mut header = [0u8; LFH_LEN];
    reader.seek(SeekFrom::Start(header_start))?;
    reader.read_exact(&mut header)?;

    let signature = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    if signature != SIG_LFH {
        return Err(ZipError::InvalidArchive("bad local file header signature".into()));
    }
    let name_len = u64::from(u16::from_le_bytes([header[26], header[27]]));
    let extra_len = u64::from(u16::from_le_bytes([header[28], header[29]]));
    Ok(header_start + LFH_LEN as u64 + name_len + extra_len)
}

/// Serves the entries of a zip archive.
pub struct ZipAssetsProvider {
    handle: ZipHandle,
    name: PathOrDebugName,
    flags: PackageFlags,
    last_mod_time: ModDate,
}

impl ZipAssetsProvider {
    /// Opens the archive at `path`, or reads it from `fd` when one is given.
    pub fn create(path: impl Into<String>, flags: PackageFlags, fd: Option<File>) -> Result<Box<Self>> {
        let path = path.into();
        let opened = match fd {
            Some(fd) => Ok(fd),
            None => File::open(&path).map_err(ZipError::Io),
        }
        .and_then(|file| ZipHandle::open(file, 0, None));

        let handle = match opened {
            Ok(handle) => handle,
            Err(source) => {
                error!("Failed to open APK '{}': {}", path, source);
                return Err(AssetError::ArchiveOpen { name: path, source });
            }
        };

        let mut last_mod_time = ModDate::INVALID;
        // Files on a read-only filesystem never change; skip the checks.
        if is_known_writable_path(Path::new(&path)) || !is_readonly_filesystem(&handle.file) {
            last_mod_time = file_mod_date(&handle.file);
            if last_mod_time == ModDate::INVALID {
                // Stat may lack execute permission on a parent directory; the
                // archive stays usable and is simply never reported stale.
                warn!("Failed to stat file '{}'", path);
            }
        }

        debug!(
            "Opened APK '{}' with {} entries",
            path,
            handle.entries.len()
        );
        Ok(Box::new(Self {
            handle,
            name: PathOrDebugName::Path(path),
            flags,
            last_mod_time,
        }))
    }

    /// Opens an archive stored in `[offset, offset + length)` of `fd`.
    ///
    /// `None` length extends the range to the end of the file. The provider
    /// has no path; `friendly_name` only appears in diagnostics.
    pub fn create_from_fd(
        fd: File,
        friendly_name: impl Into<String>,
        flags: PackageFlags,
        offset: u64,
        length: Option<u64>,
    ) -> Result<Box<Self>> {
        let friendly_name = friendly_name.into();
        let handle = match ZipHandle::open(fd, offset, length) {
            Ok(handle) => handle,
            Err(source) => {
                error!(
                    "Failed to open APK '{}' through FD with offset {} and length {:?}: {}",
                    friendly_name, offset, length, source
                );
                return Err(AssetError::ArchiveOpen {
                    name: friendly_name,
                    source,
                });
            }
        };

        let mut last_mod_time = ModDate::INVALID;
        if !is_readonly_filesystem(&handle.file) {
            last_mod_time = file_mod_date(&handle.file);
            if last_mod_time == ModDate::INVALID {
                warn!("Failed to fstat file '{}'", friendly_name);
            }
        }

        debug!(
            "Opened APK '{}' at offset {} with {} entries",
            friendly_name,
            offset,
            handle.entries.len()
        );

        Ok(Box::new(Self {
            handle,
            name: PathOrDebugName::DebugName(friendly_name),
            flags,
            last_mod_time,
        }))
    }

    fn map_entry(&self, path: &str, offset: u64, len: u64) -> Option<FileMap> {
        let hardening = !self.flags.contains(PackageFlags::DISABLE_INCREMENTAL_HARDENING);
        let debug_name = self.name.debug_name();
        match FileMap::create(&self.handle.file, offset, len, debug_name, hardening) {
            Ok(map) => Some(map),
            Err(e) => {
                error!("Failed to mmap file '{}' in APK '{}': {}", path, debug_name, e);
                None
            }
        }
    }
}

impl AssetsProvider for ZipAssetsProvider {
    fn lookup(&self, path: &str, mode: AccessMode) -> AssetLookup {
        let Some(entry) = self.handle.entries.get(path) else {
            return AssetLookup::not_found();
        };

        let debug_name = self.name.debug_name();
        let offset = self.handle.fd_offset + entry.data_offset;

        match entry.method {
            EntryMethod::Deflated => {
                let Some(map) = self.map_entry(path, offset, entry.compressed_len) else {
                    return AssetLookup::found(None);
                };
                match Asset::from_compressed_map(map, entry.uncompressed_len, mode) {
                    Ok(asset) => AssetLookup::found(Some(asset)),
                    Err(e) => {
                        error!("Failed to decompress '{}' in APK '{}': {}", path, debug_name, e);
                        AssetLookup::found(None)
                    }
                }
            }
            EntryMethod::Stored => {
                let Some(map) = self.map_entry(path, offset, entry.uncompressed_len) else {
                    return AssetLookup::found(None);
                };

                // Without a real path the asset cannot reopen the archive by
                // name, so it gets a descriptor of its own.
                let fd = match self.name.path() {
                    Some(_) => None,
                    None => match self.handle.file.try_clone() {
                        Ok(fd) => Some(fd),
                        Err(e) => {
                            error!("Unable to dup fd '{}' in APK '{}': {}", path, debug_name, e);
                            return AssetLookup::found(None);
                        }
                    },
                };
                AssetLookup::found(Some(Asset::from_uncompressed_map(map, mode, fd)))
            }
            EntryMethod::Unsupported => {
                error!(
                    "Unsupported compression for '{}' in APK '{}'",
                    path, debug_name
                );
                AssetLookup::found(None)
            }
        }
    }

    fn for_each_file(&self, root_path: &str, f: &mut dyn FnMut(&str, FileType)) -> Result<()> {
        let mut root = root_path.to_string();
        if !root.is_empty() && !root.ends_with('/') {
            root.push('/');
        }
        if root.len() > MAX_ENTRY_NAME_LEN {
            return Err(AssetError::Enumeration {
                root,
                reason: "prefix longer than any entry name".to_string(),
            });
        }

        // Directories are implied by many entries; hold them back so each
        // one is reported once.
        let mut dirs = BTreeSet::new();
        let range = self
            .handle
            .entries
            .range::<str, _>((Bound::Included(root.as_str()), Bound::Unbounded));
        for (name, _) in range {
            let Some(leaf) = name.strip_prefix(root.as_str()) else {
                break;
            };
            if leaf.is_empty() {
                continue;
            }
            match leaf.find('/') {
                Some(end) => {
                    dirs.insert(&leaf[..end]);
                }
                None => f(leaf, FileType::Regular),
            }
        }

        for dir in dirs {
            f(dir, FileType::Directory);
        }
        Ok(())
    }

    fn path(&self) -> Option<&str> {
        self.name.path()
    }

    fn debug_name(&self) -> &str {
        self.name.debug_name()
    }

    fn is_up_to_date(&self) -> UpToDate {
        if self.last_mod_time == ModDate::INVALID {
            return UpToDate::Always;
        }
        UpToDate::from_bool(self.last_mod_time == file_mod_date(&self.handle.file))
    }

    fn crc(&self, path: &str) -> Option<u32> {
        self.handle.entries.get(path).map(|entry| entry.crc32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::zip::write::SimpleFileOptions;
    use std::io::{Cursor, Write};

    fn zip_bytes(entries: &[(&str, &[u8], CompressionMethod)]) -> Vec<u8> {
        let mut zip = ::zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data, method) in entries {
            let options = SimpleFileOptions::default().compression_method(*method);
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    fn collect(provider: &ZipAssetsProvider, root: &str) -> Vec<(String, FileType)> {
        let mut seen = Vec::new();
        provider
            .for_each_file(root, &mut |name, kind| seen.push((name.to_string(), kind)))
            .unwrap();
        seen
    }

    #[test]
    fn test_enumeration_reports_each_directory_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.apk");
        std::fs::write(
            &path,
            zip_bytes(&[
                ("res/a/x.png", b"1", CompressionMethod::Stored),
                ("res/a/y.png", b"2", CompressionMethod::Stored),
                ("res/b/z.png", b"3", CompressionMethod::Stored),
                ("res/top.xml", b"4", CompressionMethod::Deflated),
                ("resources.arsc", b"5", CompressionMethod::Stored),
            ]),
        )
        .unwrap();

        let provider = ZipAssetsProvider::create(path.to_str().unwrap(), PackageFlags::NONE, None)
            .unwrap();

        assert_eq!(
            collect(&provider, "res"),
            vec![
                ("top.xml".to_string(), FileType::Regular),
                ("a".to_string(), FileType::Directory),
                ("b".to_string(), FileType::Directory),
            ]
        );
        // A prefix that is not a directory boundary matches nothing.
        assert!(collect(&provider, "re").is_empty());
    }

    #[test]
    fn test_enumeration_rejects_oversized_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.apk");
        std::fs::write(&path, zip_bytes(&[("a.txt", b"a", CompressionMethod::Stored)])).unwrap();

        let provider = ZipAssetsProvider::create(path.to_str().unwrap(), PackageFlags::NONE, None)
            .unwrap();
        let long = "x".repeat(MAX_ENTRY_NAME_LEN + 1);
        assert!(matches!(
            provider.for_each_file(&long, &mut |_, _| {}),
            Err(AssetError::Enumeration { .. })
        ));
    }

    #[test]
    fn test_crc_matches_stored_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.apk");
        std::fs::write(&path, zip_bytes(&[("a.txt", b"hello", CompressionMethod::Stored)])).unwrap();

        let provider = ZipAssetsProvider::create(path.to_str().unwrap(), PackageFlags::NONE, None)
            .unwrap();
        let mut archive = ZipArchive::new(File::open(&path).unwrap()).unwrap();
        let expected = archive.by_name("a.txt").unwrap().crc32();

        assert_eq!(provider.crc("a.txt"), Some(expected));
        assert_eq!(provider.crc("missing.txt"), None);
    }

    #[test]
    fn test_embedded_archive_through_fd() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("container.bin");
        let archive = zip_bytes(&[
            ("stored.txt", b"stored payload", CompressionMethod::Stored),
            ("deflated.txt", &[b'z'; 4096], CompressionMethod::Deflated),
        ]);
        let prefix = vec![0xAB; 777];
        let mut container = prefix.clone();
        container.extend_from_slice(&archive);
        container.extend_from_slice(b"trailing bytes");
        std::fs::write(&path, &container).unwrap();

        let provider = ZipAssetsProvider::create_from_fd(
            File::open(&path).unwrap(),
            "embedded.apk",
            PackageFlags::NONE,
            prefix.len() as u64,
            Some(archive.len() as u64),
        )
        .unwrap();
        assert_eq!(provider.path(), None);
        assert_eq!(provider.debug_name(), "embedded.apk");
        assert_eq!(provider.handle.entries.len(), 2);

        let mut stored = provider.open("stored.txt", AccessMode::Random).unwrap();
        let mut out = String::new();
        stored.read_to_string(&mut out).unwrap();
        assert_eq!(out, "stored payload");

        // No path to reopen: the asset owns a duplicated descriptor.
        let (mut fd, offset, len) = stored.open_file_descriptor().unwrap().unwrap();
        let mut raw = vec![0u8; len as usize];
        fd.seek(SeekFrom::Start(offset)).unwrap();
        fd.read_exact(&mut raw).unwrap();
        assert_eq!(raw, b"stored payload");

        let mut deflated = provider.open("deflated.txt", AccessMode::Streaming).unwrap();
        let mut bytes = Vec::new();
        deflated.read_to_end(&mut bytes).unwrap();
        assert_eq!(bytes, vec![b'z'; 4096]);
    }

    #[test]
    fn test_open_missing_archive_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.apk");
        assert!(matches!(
            ZipAssetsProvider::create(missing.to_str().unwrap(), PackageFlags::NONE, None),
            Err(AssetError::ArchiveOpen { .. })
        ));

        let garbage = dir.path().join("garbage.apk");
        std::fs::write(&garbage, b"not a zip archive at all").unwrap();
        assert!(ZipAssetsProvider::create(garbage.to_str().unwrap(), PackageFlags::NONE, None).is_err());
    }

    #[test]
    fn test_truncated_archive_keeps_existence_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.apk");
        std::fs::write(
            &path,
            zip_bytes(&[("big.bin", &[7u8; 8192], CompressionMethod::Stored)]),
        )
        .unwrap();

        let provider = ZipAssetsProvider::create(path.to_str().unwrap(), PackageFlags::NONE, None)
            .unwrap();

        // Cut the file inside the entry's data after the index was read.
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_len(100)
            .unwrap();

        let lookup = provider.lookup("big.bin", AccessMode::Random);
        assert!(lookup.file_exists);
        assert!(lookup.asset.is_none());
    }

    #[test]
    fn test_fd_takes_precedence_over_path() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real.apk");
        std::fs::write(&real, zip_bytes(&[("a.txt", b"a", CompressionMethod::Stored)])).unwrap();

        let provider = ZipAssetsProvider::create(
            dir.path().join("not-there.apk").to_str().unwrap(),
            PackageFlags::DISABLE_INCREMENTAL_HARDENING,
            Some(File::open(&real).unwrap()),
        )
        .unwrap();
        assert!(provider.lookup("a.txt", AccessMode::Random).file_exists);
        assert_eq!(provider.path(), dir.path().join("not-there.apk").to_str());
    }

    #[test]
    fn test_unstamped_archive_is_always_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.apk");
        std::fs::write(&path, zip_bytes(&[("a.txt", b"a", CompressionMethod::Stored)])).unwrap();

        let mut provider =
            ZipAssetsProvider::create(path.to_str().unwrap(), PackageFlags::NONE, None).unwrap();
        provider.last_mod_time = ModDate::INVALID;

        File::open(&path)
            .unwrap()
            .set_modified(std::time::SystemTime::UNIX_EPOCH)
            .unwrap();
        assert_eq!(provider.is_up_to_date(), UpToDate::Always);
    }
}
