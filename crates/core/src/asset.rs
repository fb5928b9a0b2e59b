//! Byte streams handed out by providers.
//!
//! An [`Asset`] is a readable, seekable view over a byte range of a file. It
//! is backed either by a read-only memory mapping of the range (stored data)
//! or by a mapping of deflated data plus an inflater. Assets own everything
//! they need: mappings are reference counted and any descriptor they hold is
//! their own, so an asset outlives the provider that produced it.

use flate2::read::DeflateDecoder;
use memmap2::{Mmap, MmapOptions};
use std::fmt;
use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

/// Upper bound on the up-front reservation for inflated data. Declared
/// sizes come from archive metadata and are not trusted for allocation.
const MAX_INFLATE_PREALLOC: usize = 64 * 1024 * 1024;

/// Expected access pattern, used to pick a decompression strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    #[default]
    Unknown,
    /// Random reads and seeks.
    Random,
    /// Sequential reads, rare backward seeks.
    Streaming,
    /// The whole content will be requested through [`Asset::buffer`].
    Buffer,
}

// ==================== File mapping ====================

/// Read-only mapping of `[offset, offset + len)` of a file.
///
/// Clones share the mapping. Zero-length ranges carry no mapping.
#[derive(Clone)]
pub struct FileMap {
    mmap: Option<Arc<Mmap>>,
    offset: u64,
    name: Arc<str>,
}

impl FileMap {
    /// Maps a byte range of `file`.
    ///
    /// With `verify_bounds`, the range is checked against the file's current
    /// length first so a truncated file is reported as an error instead of
    /// faulting on first access.
    pub fn create(
        file: &File,
        offset: u64,
        len: u64,
        name: &str,
        verify_bounds: bool,
    ) -> io::Result<Self> {
        let end = offset.checked_add(len).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "mapping range overflows")
        })?;

        if verify_bounds {
            let file_len = file.metadata()?.len();
            if end > file_len {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("range {offset}..{end} exceeds file length {file_len}"),
                ));
            }
        }

        if len == 0 {
            return Ok(Self {
                mmap: None,
                offset,
                name: Arc::from(name),
            });
        }

        let map_len = usize::try_from(len).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "mapping exceeds address space")
        })?;

        // SAFETY: the mapping is read-only. Concurrent truncation of the file
        // by another process is outside of what this crate can guard against.
        let mmap = unsafe { MmapOptions::new().offset(offset).len(map_len).map(file)? };

        Ok(Self {
            mmap: Some(Arc::new(mmap)),
            offset,
            name: Arc::from(name),
        })
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        match &self.mmap {
            Some(mmap) => mmap.as_ref(),
            None => &[],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    /// Offset of the mapped range within its file.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Name of the mapped file: a path, or a debug label when the file has
    /// no usable path.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl AsRef<[u8]> for FileMap {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl fmt::Debug for FileMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileMap")
            .field("name", &self.name)
            .field("offset", &self.offset)
            .field("len", &self.len())
            .finish()
    }
}

// ==================== Asset ====================

enum Body {
    Mapped(FileMap),
    Inflated(Box<[u8]>),
    Streaming(StreamingInflater),
}

/// Incremental inflater over a mapped deflate stream.
///
/// Backward seeks restart decoding from the beginning of the stream.
struct StreamingInflater {
    map: FileMap,
    decoder: DeflateDecoder<Cursor<FileMap>>,
    produced: u64,
}

impl StreamingInflater {
    fn new(map: FileMap) -> Self {
        let decoder = DeflateDecoder::new(Cursor::new(map.clone()));
        Self {
            map,
            decoder,
            produced: 0,
        }
    }

    fn restart(&mut self) {
        self.decoder = DeflateDecoder::new(Cursor::new(self.map.clone()));
        self.produced = 0;
    }

    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> io::Result<usize> {
        if pos < self.produced {
            self.restart();
        }

        if pos > self.produced {
            let gap = pos - self.produced;
            let skipped = io::copy(&mut (&mut self.decoder).take(gap), &mut io::sink())?;
            self.produced += skipped;
            if skipped < gap {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "compressed data ended before the declared length",
                ));
            }
        }

        let n = self.decoder.read(buf)?;
        if n == 0 && !buf.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "compressed data ended before the declared length",
            ));
        }
        self.produced += n as u64;
        Ok(n)
    }
}

/// Inflates a whole deflate stream and checks it against the declared length.
fn inflate_exact(map: &FileMap, uncompressed_len: u64) -> io::Result<Box<[u8]>> {
    let capacity = usize::try_from(uncompressed_len)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "entry too large"))?
        .min(MAX_INFLATE_PREALLOC);
    let mut out = Vec::with_capacity(capacity);

    // One extra byte so an overlong stream is detected rather than truncated.
    DeflateDecoder::new(map.as_slice())
        .take(uncompressed_len.saturating_add(1))
        .read_to_end(&mut out)?;

    if out.len() as u64 != uncompressed_len {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "inflated {} bytes, expected {}",
                out.len(),
                uncompressed_len
            ),
        ));
    }
    Ok(out.into_boxed_slice())
}

/// Readable, seekable view over an asset's bytes.
pub struct Asset {
    body: Body,
    len: u64,
    pos: u64,
    mode: AccessMode,
    fd: Option<File>,
}

impl Asset {
    /// Wraps stored bytes. `fd` is owned by the asset and used to hand out
    /// descriptors; without one, the map's name is reopened as a path.
    pub fn from_uncompressed_map(map: FileMap, mode: AccessMode, fd: Option<File>) -> Self {
        Self {
            len: map.len() as u64,
            body: Body::Mapped(map),
            pos: 0,
            mode,
            fd,
        }
    }

    /// Wraps deflated bytes that expand to `uncompressed_len` bytes.
    ///
    /// `Random` and `Buffer` modes inflate immediately and fail on corrupt
    /// data; other modes inflate on demand.
    pub fn from_compressed_map(
        map: FileMap,
        uncompressed_len: u64,
        mode: AccessMode,
    ) -> io::Result<Self> {
        let body = match mode {
            AccessMode::Random | AccessMode::Buffer => {
                Body::Inflated(inflate_exact(&map, uncompressed_len)?)
            }
            AccessMode::Streaming | AccessMode::Unknown => {
                Body::Streaming(StreamingInflater::new(map))
            }
        };

        Ok(Self {
            body,
            len: uncompressed_len,
            pos: 0,
            mode,
            fd: None,
        })
    }

    /// Total length of the (uncompressed) content.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn remaining_len(&self) -> u64 {
        self.len.saturating_sub(self.pos)
    }

    pub fn is_compressed(&self) -> bool {
        !matches!(self.body, Body::Mapped(_))
    }

    pub fn access_mode(&self) -> AccessMode {
        self.mode
    }

    /// Returns the whole content, inflating it first if needed.
    pub fn buffer(&mut self) -> io::Result<&[u8]> {
        if let Body::Streaming(inflater) = &self.body {
            let data = inflate_exact(&inflater.map, self.len)?;
            self.body = Body::Inflated(data);
        }
        match &self.body {
            Body::Mapped(map) => Ok(map.as_slice()),
            Body::Inflated(data) => Ok(data),
            Body::Streaming(_) => Err(io::Error::other("stream was not inflated")),
        }
    }

    /// Returns a fresh descriptor for the file holding the asset, with the
    /// asset's offset and length in it.
    ///
    /// `None` for compressed assets, whose bytes do not exist in any file.
    pub fn open_file_descriptor(&self) -> Option<io::Result<(File, u64, u64)>> {
        let Body::Mapped(map) = &self.body else {
            return None;
        };
        let file = match &self.fd {
            Some(fd) => fd.try_clone(),
            None => File::open(Path::new(map.name())),
        };
        Some(file.map(|file| (file, map.offset(), self.len)))
    }
}

impl Read for Asset {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.pos >= self.len {
            return Ok(0);
        }

        let want = (buf.len() as u64).min(self.len - self.pos) as usize;
        let n = match &mut self.body {
            Body::Mapped(map) => copy_from(map.as_slice(), self.pos, &mut buf[..want]),
            Body::Inflated(data) => copy_from(data, self.pos, &mut buf[..want]),
            Body::Streaming(inflater) => inflater.read_at(self.pos, &mut buf[..want])?,
        };
        self.pos += n as u64;
        Ok(n)
    }
}

fn copy_from(src: &[u8], pos: u64, dst: &mut [u8]) -> usize {
    let start = pos as usize;
    let n = dst.len().min(src.len().saturating_sub(start));
    dst[..n].copy_from_slice(&src[start..start + n]);
    n
}

impl Seek for Asset {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::End(delta) => i128::from(self.len) + i128::from(delta),
            SeekFrom::Current(delta) => i128::from(self.pos) + i128::from(delta),
        };

        if target < 0 || target > i128::from(self.len) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("seek to {target} outside of 0..={}", self.len),
            ));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }
}

impl fmt::Debug for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Asset")
            .field("len", &self.len)
            .field("pos", &self.pos)
            .field("mode", &self.mode)
            .field("compressed", &self.is_compressed())
            .field("owns_fd", &self.fd.is_some())
            .finish()
    }
}
