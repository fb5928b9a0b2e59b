//! Modification stamps and freshness checks.
//!
//! A provider records a [`ModDate`] when it is constructed and re-stats its
//! backing file or directory on every [`UpToDate`] query. The stamp is never
//! cached as a boolean: staleness is only meaningful when measured.

use once_cell::sync::OnceCell;
use std::fs::{File, Metadata};
use std::ops::BitAnd;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Opaque modification stamp of a file or directory.
///
/// [`ModDate::INVALID`] means the source is never checked and always
/// reported fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModDate(Option<SystemTime>);

impl ModDate {
    pub const INVALID: ModDate = ModDate(None);

    pub fn from_metadata(metadata: &Metadata) -> Self {
        metadata
            .modified()
            .map(|time| ModDate(Some(time)))
            .unwrap_or(Self::INVALID)
    }

    pub fn is_valid(&self) -> bool {
        self.0.is_some()
    }
}

/// Stamp of the file behind an open descriptor, `INVALID` if fstat fails.
pub fn file_mod_date(file: &File) -> ModDate {
    file.metadata()
        .map(|m| ModDate::from_metadata(&m))
        .unwrap_or(ModDate::INVALID)
}

/// Stamp of a path, `INVALID` if stat fails.
pub fn path_mod_date(path: &Path) -> ModDate {
    std::fs::metadata(path)
        .map(|m| ModDate::from_metadata(&m))
        .unwrap_or(ModDate::INVALID)
}

/// Result of a freshness query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpToDate {
    /// The source changed since it was opened.
    No,
    /// The source is unchanged.
    Yes,
    /// The source is never checked.
    Always,
}

impl UpToDate {
    pub fn from_bool(fresh: bool) -> Self {
        if fresh { UpToDate::Yes } else { UpToDate::No }
    }

    pub fn is_fresh(self) -> bool {
        self != UpToDate::No
    }
}

/// Two-input AND over freshness results with `Always` as the identity.
///
/// `second` is only evaluated when `first` is not already stale.
pub fn combine(first: UpToDate, second: impl FnOnce() -> UpToDate) -> UpToDate {
    if first == UpToDate::No {
        return first;
    }
    let second = second();
    if second == UpToDate::No {
        return second;
    }
    if first == UpToDate::Always && second == UpToDate::Always {
        UpToDate::Always
    } else {
        UpToDate::Yes
    }
}

impl BitAnd for UpToDate {
    type Output = UpToDate;

    fn bitand(self, rhs: UpToDate) -> UpToDate {
        combine(self, || rhs)
    }
}

// ==================== Filesystem classification ====================

/// Returns true if the filesystem holding `path` is mounted read-only.
///
/// A failing `statvfs` is logged and treated as writable.
#[cfg(target_family = "unix")]
pub fn is_readonly_filesystem_path(path: &Path) -> bool {
    use std::os::unix::ffi::OsStrExt;

    let Ok(path_cstr) = std::ffi::CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };

    // SAFETY: statvfs is a plain C struct of integers; zeroed is a valid value.
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    // SAFETY: path_cstr is NUL-terminated and stat is a valid out pointer.
    let result = unsafe { libc::statvfs(path_cstr.as_ptr(), &mut stat) };
    if result != 0 {
        tracing::error!(
            "statvfs({}) failed: {}",
            path.display(),
            std::io::Error::last_os_error()
        );
        return false;
    }
    (stat.f_flag & libc::ST_RDONLY) != 0
}

#[cfg(not(target_family = "unix"))]
pub fn is_readonly_filesystem_path(_path: &Path) -> bool {
    false
}

/// Returns true if the filesystem holding `file` is mounted read-only.
#[cfg(target_family = "unix")]
pub fn is_readonly_filesystem(file: &File) -> bool {
    use std::os::unix::io::AsRawFd;

    // SAFETY: see is_readonly_filesystem_path.
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    // SAFETY: the descriptor is owned by `file` and open for the whole call.
    let result = unsafe { libc::fstatvfs(file.as_raw_fd(), &mut stat) };
    if result != 0 {
        tracing::error!("fstatvfs failed: {}", std::io::Error::last_os_error());
        return false;
    }
    (stat.f_flag & libc::ST_RDONLY) != 0
}

#[cfg(not(target_family = "unix"))]
pub fn is_readonly_filesystem(_file: &File) -> bool {
    false
}

static KNOWN_WRITABLE_PATHS: OnceCell<Vec<PathBuf>> = OnceCell::new();

/// Registers the process-wide allow-list of locations whose contents may
/// change at runtime even when they look immutable.
///
/// Only the first registration takes effect; later calls return `false`.
pub fn register_known_writable_paths(prefixes: impl IntoIterator<Item = PathBuf>) -> bool {
    let prefixes: Vec<PathBuf> = prefixes.into_iter().collect();
    let count = prefixes.len();
    let registered = KNOWN_WRITABLE_PATHS.set(prefixes).is_ok();
    if registered {
        tracing::debug!("Registered {} known writable path prefixes", count);
    } else {
        tracing::warn!("Known writable paths already registered; ignoring new list");
    }
    registered
}

/// Returns true if `path` lies under a registered writable prefix.
pub fn is_known_writable_path(path: &Path) -> bool {
    KNOWN_WRITABLE_PATHS
        .get()
        .is_some_and(|prefixes| prefixes.iter().any(|prefix| path.starts_with(prefix)))
}
