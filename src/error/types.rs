use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Sentinel returned when a lock could not be acquired before the deadline.
///
/// Carries no lock identity. Compare against it directly
/// (`err == TimeoutError`) or ask [`FsLockError::is_timeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Error)]
#[error("lock timeout exceeded")]
pub struct TimeoutError;

impl TimeoutError {
    /// Always true; lets generic retry code detect timeouts without string matching.
    pub fn timeout(&self) -> bool {
        true
    }
}

#[derive(Debug, Error)]
pub enum FsLockError {
    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    #[error("Failed to open lock file {path}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("Failed to acquire lock on {path}: {source}")]
    Lock { path: PathBuf, source: io::Error },

    #[error("Failed to release lock on {path}: {source}")]
    Unlock { path: PathBuf, source: io::Error },

    #[error("Lock path is a symlink and following symlinks is disabled: {path}")]
    SymlinkNotAllowed { path: PathBuf },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl FsLockError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FsLockError::Timeout(_))
    }

    /// The underlying OS error, if this failure came from one.
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            FsLockError::Open { source, .. }
            | FsLockError::Lock { source, .. }
            | FsLockError::Unlock { source, .. } => Some(source),
            FsLockError::Io(e) => Some(e),
            _ => None,
        }
    }

    pub(crate) fn open(path: &Path, source: io::Error) -> Self {
        FsLockError::Open {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn lock(path: &Path, source: io::Error) -> Self {
        FsLockError::Lock {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn unlock(path: &Path, source: io::Error) -> Self {
        FsLockError::Unlock {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl PartialEq<TimeoutError> for FsLockError {
    fn eq(&self, other: &TimeoutError) -> bool {
        matches!(self, FsLockError::Timeout(t) if t == other)
    }
}

impl From<FsLockError> for io::Error {
    fn from(err: FsLockError) -> Self {
        match err {
            FsLockError::Timeout(t) => io::Error::new(io::ErrorKind::TimedOut, t),
            FsLockError::Open { source, .. }
            | FsLockError::Lock { source, .. }
            | FsLockError::Unlock { source, .. }
            | FsLockError::Io(source) => source,
            other => io::Error::new(io::ErrorKind::Other, other),
        }
    }
}

pub type Result<T> = std::result::Result<T, FsLockError>;
