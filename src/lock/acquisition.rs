use super::backend::{Backend, PlatformBackend};
use super::options::{LockOptions, ZeroTimeout};
use crate::error::{FsLockError, Result, TimeoutError};
use std::mem::ManuallyDrop;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// An advisory, cross-process exclusive lock backed by a lock file.
///
/// The file is opened once, at construction, and every lock/unlock pair goes
/// through that descriptor. Separate `FsLock` values on the same path exclude
/// each other, whether they live in one process or in many.
///
/// Operations take `&mut self`: a single handle must not be driven from two
/// threads at once. Open one handle per thread instead.
///
/// Dropping the handle closes the descriptor, which releases a held lock. The
/// lock file itself is never removed or written.
#[derive(Debug)]
pub struct FsLock<B: Backend = PlatformBackend> {
    backend: B,
    path: PathBuf,
    options: LockOptions,
}

impl FsLock {
    /// Open (creating if absent) the lock file at `path` with default options.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, LockOptions::default())
    }

    /// Open (creating if absent) the lock file at `path`.
    ///
    /// An existing file is opened as-is; its contents are left untouched.
    pub fn open_with(path: impl AsRef<Path>, options: LockOptions) -> Result<Self> {
        Self::open_backend(path, options)
    }
}

impl<B: Backend> FsLock<B> {
    /// Open the lock file at `path` through a specific backend.
    pub fn open_backend(path: impl AsRef<Path>, options: LockOptions) -> Result<Self> {
        let path = path.as_ref();
        debug!("Opening lock file: {} (options: {:?})", path.display(), options);

        check_lock_symlink(path, options.follow_symlinks)?;

        let backend = B::open(path, &options).map_err(|e| FsLockError::open(path, e))?;

        Ok(FsLock {
            backend,
            path: path.to_path_buf(),
            options,
        })
    }

    /// Block until the exclusive lock is held by this handle.
    pub fn lock(&mut self) -> Result<()> {
        debug!("Acquiring lock: {}", self.path.display());

        self.backend
            .lock()
            .map_err(|e| FsLockError::lock(&self.path, e))?;

        debug!("Lock acquired: {}", self.path.display());
        Ok(())
    }

    /// Make a single non-blocking attempt.
    ///
    /// Returns `Ok(false)` if another handle holds the lock.
    pub fn try_lock(&mut self) -> Result<bool> {
        let acquired = self
            .backend
            .try_lock()
            .map_err(|e| FsLockError::lock(&self.path, e))?;

        if acquired {
            debug!("Lock acquired: {}", self.path.display());
        }
        Ok(acquired)
    }

    /// Wait at most `timeout` for the exclusive lock.
    ///
    /// Fails with [`FsLockError::Timeout`] if the lock is still held elsewhere
    /// when the deadline passes. The meaning of a zero timeout is set by
    /// [`LockOptions::zero_timeout`].
    ///
    /// On unix the wait is a poll loop, so the deadline is honoured to the
    /// granularity of [`LockOptions::poll`]; it never gives up early.
    pub fn lock_with_timeout(&mut self, timeout: Duration) -> Result<()> {
        if timeout.is_zero() && self.options.zero_timeout == ZeroTimeout::WaitForever {
            return self.lock();
        }

        debug!(
            "Acquiring lock: {} (timeout: {:?})",
            self.path.display(),
            timeout
        );

        let acquired = self
            .backend
            .lock_with_timeout(timeout, &self.options)
            .map_err(|e| FsLockError::lock(&self.path, e))?;

        if !acquired {
            return Err(TimeoutError.into());
        }

        debug!("Lock acquired: {}", self.path.display());
        Ok(())
    }

    /// Release the lock. The descriptor stays open for later `lock` calls.
    ///
    /// Releasing a lock this handle does not hold is not detected.
    pub fn unlock(&mut self) -> Result<()> {
        self.backend
            .unlock()
            .map_err(|e| FsLockError::unlock(&self.path, e))?;

        debug!("Lock released: {}", self.path.display());
        Ok(())
    }

    /// [`lock`](Self::lock) and return a guard that unlocks when dropped.
    pub fn guard(&mut self) -> Result<LockGuard<'_, B>> {
        self.lock()?;
        Ok(LockGuard { lock: self })
    }

    /// [`lock_with_timeout`](Self::lock_with_timeout) and return a guard that unlocks when dropped.
    pub fn guard_with_timeout(&mut self, timeout: Duration) -> Result<LockGuard<'_, B>> {
        self.lock_with_timeout(timeout)?;
        Ok(LockGuard { lock: self })
    }

    /// Get the lock file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &LockOptions {
        &self.options
    }
}

impl<B: Backend> Drop for FsLock<B> {
    fn drop(&mut self) {
        debug!("Lock file closed: {}", self.path.display());
    }
}

/// Refuse a lock path that is a symlink unless `follow_symlinks` is set.
///
/// The open itself also refuses to follow, this check only gives a clearer error.
pub fn check_lock_symlink(path: &Path, follow_symlinks: bool) -> Result<()> {
    if follow_symlinks {
        return Ok(());
    }

    match path.symlink_metadata() {
        Ok(metadata) if metadata.file_type().is_symlink() => Err(FsLockError::SymlinkNotAllowed {
            path: path.to_path_buf(),
        }),
        _ => Ok(()),
    }
}

/// Holds the lock of an [`FsLock`] until dropped.
///
/// Release errors during drop are discarded; call [`LockGuard::unlock`] to see them.
#[derive(Debug)]
pub struct LockGuard<'a, B: Backend = PlatformBackend> {
    lock: &'a mut FsLock<B>,
}

impl<B: Backend> LockGuard<'_, B> {
    /// Release the lock now and report the result.
    pub fn unlock(self) -> Result<()> {
        let mut guard = ManuallyDrop::new(self);
        guard.lock.unlock()
    }

    pub fn path(&self) -> &Path {
        self.lock.path()
    }
}

impl<B: Backend> Drop for LockGuard<'_, B> {
    fn drop(&mut self) {
        let _ = self.lock.unlock();
    }
}
