use super::options::LockOptions;
use std::io;
use std::path::Path;
use std::time::Duration;

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

#[cfg(unix)]
pub use unix::FlockBackend;
#[cfg(windows)]
pub use windows::OverlappedBackend;

/// The backend compiled for this target.
#[cfg(unix)]
pub type PlatformBackend = FlockBackend;
#[cfg(windows)]
pub type PlatformBackend = OverlappedBackend;

#[cfg(not(any(unix, windows)))]
compile_error!("fslock supports unix and windows targets only");

/// An exclusive advisory lock on one open file.
///
/// Each target provides exactly one implementation. The value owns its OS
/// descriptor; dropping it closes the descriptor and releases any lock held
/// through it.
pub trait Backend: Sized {
    /// Open `path`, creating it if absent. Never truncates an existing file.
    fn open(path: &Path, options: &LockOptions) -> io::Result<Self>;

    /// Block until the exclusive lock is granted.
    fn lock(&mut self) -> io::Result<()>;

    /// One non-blocking attempt. `Ok(false)` means the lock is held elsewhere.
    fn try_lock(&mut self) -> io::Result<bool>;

    /// Release the lock. Does not check that it was held.
    fn unlock(&mut self) -> io::Result<()>;

    /// Wait up to `timeout` for the lock. `Ok(false)` means the deadline passed.
    ///
    /// A zero timeout is a single attempt.
    fn lock_with_timeout(&mut self, timeout: Duration, options: &LockOptions) -> io::Result<bool>;
}
