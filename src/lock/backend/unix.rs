use super::Backend;
use crate::lock::options::LockOptions;
use crate::lock::timeout::poll_until;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::time::Duration;

/// Lock backend built on `flock(2)`.
///
/// `flock` has a blocking call and a non-blocking variant that reports
/// `EWOULDBLOCK`, so bounded waits are a poll loop over the latter.
#[derive(Debug)]
pub struct FlockBackend {
    file: File,
}

/// Check if an I/O error indicates lock contention (file locked by another descriptor)
fn is_lock_contention(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

impl Backend for FlockBackend {
    fn open(path: &Path, options: &LockOptions) -> io::Result<Self> {
        // flock only needs a readable descriptor. std refuses create(true)
        // without write access, so O_CREAT goes in as a custom flag.
        let mut flags = libc::O_CREAT;

        // Reject symlinks at OS level
        if !options.follow_symlinks {
            flags |= libc::O_NOFOLLOW;
        }

        let mut opts = OpenOptions::new();
        opts.read(true).mode(0o600).custom_flags(flags);

        Ok(FlockBackend {
            file: opts.open(path)?,
        })
    }

    fn lock(&mut self) -> io::Result<()> {
        FileExt::lock_exclusive(&self.file)
    }

    fn try_lock(&mut self) -> io::Result<bool> {
        match FileExt::try_lock_exclusive(&self.file) {
            Ok(()) => Ok(true),
            Err(e) if is_lock_contention(&e) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn unlock(&mut self) -> io::Result<()> {
        FileExt::unlock(&self.file)
    }

    fn lock_with_timeout(&mut self, timeout: Duration, options: &LockOptions) -> io::Result<bool> {
        poll_until(timeout, options.poll, || self.try_lock())
    }
}
