use super::Backend;
use crate::lock::options::LockOptions;
use std::fs::{File, OpenOptions};
use std::io;
use std::mem;
use std::os::windows::fs::OpenOptionsExt;
use std::os::windows::io::AsRawHandle;
use std::path::Path;
use std::ptr;
use std::time::Duration;
use tracing::trace;
use windows_sys::Win32::Foundation::{
    CloseHandle, ERROR_IO_PENDING, ERROR_LOCK_VIOLATION, ERROR_OPERATION_ABORTED, FALSE, HANDLE,
    TRUE, WAIT_OBJECT_0, WAIT_TIMEOUT,
};
use windows_sys::Win32::Storage::FileSystem::{
    LockFileEx, UnlockFileEx, FILE_FLAG_OPEN_REPARSE_POINT, FILE_FLAG_OVERLAPPED, FILE_SHARE_READ,
    FILE_SHARE_WRITE, LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY,
};
use windows_sys::Win32::System::Threading::{CreateEventW, WaitForSingleObject, INFINITE};
use windows_sys::Win32::System::IO::{CancelIoEx, GetOverlappedResult, OVERLAPPED};

// Byte range covered by the lock: the first byte of the file.
const LOCK_LEN_LOW: u32 = 1;
const LOCK_LEN_HIGH: u32 = 0;

/// Lock backend built on `LockFileEx` over a handle opened for overlapped I/O.
///
/// A lock request is issued once and its completion is awaited on a per-attempt
/// event, so bounded waits use the native wait timeout instead of polling.
#[derive(Debug)]
pub struct OverlappedBackend {
    // Opened with FILE_FLAG_OVERLAPPED; never read or written through std.
    file: File,
}

/// Manual-reset event owned for the duration of one lock request.
struct Event(HANDLE);

impl Event {
    fn new() -> io::Result<Self> {
        let handle = unsafe { CreateEventW(ptr::null(), TRUE, FALSE, ptr::null()) };
        if handle.is_null() {
            Err(io::Error::last_os_error())
        } else {
            Ok(Event(handle))
        }
    }
}

impl Drop for Event {
    fn drop(&mut self) {
        unsafe {
            CloseHandle(self.0);
        }
    }
}

enum Issued {
    Granted,
    Contended,
    Pending,
}

fn is_os_error(e: &io::Error, code: u32) -> bool {
    e.raw_os_error() == Some(code as i32)
}

/// Convert a timeout to the native wait unit, rounding up so the wait is never shorter.
fn wait_millis(timeout: Duration) -> u32 {
    let millis = (timeout.as_nanos() + 999_999) / 1_000_000;
    millis.min(u128::from(INFINITE - 1)) as u32
}

impl OverlappedBackend {
    fn handle(&self) -> HANDLE {
        self.file.as_raw_handle() as HANDLE
    }

    fn issue(&self, flags: u32, overlapped: &mut OVERLAPPED) -> io::Result<Issued> {
        let ok = unsafe {
            LockFileEx(
                self.handle(),
                flags,
                0,
                LOCK_LEN_LOW,
                LOCK_LEN_HIGH,
                overlapped,
            )
        };
        if ok != 0 {
            return Ok(Issued::Granted);
        }

        let err = io::Error::last_os_error();
        if is_os_error(&err, ERROR_IO_PENDING) {
            Ok(Issued::Pending)
        } else if is_os_error(&err, ERROR_LOCK_VIOLATION) {
            Ok(Issued::Contended)
        } else {
            Err(err)
        }
    }

    /// Final status of a completed (or, with `wait`, soon to complete) request.
    fn outcome(&self, overlapped: &OVERLAPPED, wait: bool) -> io::Result<bool> {
        let mut transferred = 0u32;
        let ok = unsafe {
            GetOverlappedResult(
                self.handle(),
                overlapped,
                &mut transferred,
                if wait { TRUE } else { FALSE },
            )
        };
        if ok != 0 {
            return Ok(true);
        }

        let err = io::Error::last_os_error();
        if is_os_error(&err, ERROR_LOCK_VIOLATION) || is_os_error(&err, ERROR_OPERATION_ABORTED) {
            Ok(false)
        } else {
            Err(err)
        }
    }

    /// Cancel a pending request and wait for it to settle.
    ///
    /// The request may have been granted between the wait and the cancel, in
    /// which case the lock is held and this returns `Ok(true)`.
    fn cancel(&self, overlapped: &OVERLAPPED) -> io::Result<bool> {
        // Fails with ERROR_NOT_FOUND when the request already completed.
        unsafe {
            CancelIoEx(self.handle(), overlapped);
        }
        self.outcome(overlapped, true)
    }

    /// Issue one lock request and wait up to `wait_ms` for it.
    ///
    /// `overlapped` lives on this frame and the request is always settled
    /// before returning, so the kernel never writes to a dead OVERLAPPED.
    fn request(&self, flags: u32, wait_ms: u32) -> io::Result<bool> {
        let event = Event::new()?;
        let mut overlapped: OVERLAPPED = unsafe { mem::zeroed() };
        overlapped.hEvent = event.0;

        match self.issue(flags, &mut overlapped)? {
            Issued::Granted => return Ok(true),
            Issued::Contended => return Ok(false),
            Issued::Pending => {}
        }

        match unsafe { WaitForSingleObject(event.0, wait_ms) } {
            WAIT_OBJECT_0 => self.outcome(&overlapped, false),
            WAIT_TIMEOUT => {
                trace!(wait_ms, "lock wait timed out, cancelling request");
                self.cancel(&overlapped)
            }
            _ => {
                let err = io::Error::last_os_error();
                if self.cancel(&overlapped)? {
                    Ok(true)
                } else {
                    Err(err)
                }
            }
        }
    }
}

impl Backend for OverlappedBackend {
    fn open(path: &Path, options: &LockOptions) -> io::Result<Self> {
        // Other processes must be able to open the file; only LockFileEx excludes.
        // create(true) without create_new opens an existing file instead of failing.
        let mut flags = FILE_FLAG_OVERLAPPED;
        if !options.follow_symlinks {
            flags |= FILE_FLAG_OPEN_REPARSE_POINT;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .share_mode(FILE_SHARE_READ | FILE_SHARE_WRITE)
            .custom_flags(flags)
            .open(path)?;

        Ok(OverlappedBackend { file })
    }

    fn lock(&mut self) -> io::Result<()> {
        if self.request(LOCKFILE_EXCLUSIVE_LOCK, INFINITE)? {
            Ok(())
        } else {
            Err(io::Error::from_raw_os_error(ERROR_OPERATION_ABORTED as i32))
        }
    }

    fn try_lock(&mut self) -> io::Result<bool> {
        // Fails immediately, so an infinite wait only covers the completion callback.
        self.request(LOCKFILE_EXCLUSIVE_LOCK | LOCKFILE_FAIL_IMMEDIATELY, INFINITE)
    }

    fn unlock(&mut self) -> io::Result<()> {
        let event = Event::new()?;
        let mut overlapped: OVERLAPPED = unsafe { mem::zeroed() };
        overlapped.hEvent = event.0;

        let ok = unsafe {
            UnlockFileEx(
                self.handle(),
                0,
                LOCK_LEN_LOW,
                LOCK_LEN_HIGH,
                &mut overlapped,
            )
        };
        if ok != 0 {
            return Ok(());
        }

        let err = io::Error::last_os_error();
        if !is_os_error(&err, ERROR_IO_PENDING) {
            return Err(err);
        }
        if self.outcome(&overlapped, true)? {
            Ok(())
        } else {
            Err(io::Error::from_raw_os_error(ERROR_OPERATION_ABORTED as i32))
        }
    }

    fn lock_with_timeout(&mut self, timeout: Duration, _options: &LockOptions) -> io::Result<bool> {
        self.request(LOCKFILE_EXCLUSIVE_LOCK, wait_millis(timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_wait_millis_rounds_up() {
        assert_eq!(wait_millis(Duration::ZERO), 0);
        assert_eq!(wait_millis(Duration::from_micros(1)), 1);
        assert_eq!(wait_millis(Duration::from_millis(50)), 50);
        assert_eq!(wait_millis(Duration::from_micros(50_500)), 51);
    }

    #[test]
    fn test_wait_millis_never_infinite() {
        assert_eq!(wait_millis(Duration::from_secs(u64::MAX)), INFINITE - 1);
    }

    #[test]
    fn test_existing_file_opens() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("test.lock");
        std::fs::write(&path, b"keep").unwrap();

        OverlappedBackend::open(&path, &LockOptions::default()).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"keep");
    }

    #[test]
    fn test_contention_is_not_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("test.lock");
        let options = LockOptions::default();

        let mut holder = OverlappedBackend::open(&path, &options).unwrap();
        let mut waiter = OverlappedBackend::open(&path, &options).unwrap();

        assert!(holder.try_lock().unwrap());
        assert!(!waiter.try_lock().unwrap());
        assert!(!waiter
            .lock_with_timeout(Duration::from_millis(20), &options)
            .unwrap());

        holder.unlock().unwrap();
        assert!(waiter.try_lock().unwrap());
    }
}
