//! Advisory cross-process mutual exclusion backed by a lock file.
//!
//! Built on `flock` on unix and `LockFileEx` (overlapped) on windows. The lock
//! only constrains processes that take it through this crate or the same OS
//! primitive; it does not stop anyone from reading or writing the file.
//!
//! ```no_run
//! use fslock::FsLock;
//! use std::time::Duration;
//!
//! # fn main() -> fslock::Result<()> {
//! let mut lock = FsLock::open("/tmp/example.lock")?;
//! match lock.lock_with_timeout(Duration::from_secs(5)) {
//!     Ok(()) => {
//!         // ... exclusive work ...
//!         lock.unlock()?;
//!     }
//!     Err(e) if e.is_timeout() => eprintln!("busy, try later"),
//!     Err(e) => return Err(e),
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod lock;

pub use error::{FsLockError, Result, TimeoutError};
pub use lock::{Backend, FsLock, LockGuard, LockOptions, PlatformBackend, PollStrategy, ZeroTimeout};
