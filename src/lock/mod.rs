mod acquisition;
mod backend;
mod options;
mod timeout;

pub use acquisition::{check_lock_symlink, FsLock, LockGuard};
pub use backend::{Backend, PlatformBackend};
#[cfg(unix)]
pub use backend::FlockBackend;
#[cfg(windows)]
pub use backend::OverlappedBackend;
pub use options::{LockOptions, PollStrategy, ZeroTimeout, DEFAULT_POLL_INTERVAL};
