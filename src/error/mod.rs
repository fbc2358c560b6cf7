mod types;

pub use types::{FsLockError, Result, TimeoutError};

// Re-export for convenience
pub use FsLockError as Error;
