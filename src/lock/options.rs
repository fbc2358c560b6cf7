use std::time::Duration;

/// Nominal wait granularity of the polling backend.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How the polling backend spaces its non-blocking attempts while a lock is contended.
///
/// Only the blocking (`flock`) backend polls. The overlapped backend waits on a
/// native timer and ignores this setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStrategy {
    /// Sleep the same interval between every attempt.
    Fixed(Duration),
    /// Start at `initial`, grow 1.5x per contended attempt up to `max`,
    /// and add a random jitter in `[0, jitter]` to each sleep.
    Backoff {
        initial: Duration,
        max: Duration,
        jitter: Duration,
    },
}

impl PollStrategy {
    /// Exponential backoff capped at [`DEFAULT_POLL_INTERVAL`].
    pub fn backoff() -> Self {
        PollStrategy::Backoff {
            initial: Duration::from_millis(5),
            max: DEFAULT_POLL_INTERVAL,
            jitter: Duration::from_millis(5),
        }
    }
}

impl Default for PollStrategy {
    fn default() -> Self {
        PollStrategy::Fixed(DEFAULT_POLL_INTERVAL)
    }
}

/// What `lock_with_timeout(Duration::ZERO)` means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZeroTimeout {
    /// Make a single attempt and return the timeout error if the lock is held elsewhere.
    #[default]
    TryOnce,
    /// Treat a zero timeout as "no deadline" and block until the lock is granted.
    WaitForever,
}

/// Settings fixed for the lifetime of an [`FsLock`](crate::FsLock).
#[derive(Debug, Clone)]
pub struct LockOptions {
    pub poll: PollStrategy,
    pub zero_timeout: ZeroTimeout,
    /// When false, opening a lock path that is a symbolic link fails.
    pub follow_symlinks: bool,
}

impl LockOptions {
    pub fn new() -> Self {
        Self {
            poll: PollStrategy::default(),
            zero_timeout: ZeroTimeout::default(),
            follow_symlinks: true,
        }
    }

    pub fn with_poll(mut self, poll: PollStrategy) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_poll_interval(self, interval: Duration) -> Self {
        self.with_poll(PollStrategy::Fixed(interval))
    }

    pub fn with_zero_timeout(mut self, zero_timeout: ZeroTimeout) -> Self {
        self.zero_timeout = zero_timeout;
        self
    }

    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }
}

impl Default for LockOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = LockOptions::default();
        assert_eq!(options.poll, PollStrategy::Fixed(Duration::from_millis(50)));
        assert_eq!(options.zero_timeout, ZeroTimeout::TryOnce);
        assert!(options.follow_symlinks);
    }

    #[test]
    fn test_builder_overrides() {
        let options = LockOptions::new()
            .with_poll_interval(Duration::from_millis(10))
            .with_zero_timeout(ZeroTimeout::WaitForever)
            .with_follow_symlinks(false);

        assert_eq!(options.poll, PollStrategy::Fixed(Duration::from_millis(10)));
        assert_eq!(options.zero_timeout, ZeroTimeout::WaitForever);
        assert!(!options.follow_symlinks);
    }

    #[test]
    fn test_backoff_capped_at_nominal_interval() {
        match PollStrategy::backoff() {
            PollStrategy::Backoff { initial, max, .. } => {
                assert!(initial < max);
                assert_eq!(max, DEFAULT_POLL_INTERVAL);
            }
            other => panic!("unexpected strategy {:?}", other),
        }
    }
}
