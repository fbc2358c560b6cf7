use super::options::PollStrategy;
use rand::Rng;
use std::io;
use std::thread;
use std::time::{Duration, Instant};
use tracing::trace;

const MIN_BACKOFF: Duration = Duration::from_millis(1);

/// Sleep intervals produced by a [`PollStrategy`].
pub(crate) struct Pacer {
    strategy: PollStrategy,
    current: Duration,
}

impl Pacer {
    pub(crate) fn new(strategy: PollStrategy) -> Self {
        let current = match strategy {
            PollStrategy::Fixed(interval) => interval,
            PollStrategy::Backoff { initial, .. } => initial.max(MIN_BACKOFF),
        };
        Self { strategy, current }
    }

    pub(crate) fn next_interval(&mut self) -> Duration {
        match self.strategy {
            PollStrategy::Fixed(interval) => interval,
            PollStrategy::Backoff { max, jitter, .. } => {
                let base = self.current.min(max);
                self.current = (self.current.saturating_mul(3) / 2)
                    .max(self.current)
                    .min(max);

                let jitter_ms = jitter.as_millis().min(u128::from(u64::MAX)) as u64;
                if jitter_ms == 0 {
                    base
                } else {
                    base.saturating_add(Duration::from_millis(
                        rand::thread_rng().gen_range(0..=jitter_ms),
                    ))
                }
            }
        }
    }
}

/// Retry a non-blocking lock attempt until it succeeds or `timeout` elapses.
///
/// `attempt` returns `Ok(true)` when the lock was granted and `Ok(false)` when
/// it is held elsewhere. One attempt is always made before the deadline is
/// checked, so a zero timeout is a single try. Any error ends the loop at once.
///
/// Returns `Ok(false)` once the deadline has passed; never earlier.
pub(crate) fn poll_until<F>(timeout: Duration, strategy: PollStrategy, mut attempt: F) -> io::Result<bool>
where
    F: FnMut() -> io::Result<bool>,
{
    let start = Instant::now();
    let mut pacer = Pacer::new(strategy);
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        if attempt()? {
            trace!(attempts, "lock granted");
            return Ok(true);
        }

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            trace!(attempts, elapsed_ms = elapsed.as_millis() as u64, "lock deadline passed");
            return Ok(false);
        }

        // Never sleep past the deadline; the final attempt happens right at it.
        let sleep = pacer.next_interval().min(timeout - elapsed);
        trace!(attempts, sleep_ms = sleep.as_millis() as u64, "lock contended, retrying");
        thread::sleep(sleep);
    }
}
