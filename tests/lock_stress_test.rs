use fslock::FsLock;
use std::sync::atomic::{AtomicI32, AtomicI64, Ordering};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

const LOCK_ATTEMPTS: i64 = 200;
const CONCURRENT_LOCKS: i64 = 10;

#[test]
fn test_stress() {
    let temp = TempDir::new().unwrap();
    let lock_path = temp.path().join("testing");

    let counter = Arc::new(AtomicI64::new(0));
    // 1 while some handle believes it holds the lock, 0 otherwise
    let lock_state = Arc::new(AtomicI32::new(0));

    let workers: Vec<_> = (0..CONCURRENT_LOCKS)
        .map(|_| {
            let lock_path = lock_path.clone();
            let counter = counter.clone();
            let lock_state = lock_state.clone();

            thread::spawn(move || {
                let mut lock = FsLock::open(&lock_path).expect("Failed to create a new lock");
                for _ in 0..LOCK_ATTEMPTS {
                    lock.lock().unwrap();
                    let state = lock_state.fetch_add(1, Ordering::SeqCst) + 1;
                    assert_eq!(state, 1, "two handles held the lock at once");

                    thread::yield_now();

                    // Decrement before unlock so the next holder never sees a stale 1
                    lock_state.fetch_sub(1, Ordering::SeqCst);
                    lock.unlock().unwrap();

                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(
        counter.load(Ordering::SeqCst),
        LOCK_ATTEMPTS * CONCURRENT_LOCKS
    );
    assert_eq!(lock_state.load(Ordering::SeqCst), 0);
}
