//! A one-shot, edge-triggered blocking latch.
//!
//! `Parker` is the shared building block underneath both the MPMC channel
//! (one `Parker` per direction, woken across the send/recv divide) and the
//! counting semaphore (one `Parker` per queued waiter). It has exactly one
//! logical consumer: a single thread parks on it at a time, woken by
//! exactly one unparking thread.

use std::sync::{Condvar, Mutex};

/// Edge-triggered binary latch: `unpark` sets the edge, `park` blocks until
/// the edge is set, then clears it on the way out.
///
/// `state` transitions happen under `mutex`, which is what gives `park`'s
/// load of the flag its acquire semantics and `unpark`'s store its release
/// semantics — both sides take the same lock, so no separate atomics are
/// needed to establish the happens-before edge.
pub struct Parker {
    state: Mutex<bool>,
    condvar: Condvar,
}

impl Parker {
    /// Create a parker with the edge clear.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    /// Block the calling thread until `unpark` has set the edge at least
    /// once since the last successful `park`, then clear it and return.
    ///
    /// Absorbs spurious condvar wakeups by looping on the predicate.
    /// Parking is single-consumer: do not call this from two threads on
    /// the same `Parker` concurrently.
    pub fn park(&self) {
        let mut notified = self.state.lock().unwrap_or_else(|e| e.into_inner());
        while !*notified {
            notified = self
                .condvar
                .wait(notified)
                .unwrap_or_else(|e| e.into_inner());
        }
        *notified = false;
    }

    /// Set the edge and wake one waiter.
    ///
    /// If no thread is currently parked, the edge remains set and the next
    /// `park` call returns immediately without blocking. Calling `unpark`
    /// more than once with no intervening `park` is a no-op beyond the
    /// edge already being set.
    pub fn unpark(&self) {
        let mut notified = self.state.lock().unwrap_or_else(|e| e.into_inner());
        *notified = true;
        // Signal while still holding the lock: the parked thread cannot
        // observe `notified` and re-block between our unlock and the
        // notify, because it can only reacquire the mutex after we drop it.
        self.condvar.notify_one();
    }
}

impl Default for Parker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn unpark_before_park_is_remembered() {
        let p = Parker::new();
        p.unpark();
        p.park(); // must return immediately
    }

    #[test]
    fn double_unpark_is_a_single_edge() {
        let p = Parker::new();
        p.unpark();
        p.unpark();
        p.park(); // consumes the edge once
        // A second park would block forever here, so we don't call it;
        // the point is a double-unpark didn't queue two wakeups.
    }

    #[test]
    fn park_blocks_until_unparked() {
        let p = Arc::new(Parker::new());
        let woke = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let p2 = p.clone();
        let woke2 = woke.clone();
        let handle = thread::spawn(move || {
            p2.park();
            woke2.store(true, std::sync::atomic::Ordering::SeqCst);
        });

        thread::sleep(Duration::from_millis(20));
        assert!(!woke.load(std::sync::atomic::Ordering::SeqCst));

        p.unpark();
        handle.join().unwrap();
        assert!(woke.load(std::sync::atomic::Ordering::SeqCst));
    }
}
