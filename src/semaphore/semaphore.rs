use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::spin::Backoff;

use super::CLOSED;
use super::error::{AcquireError, Closed, InitError, ReleaseError};
use super::waiter::Waiter;

const SPIN_MAX: u32 = 7;

/// A fair, multi-permit, closable counting semaphore.
///
/// The `permits` word packs a `closed` flag into its top bit and the
/// available count into the rest (`Semaphore::MAX_PERMITS` is the largest
/// `capacity` that fits). Threads that cannot be satisfied immediately
/// enqueue onto a FIFO waiter queue and park; `release_many` funds queued
/// waiters strictly in enqueue order before returning any leftover permits
/// to the word, so a large request at the head of the queue is never
/// skipped by a later, smaller one (see [`Semaphore::release_many`]).
pub struct Semaphore {
    permits: AtomicUsize,
    capacity: usize,
    queue: Mutex<VecDeque<std::sync::Arc<Waiter>>>,
}

impl Semaphore {
    /// The largest permit count that fits in the word alongside the
    /// closed bit.
    pub const MAX_PERMITS: usize = usize::MAX ^ CLOSED;

    /// Create a semaphore with `initial` permits available and an upper
    /// bound of `capacity` permits ever in circulation.
    pub fn new(initial: usize, capacity: usize) -> Result<Self, InitError> {
        if capacity > Self::MAX_PERMITS {
            return Err(InitError::CapacityTooLarge);
        }
        if initial > capacity {
            return Err(InitError::InitialExceedsCapacity);
        }
        Ok(Self {
            permits: AtomicUsize::new(initial),
            capacity,
            queue: Mutex::new(VecDeque::new()),
        })
    }

    /// The upper bound on permits supplied at construction.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn is_closed_word(word: usize) -> bool {
        word & CLOSED != 0
    }

    /// Non-blocking attempt to acquire `n` permits.
    pub fn try_acquire_many(&self, n: usize) -> Result<(), AcquireError> {
        let mut backoff = Backoff::new(SPIN_MAX);
        let mut current = self.permits.load(Ordering::Acquire);
        loop {
            if Self::is_closed_word(current) {
                return Err(AcquireError::Closed);
            }
            let count = current & !CLOSED;
            if count < n {
                return Err(AcquireError::NotEnough);
            }
            let new = current - n;
            match self.permits.compare_exchange_weak(
                current,
                new,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => {
                    current = actual;
                    backoff.spin();
                }
            }
        }
    }

    /// Acquire a single permit, blocking if necessary.
    pub fn try_acquire(&self) -> Result<(), AcquireError> {
        self.try_acquire_many(1)
    }

    /// Acquire `n` permits, blocking the calling thread until they are
    /// funded or the semaphore closes.
    pub fn acquire_many(&self, n: usize) -> Result<(), Closed> {
        match self.try_acquire_many(n) {
            Ok(()) => Ok(()),
            Err(AcquireError::Closed) => Err(Closed),
            Err(AcquireError::NotEnough) => self.acquire_many_slow(n),
        }
    }

    /// Acquire a single permit, blocking if necessary.
    pub fn acquire(&self) -> Result<(), Closed> {
        self.acquire_many(1)
    }

    fn acquire_many_slow(&self, n: usize) -> Result<(), Closed> {
        let waiter = std::sync::Arc::new(Waiter::new(n));

        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());

        // Case 1: already closed, nothing to wait for.
        if Self::is_closed_word(self.permits.load(Ordering::Acquire)) {
            return Err(Closed);
        }

        // Case 2: a release may have landed between our failed fast-path
        // attempt and taking the lock — re-check while holding it so the
        // race between "enqueue" and "release funds the queue" is closed.
        match self.try_acquire_many(n) {
            Ok(()) => return Ok(()),
            Err(AcquireError::Closed) => return Err(Closed),
            Err(AcquireError::NotEnough) => {}
        }

        // Case 3: actually enqueue and park outside the lock.
        queue.push_back(waiter.clone());
        drop(queue);

        waiter.parker.park();

        if waiter.is_closed() {
            Err(Closed)
        } else {
            Ok(())
        }
    }

    /// Release `n` permits, funding queued waiters in strict FIFO order
    /// before returning any leftover to the permit word.
    ///
    /// A waiter at the head of the queue that wants more than `n` is
    /// debited by `n` and stays at the head, still parked — it never
    /// yields its position to a smaller request behind it. Permits that
    /// go straight to a funded waiter never round-trip through the permit
    /// word, so `capacity` only bounds what's left over after funding:
    /// releasing `n` where `n` alone would overflow `capacity` is fine as
    /// long as queued waiters absorb enough of it. Returns
    /// `Err(ReleaseError::Full)` without changing any state if the
    /// leftover after funding would push the available count above
    /// `capacity`.
    pub fn release_many(&self, n: usize) -> Result<(), ReleaseError> {
        if n == 0 {
            return Ok(());
        }

        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());

        let current = self.permits.load(Ordering::Relaxed);
        if Self::is_closed_word(current) {
            return Err(ReleaseError::Closed);
        }

        // Dry run over the queue without mutating it: figure out how many
        // waiters `n` would fully fund, whether one more gets a partial
        // debit, and what's left over. Nothing here is observable yet, so
        // a `Full` rejection below leaves every waiter exactly as it was.
        let mut remaining = n;
        let mut fully_funded = 0usize;
        for w in queue.iter() {
            if remaining == 0 {
                break;
            }
            let wants = w.wants();
            if wants > remaining {
                break;
            }
            remaining -= wants;
            fully_funded += 1;
        }
        let partial_debit = if remaining > 0 && fully_funded < queue.len() {
            let amount = remaining;
            remaining = 0;
            Some(amount)
        } else {
            None
        };

        let count = current & !CLOSED;
        if count + remaining > self.capacity {
            return Err(ReleaseError::Full);
        }

        // Commit: dequeue and wake everyone fully funded, debit the one
        // partially-funded waiter left at the head, then return whatever
        // wasn't claimed to the permit word.
        for _ in 0..fully_funded {
            let waiter = queue.pop_front().expect("fully_funded counted this waiter");
            waiter.parker.unpark();
        }
        if let Some(amount) = partial_debit {
            queue
                .front()
                .expect("partial_debit implies a waiter remains")
                .debit(amount);
        }
        self.permits.fetch_add(remaining, Ordering::Release);
        Ok(())
    }

    /// Release a single permit.
    pub fn release(&self) -> Result<(), ReleaseError> {
        self.release_many(1)
    }

    /// Close the semaphore: sticky, rejects future acquires, and wakes
    /// every currently queued waiter with [`Closed`].
    ///
    /// Idempotent — closing an already-closed semaphore is a no-op.
    pub fn close(&self) {
        let was_closed = self.permits.fetch_or(CLOSED, Ordering::AcqRel) & CLOSED != 0;
        if was_closed {
            return;
        }

        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        while let Some(waiter) = queue.pop_front() {
            waiter.mark_closed();
            waiter.parker.unpark();
        }
    }

    /// Whether [`Semaphore::close`] has been called.
    pub fn is_closed(&self) -> bool {
        Self::is_closed_word(self.permits.load(Ordering::Acquire))
    }

    /// Currently available permits (not counting what's reserved for
    /// queued-but-unfunded waiters).
    pub fn available_permits(&self) -> usize {
        self.permits.load(Ordering::Acquire) & !CLOSED
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        // Wake anyone still parked rather than leaving them blocked
        // forever if the owner forgot to call `close` explicitly.
        self.close();
    }
}
