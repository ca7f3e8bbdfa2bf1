//! A fair, multi-permit, closable counting semaphore.
//!
//! ```
//! use syncforge::semaphore::Semaphore;
//!
//! let sem = Semaphore::new(2, 2).unwrap();
//! sem.acquire_many(2).unwrap();
//! assert!(sem.try_acquire().is_err());
//! sem.release().unwrap();
//! assert!(sem.try_acquire().is_ok());
//! ```
//!
//! ## Permit word
//!
//! Available permits and a `closed` flag share one `AtomicUsize`: the top
//! bit is the sentinel, the rest is the count. A fast-path `acquire`/
//! `release` is a single CAS against this word; only a thread that can't
//! be satisfied immediately touches the queue mutex.
//!
//! ## Fairness
//!
//! Waiters that block queue up FIFO. `release_many` funds the queue head
//! first: if the head wants more than what's available it is debited (not
//! skipped), so a large request already at the head is never jumped by a
//! smaller one that arrives later. See [`Semaphore::release_many`].

mod error;
mod semaphore;
mod waiter;

pub use error::{AcquireError, Closed, InitError, ReleaseError};
pub use semaphore::Semaphore;

/// Top-bit sentinel packed into the permit word and into each waiter's
/// `wants` field to mark "woken by close" without a second shared write.
pub(crate) const CLOSED: usize = 1 << (usize::BITS - 1);
