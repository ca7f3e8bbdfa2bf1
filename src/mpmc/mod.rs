//! A bounded multi-producer multi-consumer channel.
//!
//! Every slot in the ring carries its own sequence stamp (Vyukov-style):
//! producers CAS `tail` to claim a ticket, consumers CAS `head` to claim
//! the matching one, and the slot's stamp hands the cell off between
//! whichever producer wrote it and whichever consumer is entitled to read
//! it next.
//!
//! ```
//! use syncforge::mpmc::Channel;
//!
//! let ch = Channel::new(4).unwrap();
//! ch.try_send(1).unwrap();
//! ch.try_send(2).unwrap();
//! assert_eq!(ch.try_recv().unwrap(), 1);
//! assert_eq!(ch.try_recv().unwrap(), 2);
//! assert!(ch.try_recv().is_err());
//! ```
//!
//! ## Synchronization
//!
//! | Operation | Ordering | Purpose |
//! |-----------|----------|---------|
//! | Claim own ticket (`tail`/`head` CAS) | `Relaxed` | Arbitration only, no payload to publish yet |
//! | Publish a written slot (`store_stamp`) | `Release` | Make the buffer write visible to the reader |
//! | Observe a slot before reading (`load_stamp`) | `Acquire` | See the writer's buffer write |
//!
//! `*_waiting` counters exist purely so a successful send/recv can skip an
//! `unpark` call when nobody is parked; a racily-missed wakeup is
//! self-healing because the blocked thread always retries its own
//! `try_send`/`try_recv` after waking.

mod channel;
mod error;
mod slot;

pub use channel::Channel;
pub use error::{InitError, TryRecvError, TrySendError};
