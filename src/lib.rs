//! Low-level concurrency primitives: a one-shot thread parker, a bounded
//! lock-free MPMC channel, and a fair counting semaphore.
//!
//! Each primitive is self-contained and usable on its own:
//!
//! - [`parker`] — an edge-triggered blocking latch. The building block the
//!   other two use to put a thread to sleep without busy-waiting forever.
//! - [`mpmc`] — a bounded, fixed-capacity channel any number of producer
//!   and consumer threads can share, built on Vyukov's sequence-stamped
//!   ring buffer.
//! - [`semaphore`] — a multi-permit counting semaphore with strict FIFO
//!   fairness and an explicit, wake-everyone `close`.
//!
//! None of these spin indefinitely: every blocking path bounds its CAS
//! retries with a capped, doubling backoff before parking the calling
//! thread.

pub mod mpmc;
pub mod parker;
pub mod semaphore;

mod spin;
