use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A single ring-buffer cell carrying its own Vyukov-style sequence stamp.
///
/// Stamp protocol, for a slot at index `i` and ticket `t = k * capacity + i`:
/// - `stamp == t`: empty, writable by the producer holding ticket `t`.
/// - `stamp == t + 1`: full, readable by the consumer holding ticket `t`.
/// - after a read: `stamp == t + capacity`, writable again on the next lap.
///
/// Each slot is independently owned at any instant by whichever producer or
/// consumer holds the matching ticket — unlike a single-producer/single-
/// consumer ring, several producers (or several consumers) race to claim a
/// ticket via CAS on the channel's `tail` (`head`) before touching the slot.
pub(crate) struct Slot<T> {
    stamp: AtomicUsize,
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Slot<T> {
    /// A freshly allocated slot at ring index `i` starts writable for
    /// ticket `i`.
    pub(crate) fn new(index: usize) -> Self {
        Self {
            stamp: AtomicUsize::new(index),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    #[inline]
    pub(crate) fn load_stamp(&self) -> usize {
        self.stamp.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn store_stamp(&self, stamp: usize) {
        self.stamp.store(stamp, Ordering::Release);
    }

    /// # Safety
    /// Caller must hold the ticket that makes this slot writable, and must
    /// not have a concurrent writer or reader of the same slot.
    #[inline]
    pub(crate) unsafe fn write(&self, value: T) {
        unsafe { ptr::write((*self.value.get()).as_mut_ptr(), value) };
    }

    /// # Safety
    /// Caller must hold the ticket that makes this slot readable, and the
    /// slot must actually contain an initialized value.
    #[inline]
    pub(crate) unsafe fn read(&self) -> T {
        unsafe { ptr::read((*self.value.get()).as_ptr()) }
    }

    /// # Safety
    /// Caller must ensure the slot currently holds an initialized value
    /// that nothing else will read or drop.
    #[inline]
    pub(crate) unsafe fn drop_in_place(&self) {
        unsafe { ptr::drop_in_place((*self.value.get()).as_mut_ptr()) };
    }
}

// The slot's value is only ever touched by whichever thread currently
// holds the matching ticket, established via the stamp's acquire/release
// pair; safe to hand slots across threads as long as `T: Send`.
unsafe impl<T: Send> Sync for Slot<T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let slot = Slot::new(0);
        unsafe {
            slot.write(42i32);
            assert_eq!(slot.read(), 42);
        }
    }

    #[test]
    fn initial_stamp_is_index() {
        for i in 0..8usize {
            let slot: Slot<()> = Slot::new(i);
            assert_eq!(slot.load_stamp(), i);
        }
    }
}
