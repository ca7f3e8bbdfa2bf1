use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

use crate::parker::Parker;
use crate::spin::Backoff;

use super::error::{InitError, TryRecvError, TrySendError};
use super::slot::Slot;

/// Bounded back-off before a non-blocking `try_send`/`try_recv` gives up
/// and reports `Full`/`Empty` even though the slot it was contending for
/// may not actually be at true capacity — see the module doc for why that
/// collapse is the intended contract.
const SPIN_MAX: u32 = 6;

/// A bounded, lock-free, multi-producer multi-consumer channel.
///
/// Each of the `capacity` slots carries its own sequence stamp
/// ([`Slot`]), Vyukov-style: producers race a CAS on `tail` to claim a
/// ticket, consumers race a CAS on `head` to claim the matching ticket, and
/// the slot's stamp is the handoff between whichever producer wrote it and
/// whichever consumer is entitled to read it next.
///
/// Unlike a split sender/receiver channel, `Channel<T>` has no sender or
/// receiver half — any number of threads may call [`Channel::send`] or
/// [`Channel::recv`] (and their non-blocking counterparts) on the same
/// shared handle, typically reached via `Arc<Channel<T>>`.
pub struct Channel<T> {
    buffer: Box<[Slot<T>]>,
    capacity: usize,
    head: CachePadded<AtomicUsize>,
    tail: CachePadded<AtomicUsize>,
    send_parker: Parker,
    recv_parker: Parker,
    send_waiting: CachePadded<AtomicUsize>,
    recv_waiting: CachePadded<AtomicUsize>,
}

impl<T> Channel<T> {
    /// Allocate a channel holding up to `capacity` items of type `T`.
    ///
    /// `capacity` need not be a power of two: slot indices are mapped with
    /// `% capacity`, not a mask, so there's no alignment requirement to
    /// enforce. Must be at least 2 — at `capacity == 1` the per-slot stamp
    /// after a write (`t + 1`) and the stamp the *next* producer's ticket
    /// needs to see to claim the same slot again collide (both are `t +
    /// 1`, since the next ticket for that slot is `t + capacity == t +
    /// 1`), so a second writer could claim and overwrite the slot before
    /// any reader observes it. Allocation failure is surfaced as `Err`,
    /// never an abort.
    pub fn new(capacity: usize) -> Result<Self, InitError> {
        if capacity < 2 {
            return Err(InitError::CapacityTooSmall);
        }

        let mut slots: Vec<Slot<T>> = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| InitError::AllocationFailed)?;
        for i in 0..capacity {
            slots.push(Slot::new(i));
        }

        Ok(Self {
            buffer: slots.into_boxed_slice(),
            capacity,
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
            send_parker: Parker::new(),
            recv_parker: Parker::new(),
            send_waiting: CachePadded::new(AtomicUsize::new(0)),
            recv_waiting: CachePadded::new(AtomicUsize::new(0)),
        })
    }

    /// The fixed capacity this channel was constructed with.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Non-blocking send. Returns `Err(TrySendError(msg))` if the channel
    /// is at capacity, or if contention on the slot exceeds a small spin
    /// budget (the two cases are not distinguished — see the module doc).
    pub fn try_send(&self, mut msg: T) -> Result<(), TrySendError<T>> {
        let mut backoff = Backoff::new(SPIN_MAX);
        loop {
            let tail = self.tail.load(Ordering::Relaxed);
            let cell = &self.buffer[tail % self.capacity];
            let seq = cell.load_stamp();

            match seq.cmp(&tail) {
                CmpOrdering::Equal => {
                    match self.tail.compare_exchange_weak(
                        tail,
                        tail.wrapping_add(1),
                        Ordering::Relaxed,
                        Ordering::Relaxed,
                    ) {
                        Ok(_) => {
                            // Safety: we won the CAS on `tail`, so we are
                            // the sole owner of this ticket's slot.
                            unsafe { cell.write(msg) };
                            cell.store_stamp(tail.wrapping_add(1));
                            if self.recv_waiting.load(Ordering::SeqCst) > 0 {
                                self.recv_parker.unpark();
                            }
                            return Ok(());
                        }
                        Err(_) => {
                            // Lost the race for this ticket to another
                            // producer; back off and reload `tail`.
                            if backoff.spin() {
                                return Err(TrySendError(msg));
                            }
                        }
                    }
                }
                // The slot is still awaiting its previous reader: a lap
                // behind, so the channel is full from this producer's view.
                CmpOrdering::Less => return Err(TrySendError(msg)),
                // Another producer has already moved `tail` past what we
                // loaded; reload and retry.
                CmpOrdering::Greater => {
                    if backoff.spin() {
                        return Err(TrySendError(msg));
                    }
                }
            }
        }
    }

    /// Non-blocking receive. Returns `Err(TryRecvError)` if the channel is
    /// empty, or (per the non-blocking contract) under exhausted
    /// contention.
    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        let mut backoff = Backoff::new(SPIN_MAX);
        loop {
            let head = self.head.load(Ordering::Relaxed);
            let cell = &self.buffer[head % self.capacity];
            let seq = cell.load_stamp();
            let ready = head.wrapping_add(1);

            match seq.cmp(&ready) {
                CmpOrdering::Equal => {
                    match self.head.compare_exchange_weak(
                        head,
                        head.wrapping_add(1),
                        Ordering::Relaxed,
                        Ordering::Relaxed,
                    ) {
                        Ok(_) => {
                            // Safety: we won the CAS on `head`, so we are
                            // the sole owner of this ticket's slot.
                            let value = unsafe { cell.read() };
                            cell.store_stamp(head.wrapping_add(self.capacity));
                            if self.send_waiting.load(Ordering::SeqCst) > 0 {
                                self.send_parker.unpark();
                            }
                            return Ok(value);
                        }
                        Err(_) => {
                            if backoff.spin() {
                                return Err(TryRecvError);
                            }
                        }
                    }
                }
                // Slot not written for this ticket yet: empty.
                CmpOrdering::Less => return Err(TryRecvError),
                // Another consumer already moved `head` past what we
                // loaded; reload and retry.
                CmpOrdering::Greater => {
                    if backoff.spin() {
                        return Err(TryRecvError);
                    }
                }
            }
        }
    }

    /// Blocking send: retries internally until a slot is claimed. Never
    /// surfaces `Full` — a caller that wants to observe backpressure
    /// should use [`Channel::try_send`].
    ///
    /// Registers in `send_waiting` *before* the retry that decides whether
    /// to park, not after: a consumer frees a slot and skips the unpark
    /// call whenever it observes `send_waiting == 0`, so incrementing only
    /// after a failed `try_send` would leave a window where a slot frees
    /// up, the consumer sees nobody waiting, and this thread then parks
    /// forever on an actually-available slot. Re-attempting `try_send`
    /// once the counter is up closes that window — if it still fails, any
    /// racing unpark is remembered by the parker's edge-triggered state
    /// and the next `park` call returns immediately.
    pub fn send(&self, mut msg: T) {
        match self.try_send(msg) {
            Ok(()) => return,
            Err(TrySendError(m)) => msg = m,
        }
        loop {
            self.send_waiting.fetch_add(1, Ordering::SeqCst);
            match self.try_send(msg) {
                Ok(()) => {
                    self.send_waiting.fetch_sub(1, Ordering::SeqCst);
                    return;
                }
                Err(TrySendError(m)) => {
                    msg = m;
                    self.send_parker.park();
                    self.send_waiting.fetch_sub(1, Ordering::SeqCst);
                }
            }
        }
    }

    /// Blocking receive: retries internally until a message is available.
    /// Never surfaces `Empty`. Same increment-before-park structure as
    /// [`Channel::send`], symmetric on `recv_waiting`/`recv_parker`.
    pub fn recv(&self) -> T {
        match self.try_recv() {
            Ok(v) => return v,
            Err(TryRecvError) => {}
        }
        loop {
            self.recv_waiting.fetch_add(1, Ordering::SeqCst);
            match self.try_recv() {
                Ok(v) => {
                    self.recv_waiting.fetch_sub(1, Ordering::SeqCst);
                    return v;
                }
                Err(TryRecvError) => {
                    self.recv_parker.park();
                    self.recv_waiting.fetch_sub(1, Ordering::SeqCst);
                }
            }
        }
    }
}

impl<T> Drop for Channel<T> {
    fn drop(&mut self) {
        // We have exclusive access here, so `head`/`tail` are exactly the
        // tickets of every element still buffered: every ticket in
        // `[head, tail)` landed in slot `ticket % capacity` and has not
        // been claimed by a reader.
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        let mut ticket = head;
        while ticket != tail {
            let slot = &self.buffer[ticket % self.capacity];
            unsafe { slot.drop_in_place() };
            ticket = ticket.wrapping_add(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize as StdAtomicUsize;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn rejects_capacity_below_two() {
        assert_eq!(
            Channel::<i32>::new(0).unwrap_err(),
            InitError::CapacityTooSmall
        );
        assert_eq!(
            Channel::<i32>::new(1).unwrap_err(),
            InitError::CapacityTooSmall
        );
    }

    // Single-threaded round-trip.
    #[test]
    fn round_trip_single_threaded() {
        let ch = Channel::new(4).unwrap();
        ch.try_send(1).unwrap();
        ch.try_send(2).unwrap();
        assert_eq!(ch.try_recv().unwrap(), 1);
        assert_eq!(ch.try_recv().unwrap(), 2);
        assert!(ch.try_recv().is_err());
    }

    // Fills to capacity, then drains completely.
    #[test]
    fn fills_and_drains() {
        let ch = Channel::new(2).unwrap();
        ch.try_send(10).unwrap();
        ch.try_send(20).unwrap();
        assert_eq!(ch.try_send(30).unwrap_err(), TrySendError(30));
        assert_eq!(ch.try_recv().unwrap(), 10);
        ch.try_send(30).unwrap();
        assert_eq!(ch.try_recv().unwrap(), 20);
        assert_eq!(ch.try_recv().unwrap(), 30);
        assert!(ch.try_recv().is_err());
    }

    // A blocking producer is woken once a consumer frees a slot.
    #[test]
    fn blocking_producer_wakes_on_space() {
        let ch = Arc::new(Channel::new(2).unwrap());
        ch.try_send(7).unwrap();
        ch.try_send(8).unwrap();

        let ch2 = ch.clone();
        let producer = thread::spawn(move || {
            ch2.send(9); // blocks until a slot is drained
        });

        thread::sleep(Duration::from_millis(50));
        assert_eq!(ch.try_recv().unwrap(), 7);

        producer.join().unwrap();
        assert_eq!(ch.try_recv().unwrap(), 8);
        assert_eq!(ch.try_recv().unwrap(), 9);
    }

    #[test]
    fn blocking_consumer_wakes_on_data() {
        let ch = Arc::new(Channel::new(2).unwrap());
        let ch2 = ch.clone();
        let consumer = thread::spawn(move || ch2.recv());

        thread::sleep(Duration::from_millis(50));
        ch.send(99);

        assert_eq!(consumer.join().unwrap(), 99);
    }

    // Property: no duplication / no loss under concurrent MPMC traffic.
    #[test]
    fn mpmc_no_duplication_no_loss() {
        const PRODUCERS: usize = 4;
        const CONSUMERS: usize = 4;
        const PER_PRODUCER: usize = 2000;

        let ch: Arc<Channel<usize>> = Arc::new(Channel::new(64).unwrap());
        let received: Arc<std::sync::Mutex<Vec<usize>>> =
            Arc::new(std::sync::Mutex::new(Vec::new()));
        let produced_count = Arc::new(StdAtomicUsize::new(0));

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let ch = ch.clone();
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        ch.send(p * PER_PRODUCER + i);
                    }
                })
            })
            .collect();

        let consumers: Vec<_> = (0..CONSUMERS)
            .map(|_| {
                let ch = ch.clone();
                let received = received.clone();
                let produced_count = produced_count.clone();
                thread::spawn(move || {
                    loop {
                        match ch.try_recv() {
                            Ok(v) => {
                                received.lock().unwrap().push(v);
                                produced_count.fetch_add(1, Ordering::SeqCst);
                            }
                            Err(_) => {
                                if produced_count.load(Ordering::SeqCst)
                                    >= PRODUCERS * PER_PRODUCER
                                {
                                    break;
                                }
                                thread::yield_now();
                            }
                        }
                    }
                })
            })
            .collect();

        for p in producers {
            p.join().unwrap();
        }
        for c in consumers {
            c.join().unwrap();
        }

        let mut got = received.lock().unwrap().clone();
        got.sort_unstable();
        let expected: Vec<usize> = (0..PRODUCERS * PER_PRODUCER).collect();
        assert_eq!(got, expected);
    }

    // Property: FIFO within a single producer's ticket stream.
    #[test]
    fn fifo_within_single_producer() {
        let ch = Channel::new(8).unwrap();
        for i in 0..5 {
            ch.try_send(i).unwrap();
        }
        for i in 0..5 {
            assert_eq!(ch.try_recv().unwrap(), i);
        }
    }

    // Property: channel drops unread elements on Drop (no leak, checked
    // via a drop counter).
    #[test]
    fn drops_unread_elements() {
        struct DropCounter(Arc<StdAtomicUsize>);
        impl Drop for DropCounter {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let count = Arc::new(StdAtomicUsize::new(0));
        {
            let ch = Channel::new(4).unwrap();
            ch.try_send(DropCounter(count.clone())).unwrap();
            ch.try_send(DropCounter(count.clone())).unwrap();
            ch.try_send(DropCounter(count.clone())).unwrap();
            let _ = ch.try_recv().unwrap();
            assert_eq!(count.load(Ordering::SeqCst), 1);
        }
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}
