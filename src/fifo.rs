//! Sample ingress queue between the ADC interrupt and the worker loop.
//!
//! [`SampleFifo`] is the only structure in this crate that is ever touched
//! from two execution contexts at once: the producer (an ISR, or — in a
//! hosted test harness — whichever context calls [`SampleFifo::push`]) and
//! the consumer (the worker loop draining [`crate::decoder::Decoder::process`]).
//! It is single-producer/single-consumer and lock-free: the producer owns
//! the write index, the consumer owns the read index, and the two halves
//! synchronize purely through `Release`/`Acquire` ordering on those indices.
//!
//! # Synchronization protocol
//!
//! Push: write the sample into `buffer[write & mask]` (plain store), then
//! `Release`-store the incremented write index. Pop: `Acquire`-load the
//! write index, compute availability, then `Acquire`-load-guarded read of
//! `buffer[read & mask]`, then `Release`-store the incremented read index.
//! The `Release` on the data-bearing index guarantees the data write
//! happens-before any consumer that observes the new index value; there is
//! no spinning or retry on either side.
//!
//! [`RingBuffer`] is the overwriting sibling used by diagnostics: it never
//! reports itself full, instead advancing the read index to make room for
//! the newest sample. In the receive path that behavior would silently
//! corrupt timing recovery, so [`SampleFifo`] refuses to overwrite and
//! instead latches an overflow flag.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Non-overwriting single-producer/single-consumer sample queue.
///
/// `N` must be a power of two; this is checked at construction.
pub struct SampleFifo<const N: usize> {
    buffer: UnsafeCell<[f32; N]>,
    write: AtomicUsize,
    read: AtomicUsize,
    overflowed: AtomicBool,
}

impl<const N: usize> core::fmt::Debug for SampleFifo<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SampleFifo")
            .field("write", &self.write)
            .field("read", &self.read)
            .field("overflowed", &self.overflowed)
            .finish()
    }
}

// SAFETY: `buffer` is only written by the single producer at index
// `write & mask` and only read by the single consumer at index
// `read & mask`. The producer publishes its write with a `Release` store to
// `write`; the consumer only reads a slot after an `Acquire` load of `write`
// observes that publish, so the two sides never touch the same slot
// concurrently.
unsafe impl<const N: usize> Sync for SampleFifo<N> {}

impl<const N: usize> SampleFifo<N> {
    /// Creates an empty FIFO of capacity `N`.
    ///
    /// # Panics
    /// Panics if `N` is not a power of two or is zero.
    pub const fn new() -> Self {
        assert!(N.is_power_of_two(), "SampleFifo capacity must be a power of two");
        Self {
            buffer: UnsafeCell::new([0.0; N]),
            write: AtomicUsize::new(0),
            read: AtomicUsize::new(0),
            overflowed: AtomicBool::new(false),
        }
    }

    const MASK: usize = N - 1;

    /// Pushes one sample. Callable from the producer (ISR) context.
    ///
    /// Returns `false` and latches the overflow flag if the FIFO is full;
    /// the sample is dropped in that case. Never overwrites unread data.
    pub fn push(&self, sample: f32) -> bool {
        let write = self.write.load(Ordering::Relaxed);
        let read = self.read.load(Ordering::Acquire);

        if write.wrapping_sub(read) >= N {
            self.overflowed.store(true, Ordering::Release);
            return false;
        }

        // SAFETY: only the producer writes this slot, and it is not yet
        // visible to the consumer until the `Release` store below.
        unsafe {
            (*self.buffer.get())[write & Self::MASK] = sample;
        }

        self.write.store(write.wrapping_add(1), Ordering::Release);
        true
    }

    /// Pops one sample. Callable from the consumer (worker) context.
    ///
    /// Returns `None` without blocking if the FIFO is empty.
    pub fn pop(&self) -> Option<f32> {
        let read = self.read.load(Ordering::Relaxed);
        let write = self.write.load(Ordering::Acquire);

        if read == write {
            return None;
        }

        // SAFETY: the `Acquire` load of `write` above observed this slot's
        // publish, and only the consumer reads or advances `read`.
        let sample = unsafe { (*self.buffer.get())[read & Self::MASK] };

        self.read.store(read.wrapping_add(1), Ordering::Release);
        Some(sample)
    }

    /// Number of samples queued but not yet popped.
    pub fn available(&self) -> usize {
        let write = self.write.load(Ordering::Acquire);
        let read = self.read.load(Ordering::Acquire);
        write.wrapping_sub(read)
    }

    /// Total capacity.
    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn is_empty(&self) -> bool {
        self.available() == 0
    }

    pub fn is_full(&self) -> bool {
        self.available() >= N
    }

    /// Whether a push has ever been dropped due to a full FIFO since the
    /// last [`SampleFifo::clear_overflow`].
    pub fn overflowed(&self) -> bool {
        self.overflowed.load(Ordering::Acquire)
    }

    pub fn clear_overflow(&self) {
        self.overflowed.store(false, Ordering::Release);
    }

    /// Drops all queued samples. Consumer-context only: calling this while
    /// the producer is mid-push is a race, exactly as resetting `read` past
    /// an in-flight `write` would be on any SPSC queue.
    pub fn flush(&self) {
        let write = self.write.load(Ordering::Acquire);
        self.read.store(write, Ordering::Release);
        self.overflowed.store(false, Ordering::Release);
    }
}

impl<const N: usize> Default for SampleFifo<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Overwriting ring buffer used for diagnostics (e.g. a scope-trace capture
/// of recent samples). Unlike [`SampleFifo`], pushing into a full buffer
/// advances the read index so the newest sample always wins; there is no
/// overflow signal because none is needed.
#[derive(Debug)]
pub struct RingBuffer<const N: usize> {
    buffer: [f32; N],
    write: usize,
    read: usize,
    len: usize,
}

impl<const N: usize> RingBuffer<N> {
    pub const fn new() -> Self {
        assert!(N.is_power_of_two(), "RingBuffer capacity must be a power of two");
        Self {
            buffer: [0.0; N],
            write: 0,
            read: 0,
            len: 0,
        }
    }

    const MASK: usize = N - 1;

    /// Always accepts; if full, silently advances the read cursor to make
    /// room for the newest sample.
    pub fn push(&mut self, sample: f32) {
        self.buffer[self.write & Self::MASK] = sample;
        self.write = self.write.wrapping_add(1);

        if self.len == N {
            self.read = self.read.wrapping_add(1);
        } else {
            self.len += 1;
        }
    }

    pub fn pop(&mut self) -> Option<f32> {
        if self.len == 0 {
            return None;
        }
        let sample = self.buffer[self.read & Self::MASK];
        self.read = self.read.wrapping_add(1);
        self.len -= 1;
        Some(sample)
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}
