//! Playback ring for aligning speaker output with delayed microphone capture.
//!
//! A single-producer, single-consumer ring of `f32` samples:
//! - The render (speaker) callback appends with [`PlaybackRing::write`]
//! - The capture (microphone) callback looks up a delay-compensated window
//!   with [`PlaybackRing::read_delayed`]
//!
//! # Design
//!
//! - Power-of-two capacity, positions masked into the storage
//! - Cursors are monotonically increasing sample counts kept in cache-line
//!   padded atomics; the fill level is `write - oldest`
//! - Reads do not consume. The buffered history keeps growing until it
//!   reaches capacity, so a capture path running in lockstep with playback
//!   can look back as far as the ring holds
//! - The producer never blocks and never waits for the consumer: when the
//!   ring is full the newest samples overwrite the oldest, which advances
//!   the oldest readable position
//! - Samples are stored as `f32` bit patterns in `AtomicU32`, so a consumer
//!   racing an overwriting producer sees stale audio, never undefined behavior
//!
//! # Memory ordering
//!
//! Producer: relaxed sample stores, then a release store of `write`.
//! Consumer: acquire load of `write` before touching samples. The consumer
//! only stores its own cursor in [`PlaybackRing::discard`].

#![deny(unsafe_code)]

use std::num::NonZero;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

/// Cache-line padded cursor so producer and consumer do not false-share.
#[derive(Debug, Default)]
#[repr(align(64))]
struct Cursor(AtomicUsize);

impl Cursor {
    fn load(&self, order: Ordering) -> usize {
        self.0.load(order)
    }

    fn store(&self, value: usize, order: Ordering) {
        self.0.store(value, order);
    }
}

/// Fixed-capacity overwrite-oldest sample ring.
///
/// # Invariants
///
/// - `capacity()` is a power of two and never changes
/// - `fill_count() <= capacity()` always holds
/// - the oldest readable position never passes `write`
///
/// Exactly one thread may call the producer methods ([`write`](Self::write) /
/// [`write_iter`](Self::write_iter)) and exactly one thread
/// [`discard`](Self::discard). The read methods take `&self` and do not
/// mutate the ring.
#[derive(Debug)]
pub struct PlaybackRing {
    samples: Box<[AtomicU32]>,
    mask: usize,
    /// Total samples ever written (producer).
    write: Cursor,
    /// Samples before this position were discarded and read as silence
    /// (consumer).
    origin: Cursor,
}

impl PlaybackRing {
    /// Creates a ring holding at least `min_capacity` samples.
    ///
    /// Capacity is rounded up to the next power of two.
    pub fn new(min_capacity: NonZero<usize>) -> Self {
        let capacity = min_capacity.get().next_power_of_two();
        Self {
            samples: (0..capacity).map(|_| AtomicU32::new(0)).collect(),
            mask: capacity - 1,
            write: Cursor::default(),
            origin: Cursor::default(),
        }
    }

    /// Returns the total capacity of the ring in samples.
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Total number of samples written since creation.
    pub fn written(&self) -> usize {
        self.write.load(Ordering::Acquire)
    }

    /// Number of buffered samples available for delayed reads. Grows with
    /// every write until it reaches the capacity.
    pub fn fill_count(&self) -> usize {
        let write = self.write.load(Ordering::Acquire);
        write - self.oldest(write)
    }

    /// Appends samples, overwriting the oldest when full. Never blocks.
    pub fn write(&self, samples: &[f32]) {
        self.write_iter(samples.iter().copied());
    }

    /// Appends samples from an iterator, overwriting the oldest when full.
    pub fn write_iter<I>(&self, samples: I)
    where
        I: IntoIterator<Item = f32>,
        I::IntoIter: ExactSizeIterator,
    {
        let samples = samples.into_iter();
        let count = samples.len();
        let write = self.write.load(Ordering::Relaxed);

        // Only the trailing `capacity` samples can survive.
        let skip = count.saturating_sub(self.capacity());
        for (i, sample) in samples.enumerate().skip(skip) {
            self.samples[(write + i) & self.mask].store(sample.to_bits(), Ordering::Relaxed);
        }

        self.write.store(write + count, Ordering::Release);
    }

    /// Copies `out.len()` samples starting `delay` samples before the write
    /// cursor. Nothing is consumed.
    ///
    /// When `delay` is zero or exceeds [`fill_count`](Self::fill_count), the
    /// window starts at the oldest buffered sample instead. Positions that
    /// have not been written yet read as zero. Returns the number of buffered
    /// samples actually copied.
    pub fn read_delayed(&self, delay: usize, out: &mut [f32]) -> usize {
        let write = self.write.load(Ordering::Acquire);
        let oldest = self.oldest(write);
        let fill = write - oldest;

        let start = if delay > 0 && delay <= fill { write - delay } else { oldest };
        let copied = out.len().min(write - start);

        for (i, slot) in out.iter_mut().enumerate() {
            *slot = if i < copied { self.load(start + i) } else { 0.0 };
        }
        copied
    }

    /// Copies the most recent `out.len()` samples ending at the write cursor.
    /// Positions that were never written, were overwritten, or were discarded
    /// read as zero.
    pub fn copy_latest(&self, out: &mut [f32]) {
        let write = self.write.load(Ordering::Acquire);
        let oldest = self.oldest(write);
        let first = write as isize - out.len() as isize;

        for (i, slot) in out.iter_mut().enumerate() {
            let pos = first + i as isize;
            *slot = if pos >= oldest as isize { self.load(pos as usize) } else { 0.0 };
        }
    }

    /// Discards everything buffered so far.
    ///
    /// Later reads behave exactly as on a freshly created ring.
    pub fn discard(&self) {
        let write = self.write.load(Ordering::Acquire);
        self.origin.store(write, Ordering::Release);
    }

    /// Oldest readable position: the discard point, pushed forward by
    /// overwrites.
    fn oldest(&self, write: usize) -> usize {
        let origin = self.origin.load(Ordering::Acquire);
        origin.max(write.saturating_sub(self.capacity())).min(write)
    }

    fn load(&self, pos: usize) -> f32 {
        f32::from_bits(self.samples[pos & self.mask].load(Ordering::Relaxed))
    }
}
