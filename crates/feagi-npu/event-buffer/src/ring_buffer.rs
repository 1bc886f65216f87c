// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! Wait-free single-producer/single-consumer circular buffer
//!
//! ## Layout
//!
//! `N` slots, an `input` index (next slot to write) and an `output` index
//! (last slot read). Both indices move *downwards* modulo `N`. One slot is
//! always left empty so that the two indices alone tell "empty" from "full":
//!
//! ```text
//! allocated = (output - input - 1) mod N
//! free      = (input - output)     mod N
//! allocated + free = N - 1
//! ```
//!
//! ## Concurrency
//!
//! Correct only with exactly one producer and one consumer. `input` is written
//! by the producer alone and `output` by the consumer alone; each side reads
//! the other's index, and a stale view only ever under-reports what it may
//! touch. [`RingBuffer::split`] hands out one [`Producer`] and one
//! [`Consumer`], so the discipline is enforced by the borrow checker. Adding a
//! second producer or consumer needs a different structure (or a critical
//! section around every access).

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::cell::UnsafeCell;
use core::fmt;
use core::mem;
use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use crate::error::{BufferError, Result};
use crate::record::{EventRecord, Key};

/// Smallest capacity that can hold one event
pub const MIN_CAPACITY: usize = 2;

#[inline]
fn allocated(capacity: usize, input: usize, output: usize) -> usize {
    (output + capacity - input - 1) % capacity
}

#[inline]
fn unallocated(capacity: usize, input: usize, output: usize) -> usize {
    (input + capacity - output) % capacity
}

/// Fixed-capacity circular buffer of event records
///
/// # Example
/// ```
/// use feagi_npu_event_buffer::{RingBuffer, Spike};
///
/// let mut buffer = RingBuffer::<Spike>::initialize(4).unwrap();
/// assert!(buffer.push(Spike::new(10)));
/// assert!(buffer.push(Spike::new(20)));
/// assert!(buffer.push(Spike::new(30)));
/// assert!(!buffer.push(Spike::new(40))); // full: 3 usable slots
/// assert_eq!(buffer.overflow_count(), 1);
/// assert_eq!(buffer.pop(), Some(Spike::new(10)));
/// ```
pub struct RingBuffer<T: EventRecord> {
    slots: Box<[UnsafeCell<T>]>,
    input: AtomicUsize,
    output: AtomicUsize,
    overflows: AtomicU32,
    underflows: AtomicU32,
}

// SAFETY: slot access is partitioned between the single producer (writes the
// slot at `input`, which is never in the allocated range) and the single
// consumer (reads the slot below `output`, which is always allocated). Those
// two roles can only be obtained together through `split(&mut self)`.
unsafe impl<T: EventRecord + Send> Sync for RingBuffer<T> {}

impl<T: EventRecord> RingBuffer<T> {
    /// Allocate the backing array and reset indices and counters
    ///
    /// This is the only allocation the buffer ever makes.
    ///
    /// # Errors
    /// - [`BufferError::InvalidCapacity`] if `capacity < MIN_CAPACITY`
    /// - [`BufferError::AllocationFailure`] if the slots cannot be reserved
    pub fn initialize(capacity: usize) -> Result<Self> {
        if capacity < MIN_CAPACITY {
            tracing::error!(capacity, "Event buffer capacity too small");
            return Err(BufferError::InvalidCapacity { capacity });
        }

        let bytes = capacity.saturating_mul(mem::size_of::<T>());
        let mut slots = Vec::new();
        if slots.try_reserve_exact(capacity).is_err() {
            tracing::error!(capacity, bytes, "Cannot allocate event buffer");
            return Err(BufferError::AllocationFailure { capacity, bytes });
        }
        slots.extend((0..capacity).map(|_| UnsafeCell::new(T::default())));

        tracing::debug!(capacity, bytes, "Event buffer initialized");

        Ok(Self {
            slots: slots.into_boxed_slice(),
            input: AtomicUsize::new(capacity - 1),
            output: AtomicUsize::new(0),
            overflows: AtomicU32::new(0),
            underflows: AtomicU32::new(0),
        })
    }

    /// Split into the producer and consumer handles
    ///
    /// The handles borrow the buffer, so no other access is possible while
    /// they are alive.
    pub fn split(&mut self) -> (Producer<'_, T>, Consumer<'_, T>) {
        let buffer = &*self;
        (Producer { buffer }, Consumer { buffer })
    }

    /// Add an event; returns `false` and counts an overflow if full
    #[inline]
    pub fn push(&mut self, item: T) -> bool {
        self.push_slot(item)
    }

    /// Remove the oldest event; returns `None` and counts an underflow if empty
    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        self.pop_slot()
    }

    /// Consume the oldest event only if its key equals `key`
    ///
    /// On mismatch (or when empty) the buffer is left untouched.
    #[inline]
    pub fn peek_and_consume_if_key_equals(&mut self, key: Key) -> bool {
        self.consume_if_key_slot(key)
    }

    /// Total number of slots, including the one kept empty
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Maximum number of events held at once (`capacity - 1`)
    #[inline]
    pub fn usable_capacity(&self) -> usize {
        self.slots.len() - 1
    }

    /// Number of events currently held
    #[inline]
    pub fn len(&self) -> usize {
        let (input, output) = self.indices();
        allocated(self.capacity(), input, output)
    }

    /// True when no event is held
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of events that can still be pushed
    #[inline]
    pub fn free_capacity(&self) -> usize {
        let (input, output) = self.indices();
        unallocated(self.capacity(), input, output)
    }

    /// Pushes rejected because the buffer was full
    #[inline]
    pub fn overflow_count(&self) -> u32 {
        self.overflows.load(Ordering::Relaxed)
    }

    /// Pops attempted on an empty buffer
    ///
    /// Anything other than zero means the consumer polled without a reason
    /// to expect data.
    #[inline]
    pub fn underflow_count(&self) -> u32 {
        self.underflows.load(Ordering::Relaxed)
    }

    /// Current `(input, output)` index pair
    #[inline]
    pub fn indices(&self) -> (usize, usize) {
        (
            self.input.load(Ordering::Acquire),
            self.output.load(Ordering::Acquire),
        )
    }

    /// Snapshot of size and counters
    pub fn stats(&self) -> BufferStats {
        BufferStats {
            capacity: self.capacity(),
            allocated: self.len(),
            overflows: self.overflow_count(),
            underflows: self.underflow_count(),
        }
    }

    /// Log the end-of-run counter summary
    ///
    /// Overflows are a sizing signal (`warn`); underflows are a logic error
    /// in the consumer (`error`).
    pub fn report(&self, name: &str) -> BufferStats {
        let stats = self.stats();
        if stats.underflows > 0 {
            tracing::error!(
                buffer = name,
                underflows = stats.underflows,
                "Event buffer underflowed: consumer polled an empty buffer"
            );
        }
        if stats.overflows > 0 {
            tracing::warn!(
                buffer = name,
                overflows = stats.overflows,
                capacity = stats.capacity,
                "Event buffer overflowed: events were dropped"
            );
        }
        tracing::info!(
            buffer = name,
            allocated = stats.allocated,
            overflows = stats.overflows,
            underflows = stats.underflows,
            "Event buffer statistics"
        );
        stats
    }

    /// Human-readable listing of the held events, newest first
    pub fn debug_dump(&self) -> BufferDump<'_, T> {
        BufferDump { buffer: self }
    }

    /// Write [`RingBuffer::debug_dump`] through `tracing::debug!`
    pub fn log_contents(&self)
    where
        T: fmt::Display,
    {
        let (input, output) = self.indices();
        let n = allocated(self.capacity(), input, output);
        tracing::debug!(input, output, elements = n, "Event buffer contents");
        for (index, item) in self.entries_newest_first() {
            tracing::debug!("  {:3}: {}", index, item);
        }
    }

    fn entries_newest_first(&self) -> impl Iterator<Item = (usize, T)> + '_ {
        let capacity = self.capacity();
        let (input, output) = self.indices();
        let n = allocated(capacity, input, output);
        (1..=n).map(move |offset| {
            let index = (input + offset) % capacity;
            // SAFETY: only reachable through `&self` outside of `split`, so no
            // producer can be writing concurrently.
            (index, unsafe { *self.slots[index].get() })
        })
    }

    #[inline]
    fn step(&self, index: usize) -> usize {
        if index == 0 {
            self.capacity() - 1
        } else {
            index - 1
        }
    }

    fn push_slot(&self, item: T) -> bool {
        let input = self.input.load(Ordering::Relaxed);
        let output = self.output.load(Ordering::Acquire);

        if unallocated(self.capacity(), input, output) == 0 {
            self.overflows.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        // SAFETY: `input != output` and the slot at `input` lies outside the
        // allocated range, so the consumer never reads it until the index
        // store below publishes it.
        unsafe {
            *self.slots[input].get() = item;
        }
        self.input.store(self.step(input), Ordering::Release);
        true
    }

    fn pop_slot(&self) -> Option<T> {
        let output = self.output.load(Ordering::Relaxed);
        let input = self.input.load(Ordering::Acquire);

        if allocated(self.capacity(), input, output) == 0 {
            self.underflows.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let next = self.step(output);
        // SAFETY: `next` is inside the allocated range; the producer does not
        // write it until `output` moves past it.
        let item = unsafe { *self.slots[next].get() };
        self.output.store(next, Ordering::Release);
        Some(item)
    }

    fn consume_if_key_slot(&self, key: Key) -> bool {
        let output = self.output.load(Ordering::Relaxed);
        let input = self.input.load(Ordering::Acquire);

        if allocated(self.capacity(), input, output) == 0 {
            return false;
        }

        let next = self.step(output);
        // SAFETY: as in `pop_slot`.
        let item = unsafe { &*self.slots[next].get() };
        if item.key() == key {
            self.output.store(next, Ordering::Release);
            true
        } else {
            false
        }
    }
}

impl<T: EventRecord> fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (input, output) = self.indices();
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .field("input", &input)
            .field("output", &output)
            .field("overflows", &self.overflow_count())
            .field("underflows", &self.underflow_count())
            .finish()
    }
}

/// Producer half of a split [`RingBuffer`] (interrupt side)
pub struct Producer<'a, T: EventRecord> {
    buffer: &'a RingBuffer<T>,
}

impl<T: EventRecord> Producer<'_, T> {
    /// Add an event; returns `false` and counts an overflow if full
    #[inline]
    pub fn push(&mut self, item: T) -> bool {
        self.buffer.push_slot(item)
    }

    /// Number of events that can still be pushed
    #[inline]
    pub fn free_capacity(&self) -> usize {
        self.buffer.free_capacity()
    }

    /// True when the next push would overflow
    #[inline]
    pub fn is_full(&self) -> bool {
        self.free_capacity() == 0
    }

    /// Pushes rejected so far
    #[inline]
    pub fn overflow_count(&self) -> u32 {
        self.buffer.overflow_count()
    }
}

/// Consumer half of a split [`RingBuffer`] (simulation loop side)
pub struct Consumer<'a, T: EventRecord> {
    buffer: &'a RingBuffer<T>,
}

impl<T: EventRecord> Consumer<'_, T> {
    /// Remove the oldest event; returns `None` and counts an underflow if empty
    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        self.buffer.pop_slot()
    }

    /// Consume the oldest event only if its key equals `key`
    #[inline]
    pub fn peek_and_consume_if_key_equals(&mut self, key: Key) -> bool {
        self.buffer.consume_if_key_slot(key)
    }

    /// Number of events currently held
    #[inline]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// True when no event is held
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Pops attempted on an empty buffer so far
    #[inline]
    pub fn underflow_count(&self) -> u32 {
        self.buffer.underflow_count()
    }
}

/// Counter snapshot of a [`RingBuffer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferStats {
    /// Total slots (usable = capacity - 1)
    pub capacity: usize,
    /// Events held at snapshot time
    pub allocated: usize,
    /// Rejected pushes
    pub overflows: u32,
    /// Pops on an empty buffer
    pub underflows: u32,
}

impl BufferStats {
    /// True if the consumer ever polled an empty buffer
    pub fn has_underflowed(&self) -> bool {
        self.underflows > 0
    }
}

/// Display adapter returned by [`RingBuffer::debug_dump`]
pub struct BufferDump<'a, T: EventRecord> {
    buffer: &'a RingBuffer<T>,
}

impl<T: EventRecord + fmt::Display> fmt::Display for BufferDump<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (input, output) = self.buffer.indices();
        writeln!(
            f,
            "buffer: input = {:3}, output = {:3} elements = {:3}",
            input,
            output,
            self.buffer.len()
        )?;
        writeln!(f, "------------------------------------------------")?;
        for (index, item) in self.buffer.entries_newest_first() {
            writeln!(f, "  {:3}: {}", index, item)?;
        }
        writeln!(f, "------------------------------------------------")
    }
}
