//! RX/TX half-buffer reconciliation.
//!
//! The receive and transmit DMA channels share a frame clock but raise their
//! half/full interrupts at slightly different instants. [`HalfSync`] only
//! declares a half "ready" once *both* directions have completed that same
//! half, so the input processed in a block always lines up with the output
//! half written in that block.
//!
//! All state is packed into atomics so the interrupt handlers never take a
//! lock:
//!
//! ```text
//! state (u8):  bit 0  RX done
//!              bit 1  TX done
//!              bits 2-3  tracked half + 1 (0 = nothing tracked)
//! ready (u8):  published half, or 0xFF
//! ```

use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use crate::block::HalfIndex;
use crate::transport::Direction;

const RX_DONE: u8 = 0b01;
const TX_DONE: u8 = 0b10;
const BOTH_DONE: u8 = RX_DONE | TX_DONE;
const MASK_BITS: u8 = 0b11;
const TRACK_SHIFT: u8 = 2;
const IDLE: u8 = 0;
const NO_READY: u8 = 0xFF;

impl Direction {
    #[inline(always)]
    const fn done_bit(self) -> u8 {
        match self {
            Direction::Rx => RX_DONE,
            Direction::Tx => TX_DONE,
        }
    }
}

#[inline(always)]
const fn pack(half: HalfIndex, mask: u8) -> u8 {
    ((half as u8 + 1) << TRACK_SHIFT) | (mask & MASK_BITS)
}

#[inline(always)]
const fn tracked(state: u8) -> Option<HalfIndex> {
    match state >> TRACK_SHIFT {
        0 => None,
        n => HalfIndex::from_bits(n - 1),
    }
}

/// Lock-free synchronizer for the two DMA directions.
///
/// [`mark`](Self::mark) is called from the RX and TX completion interrupts;
/// [`take_ready`](Self::take_ready) from the audio worker.
pub struct HalfSync {
    state: AtomicU8,
    ready: AtomicU8,
    dropped: AtomicU32,
    overruns: AtomicU32,
}

impl HalfSync {
    /// Nothing tracked, nothing ready.
    pub const fn new() -> Self {
        HalfSync {
            state: AtomicU8::new(IDLE),
            ready: AtomicU8::new(NO_READY),
            dropped: AtomicU32::new(0),
            overruns: AtomicU32::new(0),
        }
    }

    /// Record that `dir` finished transferring `half`.
    ///
    /// Returns `Some(half)` exactly when this completion makes both
    /// directions agree on `half`; the pair is then published for
    /// [`take_ready`](Self::take_ready) and the completion mask is re-armed.
    /// A completion for a different half than the one being tracked discards
    /// the partial mask (counted in [`dropped_blocks`](Self::dropped_blocks)).
    pub fn mark(&self, dir: Direction, half: HalfIndex) -> Option<HalfIndex> {
        let mut current = self.state.load(Ordering::Acquire);
        let (stale, complete) = loop {
            let mut mask = current & MASK_BITS;
            let mut stale = false;
            if tracked(current) != Some(half) {
                stale = mask != 0;
                mask = 0;
            }
            mask |= dir.done_bit();

            let complete = mask == BOTH_DONE;
            let next = if complete { IDLE } else { pack(half, mask) };

            match self.state.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break (stale, complete),
                Err(actual) => current = actual, // the other direction raced us
            }
        };

        if stale {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        if !complete {
            return None;
        }

        let previous = self.ready.swap(half as u8, Ordering::AcqRel);
        if previous != NO_READY {
            self.overruns.fetch_add(1, Ordering::Relaxed);
        }
        Some(half)
    }

    /// Consume the published pair, if any.
    pub fn take_ready(&self) -> Option<HalfIndex> {
        HalfIndex::from_bits(self.ready.swap(NO_READY, Ordering::AcqRel))
    }

    /// Whether a pair is published and not yet consumed.
    pub fn has_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire) != NO_READY
    }

    /// The half currently being tracked, if a partial completion is pending.
    pub fn tracked_half(&self) -> Option<HalfIndex> {
        tracked(self.state.load(Ordering::Acquire))
    }

    /// Forget any partial completion and any unconsumed pair.
    ///
    /// Call while both DMA channels are stopped.
    pub fn reset(&self) {
        self.state.store(IDLE, Ordering::Release);
        self.ready.store(NO_READY, Ordering::Release);
    }

    /// Partial completions discarded because the other direction moved on.
    pub fn dropped_blocks(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Published pairs replaced before anyone consumed them.
    pub fn overruns(&self) -> u32 {
        self.overruns.load(Ordering::Relaxed)
    }

    /// Zero both diagnostic counters.
    pub fn clear_stats(&self) {
        self.dropped.store(0, Ordering::Relaxed);
        self.overruns.store(0, Ordering::Relaxed);
    }
}

impl Default for HalfSync {
    fn default() -> Self {
        Self::new()
    }
}
