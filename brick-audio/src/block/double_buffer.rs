use core::cell::UnsafeCell;

use crate::constants::{AUDIO_INPUT_CHANNELS, AUDIO_OUTPUT_CHANNELS};
use crate::transport::DmaRegion;

use super::{AudioBlock, HalfIndex};

/// Ping-pong buffer shared between a circular DMA channel and the CPU.
///
/// The DMA engine sees both halves as one linear region and wraps around
/// forever. Ownership of each half alternates: while DMA fills (or drains)
/// one half, software owns the other. Software may only touch a half after
/// the synchronizer has published it as ready, and must be done with it
/// before DMA wraps back to it one half-period later.
#[repr(C, align(32))]
pub struct DoubleBuffer<const C: usize> {
    halves: UnsafeCell<[AudioBlock<C>; 2]>,
}

// SAFETY: the two halves are never accessed concurrently by the CPU and DMA.
// Access from software goes through the unsafe `half`/`half_mut` accessors
// whose contract is the ready-pair ownership handoff, or through volatile
// copies that tolerate in-flight DMA writes.
unsafe impl<const C: usize> Sync for DoubleBuffer<C> {}

/// Receive side: 8 TDM slots.
pub type InputBuffers = DoubleBuffer<AUDIO_INPUT_CHANNELS>;

/// Transmit side: 4 TDM slots.
pub type OutputBuffers = DoubleBuffer<AUDIO_OUTPUT_CHANNELS>;

impl<const C: usize> DoubleBuffer<C> {
    /// Both halves silent.
    pub const fn new() -> Self {
        DoubleBuffer {
            halves: UnsafeCell::new([AudioBlock::zeroed(); 2]),
        }
    }

    /// The whole ping-pong region, as programmed into the DMA channel.
    pub fn region(&self) -> DmaRegion {
        DmaRegion::new(self.halves.get() as *mut i32, 2 * AudioBlock::<C>::WORDS)
    }

    /// Address and byte length of one half, for cache maintenance.
    pub fn half_span(&self, half: HalfIndex) -> (usize, usize) {
        let base = self.halves.get() as usize;
        let len = core::mem::size_of::<AudioBlock<C>>();
        (base + half.index() * len, len)
    }

    /// Shared view of one half.
    ///
    /// # Safety
    ///
    /// `half` must currently be owned by software (published ready and not
    /// yet handed back to DMA), and no `half_mut` borrow of it may be alive.
    pub unsafe fn half(&self, half: HalfIndex) -> &AudioBlock<C> {
        unsafe { &(*self.halves.get())[half.index()] }
    }

    /// Exclusive view of one half.
    ///
    /// # Safety
    ///
    /// As for [`half`](Self::half), and no other borrow of the same half
    /// may be alive.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn half_mut(&self, half: HalfIndex) -> &mut AudioBlock<C> {
        unsafe { &mut (*self.halves.get())[half.index()] }
    }

    /// Copy one half out with a volatile read.
    ///
    /// Safe to call at any time; while streaming, the copy may contain a
    /// mix of old and new DMA data.
    pub fn read_half(&self, half: HalfIndex) -> AudioBlock<C> {
        // SAFETY: the pointer is valid and aligned for the lifetime of self;
        // a volatile read never creates a reference to the shared memory.
        unsafe {
            let base = self.halves.get() as *const AudioBlock<C>;
            core::ptr::read_volatile(base.add(half.index()))
        }
    }

    /// Overwrite one half with a volatile write.
    ///
    /// # Safety
    ///
    /// No borrow of `half` may be alive. Intended for the party that owns
    /// the half at this instant: the DMA side (or its software stand-in)
    /// while it holds the half, or software while streaming is stopped.
    pub unsafe fn write_half(&self, half: HalfIndex, block: &AudioBlock<C>) {
        unsafe {
            let base = self.halves.get() as *mut AudioBlock<C>;
            core::ptr::write_volatile(base.add(half.index()), *block);
        }
    }

    /// Silence both halves.
    ///
    /// # Safety
    ///
    /// The DMA channel using this buffer must be stopped.
    pub unsafe fn clear(&self) {
        for half in HalfIndex::ALL {
            unsafe { self.write_half(half, &AudioBlock::zeroed()) };
        }
    }
}

impl<const C: usize> Default for DoubleBuffer<C> {
    fn default() -> Self {
        Self::new()
    }
}
