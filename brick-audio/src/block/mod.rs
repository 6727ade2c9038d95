//! Fixed-size sample blocks and the DMA double buffers.
//!
//! Samples are 24-bit values held in `i32` containers, stored frame-major:
//! `frames[n][ch]` is channel `ch` of frame `n`, which is exactly the TDM slot
//! order the serial interface shifts out.

mod double_buffer;

pub use double_buffer::{DoubleBuffer, InputBuffers, OutputBuffers};

use core::ops::{Deref, DerefMut};

use crate::constants::{AUDIO_FRAMES_PER_BLOCK, CARTRIDGE_CHANNELS, CARTRIDGE_COUNT};
use crate::constants::{AUDIO_INPUT_CHANNELS, AUDIO_OUTPUT_CHANNELS};

/// Which half of a double buffer a DMA completion refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HalfIndex {
    /// Ping: signalled by the half-transfer interrupt.
    First = 0,
    /// Pong: signalled by the transfer-complete interrupt.
    Second = 1,
}

impl HalfIndex {
    /// Both halves, in DMA order.
    pub const ALL: [HalfIndex; 2] = [HalfIndex::First, HalfIndex::Second];

    /// Array index of this half.
    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The half the DMA engine moves to after this one.
    pub const fn other(self) -> HalfIndex {
        match self {
            HalfIndex::First => HalfIndex::Second,
            HalfIndex::Second => HalfIndex::First,
        }
    }

    /// Decode `0`/`1`; anything else is `None`.
    pub const fn from_bits(bits: u8) -> Option<HalfIndex> {
        match bits {
            0 => Some(HalfIndex::First),
            1 => Some(HalfIndex::Second),
            _ => None,
        }
    }
}

/// One half-buffer worth of frames with `C` channels each.
///
/// 32-byte aligned so a half never shares a cache line with anything else.
#[repr(C, align(32))]
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct AudioBlock<const C: usize> {
    pub frames: [[i32; C]; AUDIO_FRAMES_PER_BLOCK],
}

impl<const C: usize> AudioBlock<C> {
    /// Number of `i32` words in one block.
    pub const WORDS: usize = C * AUDIO_FRAMES_PER_BLOCK;

    /// A block of digital silence.
    pub const fn zeroed() -> Self {
        AudioBlock {
            frames: [[0; C]; AUDIO_FRAMES_PER_BLOCK],
        }
    }

    /// A block with every sample set to `value`.
    pub const fn splat(value: i32) -> Self {
        AudioBlock {
            frames: [[value; C]; AUDIO_FRAMES_PER_BLOCK],
        }
    }
}

impl<const C: usize> Default for AudioBlock<C> {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl<const C: usize> core::fmt::Debug for AudioBlock<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AudioBlock")
            .field("channels", &C)
            .field("first_frame", &self.frames[0])
            .finish_non_exhaustive()
    }
}

impl<const C: usize> Deref for AudioBlock<C> {
    type Target = [[i32; C]; AUDIO_FRAMES_PER_BLOCK];

    fn deref(&self) -> &Self::Target {
        &self.frames
    }
}

impl<const C: usize> DerefMut for AudioBlock<C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.frames
    }
}

/// Block captured from the ADCs: 8 TDM slots per frame.
pub type InputBlock = AudioBlock<AUDIO_INPUT_CHANNELS>;

/// Block sent to the DAC: main L/R, cue L/R.
pub type OutputBlock = AudioBlock<AUDIO_OUTPUT_CHANNELS>;

/// Audio exchanged with the cartridges for one block: 4 cartridges,
/// each a block of 4 channels.
#[repr(C, align(32))]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct CartridgeBlock {
    pub cartridges: [AudioBlock<CARTRIDGE_CHANNELS>; CARTRIDGE_COUNT],
}

impl CartridgeBlock {
    /// All cartridges silent.
    pub const fn zeroed() -> Self {
        CartridgeBlock {
            cartridges: [AudioBlock::zeroed(); CARTRIDGE_COUNT],
        }
    }

    /// Silence every cartridge in place.
    pub fn clear(&mut self) {
        *self = Self::zeroed();
    }
}

impl Default for CartridgeBlock {
    fn default() -> Self {
        Self::zeroed()
    }
}
