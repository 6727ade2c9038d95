//! TDM frame layout and the clock values derived from it.

use crate::constants::{
    AUDIO_INPUT_CHANNELS, AUDIO_OUTPUT_CHANNELS, AUDIO_SAMPLE_BITS, AUDIO_SAMPLE_RATE_HZ,
    AUDIO_SLOT_BITS,
};

use super::{Direction, TransportError};

/// Most slots a serial block can address in one frame.
pub const MAX_SLOTS: u32 = 16;

/// Frame layout and clocking of the TDM bus.
///
/// The receiver is the bus master: it divides the serial kernel clock down to
/// MCLK for the codecs and drives bit clock and frame sync. The transmitter
/// runs in sync with it, so both share the sample rate but not the slot count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TdmConfig {
    /// Serial peripheral kernel clock, Hz.
    pub kernel_clock_hz: u32,
    /// Master clock sent to the codecs, Hz.
    pub mclk_hz: u32,
    pub sample_rate_hz: u32,
    /// Bits per slot on the wire.
    pub slot_bits: u32,
    /// Significant bits per sample inside a slot.
    pub data_bits: u32,
    pub rx_slots: u32,
    pub tx_slots: u32,
}

impl Default for TdmConfig {
    /// 48 kHz, 8 x 32-bit capture slots, 4 x 32-bit playback slots,
    /// MCLK = 256 fs from a 49.152 MHz kernel clock.
    fn default() -> Self {
        TdmConfig {
            kernel_clock_hz: 49_152_000,
            mclk_hz: 256 * AUDIO_SAMPLE_RATE_HZ,
            sample_rate_hz: AUDIO_SAMPLE_RATE_HZ,
            slot_bits: AUDIO_SLOT_BITS,
            data_bits: AUDIO_SAMPLE_BITS,
            rx_slots: AUDIO_INPUT_CHANNELS as u32,
            tx_slots: AUDIO_OUTPUT_CHANNELS as u32,
        }
    }
}

impl TdmConfig {
    /// Check that the layout can be programmed.
    pub fn validate(&self) -> Result<(), TransportError> {
        if !matches!(self.slot_bits, 16 | 32) {
            return Err(TransportError::InvalidConfig("slot width must be 16 or 32 bits"));
        }
        if self.data_bits == 0 || self.data_bits > self.slot_bits {
            return Err(TransportError::InvalidConfig("data wider than slot"));
        }
        for slots in [self.rx_slots, self.tx_slots] {
            if slots == 0 || slots > MAX_SLOTS {
                return Err(TransportError::InvalidConfig("slot count out of range"));
            }
        }
        if self.sample_rate_hz == 0 || self.mclk_hz == 0 {
            return Err(TransportError::InvalidConfig("zero clock"));
        }
        if self.kernel_clock_hz < self.mclk_hz || self.kernel_clock_hz % self.mclk_hz != 0 {
            return Err(TransportError::InvalidConfig("kernel clock not divisible into MCLK"));
        }
        if self.mclk_hz % self.sample_rate_hz != 0 {
            return Err(TransportError::InvalidConfig("MCLK not a multiple of the sample rate"));
        }
        if self.bit_clock_hz() > self.mclk_hz {
            return Err(TransportError::InvalidConfig("bit clock faster than MCLK"));
        }
        Ok(())
    }

    pub const fn slots(&self, dir: Direction) -> u32 {
        match dir {
            Direction::Rx => self.rx_slots,
            Direction::Tx => self.tx_slots,
        }
    }

    // The derived values below are only meaningful for a configuration that
    // passed `validate`. They saturate instead of panicking on one that did not.

    /// Frame length in bit clocks.
    pub const fn frame_bits(&self, dir: Direction) -> u32 {
        self.slots(dir).saturating_mul(self.slot_bits)
    }

    /// Frame-sync active length: half the frame (50 % duty).
    pub const fn fs_active_bits(&self, dir: Direction) -> u32 {
        self.frame_bits(dir) / 2
    }

    /// One bit per active slot, slot 0 in bit 0.
    pub const fn slot_mask(&self, dir: Direction) -> u16 {
        match 1u32.checked_shl(self.slots(dir)) {
            Some(bit) if bit <= 1 << 16 => (bit - 1) as u16,
            _ => u16::MAX,
        }
    }

    /// Value for the master-clock divider field (`kernel / (div + 1) = MCLK`).
    pub const fn mclk_divider(&self) -> u32 {
        match self.kernel_clock_hz.checked_div(self.mclk_hz) {
            Some(ratio) => ratio.saturating_sub(1),
            None => 0,
        }
    }

    /// Bit clock generated by the master side.
    pub const fn bit_clock_hz(&self) -> u32 {
        self.sample_rate_hz.saturating_mul(self.frame_bits(Direction::Rx))
    }
}
