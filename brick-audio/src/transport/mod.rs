//! Serial TDM transport driven by two circular DMA channels.
//!
//! The receive side is the clock master (bit clock and frame sync for the
//! whole bus); the transmit side is slaved to it. Each direction streams a
//! [`DoubleBuffer`](crate::block::DoubleBuffer) forever and reports
//! half-transfer / transfer-complete events, which the DMA interrupt handlers
//! decode with [`DmaStatus::decode`] and forward to
//! [`AudioCore::on_dma_event`](crate::pipeline::AudioCore::on_dma_event).
//!
//! ## Components
//!
//! | Item | Purpose |
//! |------|---------|
//! | [`TdmTransport`] | Hardware seam: configure, arm, disarm |
//! | [`TdmConfig`] | Frame layout and clock derivation |
//! | [`DmaStatus`] | Interrupt flag decoding |
//! | `SoftTransport` | Software DMA for host tests (`std`) |

mod tdm;

#[cfg(feature = "std")]
mod soft;

pub use tdm::TdmConfig;

#[cfg(feature = "std")]
pub use soft::{SoftTransport, SoftTransportProbe};

use bitflags::bitflags;

use crate::block::HalfIndex;

/// Transfer direction of a DMA channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Serial interface to memory (ADC capture).
    Rx,
    /// Memory to serial interface (DAC playback).
    Tx,
}

impl core::fmt::Display for Direction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Direction::Rx => "rx",
            Direction::Tx => "tx",
        })
    }
}

/// Transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The requested frame layout cannot be programmed.
    #[error("invalid TDM configuration: {0}")]
    InvalidConfig(&'static str),
    /// `start` was called before a successful `configure`.
    #[error("transport not configured")]
    NotConfigured,
    /// `start` returned but the serial blocks are not clocking.
    #[error("transport did not start")]
    NotRunning,
    /// A DMA channel reported a transfer, FIFO or direct-mode error.
    #[error("{0} DMA error")]
    Dma(Direction),
}

/// Memory region a circular DMA channel streams, in 32-bit words.
///
/// The first half of the region is [`HalfIndex::First`], the second half
/// [`HalfIndex::Second`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaRegion {
    ptr: *mut i32,
    words: usize,
}

// SAFETY: a region is only an address range. Access through it follows the
// double-buffer ownership handoff, which is independent of the thread that
// holds the descriptor.
unsafe impl Send for DmaRegion {}

impl DmaRegion {
    pub const fn new(ptr: *mut i32, words: usize) -> Self {
        DmaRegion { ptr, words }
    }

    pub fn addr(&self) -> usize {
        self.ptr as usize
    }

    /// Length in 32-bit words, both halves together.
    pub const fn words(&self) -> usize {
        self.words
    }

    pub const fn as_mut_ptr(&self) -> *mut i32 {
        self.ptr
    }

    /// Words in one half.
    pub const fn half_words(&self) -> usize {
        self.words / 2
    }
}

bitflags! {
    /// Interrupt status of one DMA stream.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DmaStatus: u32 {
        /// First half of the circular buffer transferred.
        const HALF_TRANSFER = 1 << 0;
        /// Second half transferred; the channel wraps.
        const TRANSFER_COMPLETE = 1 << 1;
        const TRANSFER_ERROR = 1 << 2;
        const FIFO_ERROR = 1 << 3;
        const DIRECT_MODE_ERROR = 1 << 4;

        const ERRORS = Self::TRANSFER_ERROR.bits()
            | Self::FIFO_ERROR.bits()
            | Self::DIRECT_MODE_ERROR.bits();
    }
}

impl DmaStatus {
    /// Turn the flags of one interrupt into a completed half.
    ///
    /// Any error flag is fatal for the stream. Half-transfer wins over
    /// transfer-complete when both are set. `Ok(None)` means the interrupt
    /// carried nothing the audio path cares about.
    pub fn decode(self, dir: Direction) -> Result<Option<HalfIndex>, TransportError> {
        if self.intersects(DmaStatus::ERRORS) {
            Err(TransportError::Dma(dir))
        } else if self.contains(DmaStatus::HALF_TRANSFER) {
            Ok(Some(HalfIndex::First))
        } else if self.contains(DmaStatus::TRANSFER_COMPLETE) {
            Ok(Some(HalfIndex::Second))
        } else {
            Ok(None)
        }
    }
}

/// Serial TDM interface plus its two DMA channels.
///
/// Implementations own the peripheral; interrupt routing stays with the
/// application, which forwards decoded events to the engine.
pub trait TdmTransport {
    /// Program both serial blocks for `config`. Must not start the clocks.
    fn configure(&mut self, config: &TdmConfig) -> Result<(), TransportError>;

    /// Arm both circular DMA channels over `rx` and `tx` and enable the
    /// serial blocks, transmitter first so it is ready when the master
    /// starts clocking. A no-op while already running.
    fn start(&mut self, rx: DmaRegion, tx: DmaRegion) -> Result<(), TransportError>;

    /// Disable the serial blocks and both channels. Idempotent.
    fn stop(&mut self);

    fn is_running(&self) -> bool;
}

impl<T: TdmTransport + ?Sized> TdmTransport for &mut T {
    fn configure(&mut self, config: &TdmConfig) -> Result<(), TransportError> {
        (**self).configure(config)
    }

    fn start(&mut self, rx: DmaRegion, tx: DmaRegion) -> Result<(), TransportError> {
        (**self).start(rx, tx)
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn is_running(&self) -> bool {
        (**self).is_running()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_transfer_is_first_half() {
        assert_eq!(
            DmaStatus::HALF_TRANSFER.decode(Direction::Rx),
            Ok(Some(HalfIndex::First))
        );
    }

    #[test]
    fn transfer_complete_is_second_half() {
        assert_eq!(
            DmaStatus::TRANSFER_COMPLETE.decode(Direction::Tx),
            Ok(Some(HalfIndex::Second))
        );
    }

    #[test]
    fn half_transfer_wins_when_both_set() {
        let both = DmaStatus::HALF_TRANSFER | DmaStatus::TRANSFER_COMPLETE;
        assert_eq!(both.decode(Direction::Rx), Ok(Some(HalfIndex::First)));
    }

    #[test]
    fn every_error_flag_is_fatal() {
        for flag in [
            DmaStatus::TRANSFER_ERROR,
            DmaStatus::FIFO_ERROR,
            DmaStatus::DIRECT_MODE_ERROR,
        ] {
            assert_eq!(
                (flag | DmaStatus::HALF_TRANSFER).decode(Direction::Tx),
                Err(TransportError::Dma(Direction::Tx))
            );
        }
    }

    #[test]
    fn empty_status_is_ignored() {
        assert_eq!(DmaStatus::empty().decode(Direction::Rx), Ok(None));
    }

    #[test]
    fn unknown_bits_are_dropped() {
        assert_eq!(
            DmaStatus::from_bits_truncate(1 << 7).decode(Direction::Rx),
            Ok(None)
        );
    }

    #[test]
    fn region_halves() {
        let mut words = [0i32; 8];
        let region = DmaRegion::new(words.as_mut_ptr(), words.len());
        assert_eq!(region.half_words(), 4);
        assert_eq!(region.addr(), words.as_ptr() as usize);
    }
}
