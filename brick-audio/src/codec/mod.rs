//! Codec drivers for the audio front end.
//!
//! Two ADAU1979 quad ADCs supply the eight capture slots; a PCM4104 quad DAC
//! consumes the four playback slots. The engine sees them through one
//! [`CodecControl`] collaborator, normally a [`FrontEnd`].
//!
//! # Feature gate
//!
//! The drivers are available when the `codecs` feature is enabled (on by
//! default). [`CodecControl`] and [`CodecError`] are always present so other
//! front ends can be plugged in.

#[cfg(feature = "codecs")]
mod adau1979;
#[cfg(feature = "codecs")]
mod pcm4104;

#[cfg(feature = "codecs")]
pub use adau1979::{registers, Adau1979Pair};
#[cfg(feature = "codecs")]
pub use pcm4104::{NoMuteLine, Pcm4104};

use embedded_hal::i2c;

/// Codec bring-up and control failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The control bus reported an error.
    #[error("control bus error: {0}")]
    Bus(i2c::ErrorKind),
    /// A device did not acknowledge its address.
    #[error("codec not responding")]
    NotResponding,
    /// The identification register held an unexpected value.
    #[error("unexpected device id {found:#04x} at address {address:#04x}")]
    WrongIdentity { address: u8, found: u8 },
    /// The codec PLL did not report lock in time.
    #[error("codec PLL did not lock")]
    ClockLockTimeout,
    /// The mute GPIO could not be driven.
    #[error("mute line error")]
    Gpio,
}

impl CodecError {
    /// Classify a bus error. A missing acknowledge means nobody answered.
    pub fn from_bus<E: i2c::Error>(err: E) -> Self {
        match err.kind() {
            i2c::ErrorKind::NoAcknowledge(_) => CodecError::NotResponding,
            kind => CodecError::Bus(kind),
        }
    }
}

/// What the engine needs from the codecs.
pub trait CodecControl {
    /// Check the devices are present and who they claim to be.
    fn init(&mut self) -> Result<(), CodecError>;

    /// Program the streaming configuration and wait for the clocks to lock.
    /// Runs on every `start`, after output has been muted.
    fn apply_default_config(&mut self) -> Result<(), CodecError>;

    /// Mute or unmute the analog output.
    fn set_mute(&mut self, mute: bool) -> Result<(), CodecError>;
}

impl<C: CodecControl + ?Sized> CodecControl for &mut C {
    fn init(&mut self) -> Result<(), CodecError> {
        (**self).init()
    }

    fn apply_default_config(&mut self) -> Result<(), CodecError> {
        (**self).apply_default_config()
    }

    fn set_mute(&mut self, mute: bool) -> Result<(), CodecError> {
        (**self).set_mute(mute)
    }
}

/// Capture converters plus playback converter, controlled as one.
///
/// `init` and `apply_default_config` run on both sides, ADC first; muting
/// acts on the DAC only, since that is what reaches the speakers.
#[derive(Debug)]
pub struct FrontEnd<A, D> {
    pub adc: A,
    pub dac: D,
}

impl<A: CodecControl, D: CodecControl> FrontEnd<A, D> {
    pub fn new(adc: A, dac: D) -> Self {
        FrontEnd { adc, dac }
    }

    /// Give the two drivers back.
    pub fn release(self) -> (A, D) {
        (self.adc, self.dac)
    }
}

impl<A: CodecControl, D: CodecControl> CodecControl for FrontEnd<A, D> {
    fn init(&mut self) -> Result<(), CodecError> {
        self.adc.init()?;
        self.dac.init()
    }

    fn apply_default_config(&mut self) -> Result<(), CodecError> {
        self.adc.apply_default_config()?;
        self.dac.apply_default_config()
    }

    fn set_mute(&mut self, mute: bool) -> Result<(), CodecError> {
        self.dac.set_mute(mute)
    }
}
