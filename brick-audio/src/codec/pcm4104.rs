//! PCM4104 quad DAC in hardware (pin-strapped) mode.
//!
//! The converter has no control port. The only thing software can do is
//! drive its optional mute line, which is active low. Boards without the line
//! use [`NoMuteLine`]: muting is then left to the engine's master volume.

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin};

use super::{CodecControl, CodecError};

/// Placeholder pin for boards with no mute line wired.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMuteLine;

impl ErrorType for NoMuteLine {
    type Error = Infallible;
}

impl OutputPin for NoMuteLine {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// PCM4104 DAC with an optional active-low mute line.
#[derive(Debug)]
pub struct Pcm4104<P> {
    mute_line: P,
    muted: bool,
}

impl Pcm4104<NoMuteLine> {
    /// A DAC whose mute is handled purely in software.
    pub fn without_mute_line() -> Self {
        Pcm4104 {
            mute_line: NoMuteLine,
            muted: true,
        }
    }
}

impl<P: OutputPin> Pcm4104<P> {
    /// Take the mute line and assert mute right away, so nothing plays
    /// before the engine is streaming.
    pub fn new(mut mute_line: P) -> Result<Self, CodecError> {
        mute_line.set_low().map_err(|_| CodecError::Gpio)?;
        Ok(Pcm4104 { mute_line, muted: true })
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn release(self) -> P {
        self.mute_line
    }
}

impl<P: OutputPin> CodecControl for Pcm4104<P> {
    /// Re-assert mute: the boot state of the DAC.
    fn init(&mut self) -> Result<(), CodecError> {
        self.set_mute(true)
    }

    fn apply_default_config(&mut self) -> Result<(), CodecError> {
        Ok(())
    }

    fn set_mute(&mut self, mute: bool) -> Result<(), CodecError> {
        let level = if mute {
            self.mute_line.set_low()
        } else {
            self.mute_line.set_high()
        };
        level.map_err(|_| CodecError::Gpio)?;
        self.muted = mute;
        Ok(())
    }
}
