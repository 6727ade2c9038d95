//! Sine test tone on every DAC slot.
//!
//! Ignores the ADC input and the mix configuration, which makes it useful for
//! checking the transmit path and the DAC on their own.

use core::f32::consts::TAU;

use crate::block::{CartridgeBlock, InputBlock, OutputBlock};
use crate::constants::{AUDIO_FRAMES_PER_BLOCK, AUDIO_SAMPLE_RATE_HZ};
use crate::control::ControlSnapshot;
use crate::processor::BlockProcessor;

use super::helpers::to_fixed;

/// Phase-continuous sine oscillator.
///
/// # Example
/// ```ignore
/// let tone = TestTone::new(1_000.0, 0.25);
/// let engine = AudioEngine::with_processor(transport, codecs, Coherent, tone);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TestTone {
    /// Current phase in cycles, `0.0..1.0`.
    phase: f32,
    /// Phase advance per frame, in cycles.
    increment: f32,
    amplitude: f32,
}

impl TestTone {
    /// A tone at `hz` with peak `amplitude` (clamped to `0.0..=1.0`).
    pub fn new(hz: f32, amplitude: f32) -> Self {
        let mut tone = TestTone {
            phase: 0.0,
            increment: 0.0,
            amplitude: 0.0,
        };
        tone.frequency(hz);
        tone.amplitude(amplitude);
        tone
    }

    /// Set the frequency in Hz. Negative values are treated as 0.
    pub fn frequency(&mut self, hz: f32) {
        let hz = if hz > 0.0 { hz } else { 0.0 };
        self.increment = libm::fmodf(hz / AUDIO_SAMPLE_RATE_HZ as f32, 1.0);
    }

    /// Set the peak amplitude, `0.0` = silent, `1.0` = full scale.
    pub fn amplitude(&mut self, level: f32) {
        self.amplitude = if level > 1.0 {
            1.0
        } else if level > 0.0 {
            level
        } else {
            0.0
        };
    }
}

impl BlockProcessor for TestTone {
    fn process_block(
        &mut self,
        _ctrl: &ControlSnapshot,
        _adc_in: &InputBlock,
        _cart_in: &CartridgeBlock,
        dac_out: &mut OutputBlock,
        cart_out: &mut CartridgeBlock,
        frames: usize,
    ) {
        let frames = frames.min(AUDIO_FRAMES_PER_BLOCK);
        for frame in dac_out.iter_mut().take(frames) {
            let sample = to_fixed(self.amplitude * libm::sinf(TAU * self.phase));
            frame.fill(sample);

            self.phase += self.increment;
            if self.phase >= 1.0 {
                self.phase -= 1.0;
            }
        }
        cart_out.clear();
    }
}
