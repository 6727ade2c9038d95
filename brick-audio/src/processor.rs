use crate::block::{CartridgeBlock, InputBlock, OutputBlock};
use crate::control::ControlSnapshot;

/// Strategy that turns one block of input into one block of output.
///
/// The worker calls [`process_block`](Self::process_block) once per ready
/// half-buffer pair. The default implementation is
/// [`MixRouter`](crate::dsp::MixRouter); alternates such as
/// [`TestTone`](crate::dsp::TestTone) are chosen when the engine is built.
pub trait BlockProcessor {
    /// Process one block.
    ///
    /// `adc_in` and `cart_in` are the captured input and the cartridge audio
    /// pulled for this block. `dac_out` is the transmit half that DMA sends
    /// next; `cart_out` is handed to the cartridge push callback afterwards.
    /// `frames` is the number of valid frames, at most
    /// [`AUDIO_FRAMES_PER_BLOCK`](crate::constants::AUDIO_FRAMES_PER_BLOCK).
    ///
    /// Runs on the audio worker at block rate: must not block or allocate.
    fn process_block(
        &mut self,
        ctrl: &ControlSnapshot,
        adc_in: &InputBlock,
        cart_in: &CartridgeBlock,
        dac_out: &mut OutputBlock,
        cart_out: &mut CartridgeBlock,
        frames: usize,
    );
}

impl<P: BlockProcessor + ?Sized> BlockProcessor for &mut P {
    fn process_block(
        &mut self,
        ctrl: &ControlSnapshot,
        adc_in: &InputBlock,
        cart_in: &CartridgeBlock,
        dac_out: &mut OutputBlock,
        cart_out: &mut CartridgeBlock,
        frames: usize,
    ) {
        (**self).process_block(ctrl, adc_in, cart_in, dac_out, cart_out, frames)
    }
}

#[cfg(feature = "std")]
impl<P: BlockProcessor + ?Sized> BlockProcessor for std::boxed::Box<P> {
    fn process_block(
        &mut self,
        ctrl: &ControlSnapshot,
        adc_in: &InputBlock,
        cart_in: &CartridgeBlock,
        dac_out: &mut OutputBlock,
        cart_out: &mut CartridgeBlock,
        frames: usize,
    ) {
        (**self).process_block(ctrl, adc_in, cart_in, dac_out, cart_out, frames)
    }
}
