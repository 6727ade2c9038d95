//! Default block processor: track routing into two stereo buses.
//!
//! Input slot pairs `(2t, 2t + 1)` form stereo track `t`. Each track feeds the
//! main and/or cue bus with its own gain; each bus is soft-clipped, scaled by
//! the master volume and soft-clipped again before it is written to the DAC
//! slots `[main L, main R, cue L, cue R]`.

use crate::block::{CartridgeBlock, InputBlock, OutputBlock};
use crate::constants::{AUDIO_FRAMES_PER_BLOCK, AUDIO_TRACKS};
use crate::control::ControlSnapshot;
use crate::processor::BlockProcessor;

use super::helpers::{soft_clip, to_fixed, to_float};

/// DAC slot of each bus channel.
pub const MAIN_L: usize = 0;
pub const MAIN_R: usize = 1;
pub const CUE_L: usize = 2;
pub const CUE_R: usize = 3;

/// Main/cue mixer. Stateless; all parameters come from the snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct MixRouter;

impl MixRouter {
    pub const fn new() -> Self {
        MixRouter
    }
}

#[derive(Default, Clone, Copy)]
struct Bus {
    left: f32,
    right: f32,
}

impl Bus {
    #[inline(always)]
    fn add(&mut self, left: f32, right: f32, gain: f32) {
        self.left += left * gain;
        self.right += right * gain;
    }

    #[inline(always)]
    fn finish(self, master: f32) -> (i32, i32) {
        let stage = |x: f32| to_fixed(soft_clip(soft_clip(x) * master));
        (stage(self.left), stage(self.right))
    }
}

impl BlockProcessor for MixRouter {
    fn process_block(
        &mut self,
        ctrl: &ControlSnapshot,
        adc_in: &InputBlock,
        _cart_in: &CartridgeBlock,
        dac_out: &mut OutputBlock,
        cart_out: &mut CartridgeBlock,
        frames: usize,
    ) {
        // Hand-built snapshots skip the plane's clamping; NaN fails `> 0.0`.
        let master = if ctrl.master_volume > 0.0 { ctrl.master_volume } else { 0.0 };
        let frames = frames.min(AUDIO_FRAMES_PER_BLOCK);

        for (input, output) in adc_in.iter().zip(dac_out.iter_mut()).take(frames) {
            let mut main = Bus::default();
            let mut cue = Bus::default();

            for (track, route) in ctrl.routes.iter().enumerate().take(AUDIO_TRACKS) {
                let left = to_float(input[2 * track]);
                let right = to_float(input[2 * track + 1]);
                if route.to_main {
                    main.add(left, right, route.gain_main);
                }
                if route.to_cue {
                    cue.add(left, right, route.gain_cue);
                }
            }

            (output[MAIN_L], output[MAIN_R]) = main.finish(master);
            (output[CUE_L], output[CUE_R]) = cue.finish(master);
        }

        cart_out.clear();
    }
}
