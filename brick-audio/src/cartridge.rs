//! External audio link to the cartridges.
//!
//! Once per block the worker pulls four channels from each cartridge before
//! processing and pushes the processed cartridge output afterwards. Either
//! side may be left unregistered: a missing pull reads as silence and a
//! missing push simply drops the output.

use crate::block::{CartridgeBlock, HalfIndex};
use crate::cache::CacheMaintenance;
use crate::pipeline::{AudioCore, PullHook, PushHook};
use crate::processor::BlockProcessor;

/// Fills the cartridge input block for the next `frames` frames.
pub type PullFn = Box<dyn FnMut(&mut CartridgeBlock, usize) + Send>;

/// Receives the cartridge output block after processing.
pub type PushFn = Box<dyn FnMut(&CartridgeBlock, usize) + Send>;

/// Cartridge callbacks plus the blocks exchanged through them.
#[derive(Default)]
pub struct CartridgeLink {
    pull: Option<PullFn>,
    push: Option<PushFn>,
    /// What the last pull produced (silence when no pull is registered).
    pub input: CartridgeBlock,
    /// What the processor produced for the cartridges in the last block.
    pub output: CartridgeBlock,
}

impl CartridgeLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the pull callback. `None` unregisters it.
    pub fn set_pull(&mut self, pull: Option<PullFn>) {
        self.pull = pull;
    }

    /// Replace the push callback. `None` unregisters it.
    pub fn set_push(&mut self, push: Option<PushFn>) {
        self.push = push;
    }

    pub fn has_pull(&self) -> bool {
        self.pull.is_some()
    }

    pub fn has_push(&self) -> bool {
        self.push.is_some()
    }

    /// Silence both blocks.
    pub fn clear(&mut self) {
        self.input.clear();
        self.output.clear();
    }

    /// Run one block of `core` through `processor` with this link attached.
    pub fn run_block<K, P>(&mut self, core: &AudioCore<K>, half: HalfIndex, processor: &mut P) -> bool
    where
        K: CacheMaintenance,
        P: BlockProcessor + ?Sized,
    {
        let pull = self.pull.as_mut().map(|f| &mut **f as PullHook<'_>);
        let push = self.push.as_mut().map(|f| &mut **f as PushHook<'_>);
        core.run_block(half, processor, &mut self.input, &mut self.output, pull, push)
    }
}

impl core::fmt::Debug for CartridgeLink {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CartridgeLink")
            .field("pull", &self.has_pull())
            .field("push", &self.has_push())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::AudioBlock;
    use crate::cache::Coherent;
    use crate::dsp::MixRouter;
    use crate::transport::{Direction, DmaStatus};
    use std::sync::{Arc, Mutex};

    fn ready_core() -> AudioCore<Coherent> {
        let core = AudioCore::new_coherent();
        unsafe { core.reset_stream() };
        core.set_streaming(true);
        core.on_dma_event(Direction::Rx, DmaStatus::HALF_TRANSFER);
        core.on_dma_event(Direction::Tx, DmaStatus::HALF_TRANSFER);
        core
    }

    #[test]
    fn unregistered_link_reads_silence() {
        let core = ready_core();
        let mut link = CartridgeLink::new();
        link.input = CartridgeBlock { cartridges: [AudioBlock::splat(1); 4] };
        let half = core.take_ready().unwrap();
        assert!(link.run_block(&core, half, &mut MixRouter));
        assert_eq!(link.input, CartridgeBlock::zeroed());
    }

    #[test]
    fn registered_callbacks_see_every_block() {
        let core = ready_core();
        let pushed = Arc::new(Mutex::new(Vec::new()));

        let mut link = CartridgeLink::new();
        link.set_pull(Some(Box::new(|block: &mut CartridgeBlock, frames: usize| {
            block.cartridges[0] = AudioBlock::splat(frames as i32);
        })));
        let sink = Arc::clone(&pushed);
        link.set_push(Some(Box::new(move |block: &CartridgeBlock, frames: usize| {
            sink.lock().unwrap().push((*block, frames));
        })));

        let half = core.take_ready().unwrap();
        assert!(link.run_block(&core, half, &mut MixRouter));
        assert_eq!(link.input.cartridges[0], AudioBlock::splat(16));

        let pushed = pushed.lock().unwrap();
        assert_eq!(pushed.len(), 1);
        // The mixer leaves the cartridge output silent.
        assert_eq!(pushed[0], (CartridgeBlock::zeroed(), 16));
    }

    #[test]
    fn unregistering_restores_silence() {
        let mut link = CartridgeLink::new();
        link.set_pull(Some(Box::new(|_: &mut CartridgeBlock, _: usize| {})));
        assert!(link.has_pull());
        link.set_pull(None);
        assert!(!link.has_pull());
        assert!(!link.has_push());
    }
}
