//! Interrupt-facing half of the engine: buffers, synchronizer, per-block run.
//!
//! [`AudioCore`] holds everything the DMA interrupts and the block consumer
//! share. It has no thread and no allocation, so it works the same under the
//! threaded [`AudioEngine`](crate::engine::AudioEngine) and under a bare-metal
//! main loop that calls [`take_ready`](AudioCore::take_ready) itself.
//!
//! ## Block sequence
//!
//! ```text
//! RX/TX DMA IRQ ──on_dma_event──► HalfSync ──PairReady(h)──► consumer
//!                                                              │
//!   acquire(input h) ◄─────────────────────────────────────────┘
//!   cartridge pull (or silence)
//!   control snapshot
//!   processor.process_block(input h → output h)
//!   publish(output h)
//!   cartridge push
//! ```

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use crate::block::{CartridgeBlock, HalfIndex, InputBlock, InputBuffers, OutputBlock, OutputBuffers};
use crate::cache::{CacheMaintenance, Coherent};
use crate::constants::AUDIO_FRAMES_PER_BLOCK;
use crate::control::ControlPlane;
use crate::processor::BlockProcessor;
use crate::sync::HalfSync;
use crate::transport::{Direction, DmaRegion, DmaStatus, TransportError};

/// Cartridge pull hook as seen by a single block.
pub type PullHook<'a> = &'a mut dyn FnMut(&mut CartridgeBlock, usize);
/// Cartridge push hook as seen by a single block.
pub type PushHook<'a> = &'a mut dyn FnMut(&CartridgeBlock, usize);

const NO_FAULT: u8 = 0;
const RX_FAULT: u8 = 1;
const TX_FAULT: u8 = 2;

/// What a DMA interrupt changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqOutcome {
    /// Nothing for the consumer to do.
    Idle,
    /// Both directions finished this half; it may be processed now.
    PairReady(HalfIndex),
    /// The stream faulted. Latched until the next stream reset.
    Fault(TransportError),
}

/// Holds the single-consumer flag for the duration of one block. Dropping it
/// releases the flag, also when the processor unwinds.
struct Consuming<'a>(&'a AtomicBool);

impl<'a> Consuming<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::Acquire) {
            None
        } else {
            Some(Consuming(flag))
        }
    }
}

impl Drop for Consuming<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Diagnostic counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    /// Partial completions discarded because RX and TX disagreed on the half.
    pub dropped_blocks: u32,
    /// Ready pairs replaced before the consumer got to them.
    pub overruns: u32,
    /// Blocks run to completion.
    pub blocks_processed: u32,
}

/// Shared state between the DMA interrupts and the block consumer.
pub struct AudioCore<K = Coherent> {
    input: InputBuffers,
    output: OutputBuffers,
    sync: HalfSync,
    control: ControlPlane,
    cache: K,
    streaming: AtomicBool,
    fault: AtomicU8,
    consuming: AtomicBool,
    blocks: AtomicU32,
}

impl AudioCore<Coherent> {
    /// A core for coherent memory, usable in a `static`.
    pub const fn new_coherent() -> Self {
        Self::new(Coherent)
    }
}

impl<K: CacheMaintenance> AudioCore<K> {
    pub const fn new(cache: K) -> Self {
        AudioCore {
            input: InputBuffers::new(),
            output: OutputBuffers::new(),
            sync: HalfSync::new(),
            control: ControlPlane::new(),
            cache,
            streaming: AtomicBool::new(false),
            fault: AtomicU8::new(NO_FAULT),
            consuming: AtomicBool::new(false),
            blocks: AtomicU32::new(0),
        }
    }

    pub fn control(&self) -> &ControlPlane {
        &self.control
    }

    pub fn cache(&self) -> &K {
        &self.cache
    }

    /// Receive-side region to program into the RX DMA channel.
    pub fn rx_region(&self) -> DmaRegion {
        self.input.region()
    }

    /// Transmit-side region to program into the TX DMA channel.
    pub fn tx_region(&self) -> DmaRegion {
        self.output.region()
    }

    /// Forget partial completions, the fault latch and unconsumed pairs,
    /// silence both double buffers and flush the silence out to memory.
    ///
    /// # Safety
    ///
    /// Both DMA channels must be stopped and no block may be running.
    pub unsafe fn reset_stream(&self) {
        self.streaming.store(false, Ordering::Release);
        self.sync.reset();
        self.fault.store(NO_FAULT, Ordering::Release);
        self.consuming.store(false, Ordering::Release);
        unsafe {
            self.input.clear();
            self.output.clear();
        }
        for half in HalfIndex::ALL {
            let (addr, len) = self.output.half_span(half);
            self.cache.publish(addr, len);
        }
    }

    /// Start (or stop) accepting DMA events. Events arriving while disarmed
    /// are ignored.
    pub fn set_streaming(&self, on: bool) {
        self.streaming.store(on, Ordering::Release);
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::Acquire)
    }

    /// Feed one DMA interrupt. Call from the RX and TX stream handlers with
    /// the flags read (and cleared) from the controller.
    ///
    /// Lock-free and bounded; safe in interrupt context.
    pub fn on_dma_event(&self, dir: Direction, status: DmaStatus) -> IrqOutcome {
        if !self.is_streaming() {
            return IrqOutcome::Idle;
        }
        if let Some(err) = self.fault() {
            return IrqOutcome::Fault(err);
        }
        match status.decode(dir) {
            Ok(Some(half)) => match self.sync.mark(dir, half) {
                Some(ready) => IrqOutcome::PairReady(ready),
                None => IrqOutcome::Idle,
            },
            Ok(None) => IrqOutcome::Idle,
            Err(err) => {
                let code = match dir {
                    Direction::Rx => RX_FAULT,
                    Direction::Tx => TX_FAULT,
                };
                // First fault wins.
                let _ = self.fault.compare_exchange(
                    NO_FAULT,
                    code,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );
                self.streaming.store(false, Ordering::Release);
                IrqOutcome::Fault(self.fault().unwrap_or(err))
            }
        }
    }

    /// The latched transport fault, if any.
    pub fn fault(&self) -> Option<TransportError> {
        match self.fault.load(Ordering::Acquire) {
            RX_FAULT => Some(TransportError::Dma(Direction::Rx)),
            TX_FAULT => Some(TransportError::Dma(Direction::Tx)),
            _ => None,
        }
    }

    /// Consume the published pair, if any.
    pub fn take_ready(&self) -> Option<HalfIndex> {
        self.sync.take_ready()
    }

    pub fn has_ready(&self) -> bool {
        self.sync.has_ready()
    }

    /// Run one block over `half`.
    ///
    /// Returns `false` without touching anything if another consumer is in
    /// the middle of a block or the stream has faulted. `half` must come
    /// from [`take_ready`](Self::take_ready) (or a
    /// [`PairReady`](IrqOutcome::PairReady)) and the call must finish before
    /// DMA wraps back to it, one half-period later.
    pub fn run_block<P: BlockProcessor + ?Sized>(
        &self,
        half: HalfIndex,
        processor: &mut P,
        cart_in: &mut CartridgeBlock,
        cart_out: &mut CartridgeBlock,
        pull: Option<PullHook<'_>>,
        push: Option<PushHook<'_>>,
    ) -> bool {
        if self.fault().is_some() {
            return false;
        }
        let Some(_consuming) = Consuming::acquire(&self.consuming) else {
            return false;
        };

        let frames = AUDIO_FRAMES_PER_BLOCK;
        let (in_addr, in_len) = self.input.half_span(half);
        self.cache.acquire(in_addr, in_len);

        match pull {
            Some(pull) => pull(cart_in, frames),
            None => cart_in.clear(),
        }

        let ctrl = self.control.snapshot();

        // SAFETY: `half` was published by the synchronizer, so both DMA
        // channels are on the other half; the `consuming` flag keeps any
        // other software consumer out until we are done.
        let (adc_in, dac_out) = unsafe { (self.input.half(half), self.output.half_mut(half)) };
        processor.process_block(&ctrl, adc_in, cart_in, dac_out, cart_out, frames);

        let (out_addr, out_len) = self.output.half_span(half);
        self.cache.publish(out_addr, out_len);

        if let Some(push) = push {
            push(cart_out, frames);
        }

        self.blocks.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Take the published pair, if any, and run it.
    pub fn process_ready<P: BlockProcessor + ?Sized>(
        &self,
        processor: &mut P,
        cart_in: &mut CartridgeBlock,
        cart_out: &mut CartridgeBlock,
        pull: Option<PullHook<'_>>,
        push: Option<PushHook<'_>>,
    ) -> Option<HalfIndex> {
        let half = self.take_ready()?;
        self.run_block(half, processor, cart_in, cart_out, pull, push)
            .then_some(half)
    }

    /// Copy of one captured half. May be torn while streaming.
    pub fn read_input(&self, half: HalfIndex) -> InputBlock {
        self.input.read_half(half)
    }

    /// Copy of one playback half. May be torn while streaming.
    pub fn read_output(&self, half: HalfIndex) -> OutputBlock {
        self.output.read_half(half)
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            dropped_blocks: self.sync.dropped_blocks(),
            overruns: self.sync.overruns(),
            blocks_processed: self.blocks.load(Ordering::Relaxed),
        }
    }

    pub fn clear_stats(&self) {
        self.sync.clear_stats();
        self.blocks.store(0, Ordering::Relaxed);
    }
}

impl Default for AudioCore<Coherent> {
    fn default() -> Self {
        Self::new_coherent()
    }
}
