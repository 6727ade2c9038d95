//! Threaded audio engine: lifecycle state machine plus the block worker.
//!
//! ```text
//! Stopped ──init──► Ready ──start──► Running ──stop──► Ready
//!    ▲                │                 │
//!    │           codec/PLL/DMA failure  │ DMA error (IRQ)
//!    │                ▼                 ▼
//!    └──teardown── Fault ◄──────────────┘      (left only through init)
//! ```
//!
//! The worker is a named thread that sleeps on a capacity-1 channel. The DMA
//! interrupts post to it through an [`IrqHandle`]; redundant posts before the
//! worker wakes collapse into one. `stop` raises a shutdown flag and posts
//! once more so a worker blocked on the channel always returns promptly.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use flume::{Receiver, Sender};
use log::{debug, error, info, warn};

use crate::block::{CartridgeBlock, HalfIndex, InputBlock, OutputBlock};
use crate::cache::{CacheMaintenance, Coherent};
use crate::cartridge::{CartridgeLink, PullFn, PushFn};
use crate::codec::CodecControl;
use crate::dsp::MixRouter;
use crate::error::EngineError;
use crate::pipeline::{AudioCore, EngineStats, IrqOutcome};
use crate::processor::BlockProcessor;
use crate::transport::{Direction, DmaStatus, TdmConfig, TdmTransport, TransportError};

/// Name of the block worker thread.
pub const WORKER_THREAD_NAME: &str = "audio-process";

/// Lifecycle of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EngineState {
    Stopped = 0,
    /// Codecs identified, transport configured, not streaming.
    Ready = 1,
    Running = 2,
    /// Hardware failure. Only a fresh `init` leaves this state.
    Fault = 3,
}

impl EngineState {
    fn from_u8(raw: u8) -> EngineState {
        match raw {
            0 => EngineState::Stopped,
            1 => EngineState::Ready,
            2 => EngineState::Running,
            _ => EngineState::Fault,
        }
    }
}

struct Shared<K> {
    core: AudioCore<K>,
    state: AtomicU8,
    shutdown: AtomicBool,
    /// Pair-ready wake-ups posted from interrupt context.
    signals: AtomicU32,
}

impl<K> Shared<K> {
    fn state(&self) -> EngineState {
        EngineState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: EngineState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

/// Everything the worker owns while it runs.
struct Worker<P> {
    processor: P,
    cartridge: CartridgeLink,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicked worker leaves plain data behind; keep using it.
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Interrupt-side entry point, cloneable into each DMA handler.
pub struct IrqHandle<K = Coherent> {
    shared: Arc<Shared<K>>,
    wake: Sender<()>,
}

impl<K> Clone for IrqHandle<K> {
    fn clone(&self) -> Self {
        IrqHandle {
            shared: Arc::clone(&self.shared),
            wake: self.wake.clone(),
        }
    }
}

impl<K: CacheMaintenance> IrqHandle<K> {
    /// Forward one DMA interrupt. Wakes the worker when a pair becomes
    /// ready; moves the engine to [`EngineState::Fault`] on a DMA error.
    pub fn on_dma_event(&self, dir: Direction, status: DmaStatus) -> IrqOutcome {
        let outcome = self.shared.core.on_dma_event(dir, status);
        match outcome {
            IrqOutcome::PairReady(_) => {
                self.shared.signals.fetch_add(1, Ordering::Relaxed);
                // Full means a wake-up is already pending.
                let _ = self.wake.try_send(());
            }
            IrqOutcome::Fault(_) => {
                // Events are armed from inside `start`, before `Running`.
                let _ = self.shared.state.fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                    match EngineState::from_u8(raw) {
                        EngineState::Ready | EngineState::Running => Some(EngineState::Fault as u8),
                        _ => None,
                    }
                });
            }
            IrqOutcome::Idle => {}
        }
        outcome
    }

    pub fn state(&self) -> EngineState {
        self.shared.state()
    }
}

/// The audio engine context: one per device.
///
/// Generic over the transport `T`, the codec front end `C`, the cache
/// barriers `K` and the block processor `P` (the main/cue mixer by default).
///
/// # Example
///
/// ```ignore
/// let mut engine = AudioEngine::new(sai, FrontEnd::new(adcs, dac), CortexM7DCache);
/// let irq = engine.irq_handle();      // move into the DMA handlers
/// engine.init()?;
/// engine.start()?;
/// engine.set_master_volume(0.8);
/// ```
pub struct AudioEngine<T, C, K = Coherent, P = MixRouter>
where
    T: TdmTransport,
    C: CodecControl,
    K: CacheMaintenance + Send + Sync + 'static,
    P: BlockProcessor + Send + 'static,
{
    transport: T,
    codecs: C,
    config: TdmConfig,
    shared: Arc<Shared<K>>,
    worker: Arc<Mutex<Worker<P>>>,
    thread: Option<JoinHandle<()>>,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
    initialized: bool,
}

impl<T, C, K> AudioEngine<T, C, K, MixRouter>
where
    T: TdmTransport,
    C: CodecControl,
    K: CacheMaintenance + Send + Sync + 'static,
{
    /// An engine with the default main/cue mixer.
    pub fn new(transport: T, codecs: C, cache: K) -> Self {
        Self::with_processor(transport, codecs, cache, MixRouter::new())
    }
}

impl<T, C, K, P> AudioEngine<T, C, K, P>
where
    T: TdmTransport,
    C: CodecControl,
    K: CacheMaintenance + Send + Sync + 'static,
    P: BlockProcessor + Send + 'static,
{
    /// An engine running `processor` instead of the mixer.
    pub fn with_processor(transport: T, codecs: C, cache: K, processor: P) -> Self {
        let (wake_tx, wake_rx) = flume::bounded(1);
        AudioEngine {
            transport,
            codecs,
            config: TdmConfig::default(),
            shared: Arc::new(Shared {
                core: AudioCore::new(cache),
                state: AtomicU8::new(EngineState::Stopped as u8),
                shutdown: AtomicBool::new(false),
                signals: AtomicU32::new(0),
            }),
            worker: Arc::new(Mutex::new(Worker {
                processor,
                cartridge: CartridgeLink::new(),
            })),
            thread: None,
            wake_tx,
            wake_rx,
            initialized: false,
        }
    }

    /// Use `config` instead of the board default on the next `init`.
    pub fn with_tdm_config(mut self, config: TdmConfig) -> Self {
        self.config = config;
        self
    }

    pub fn irq_handle(&self) -> IrqHandle<K> {
        IrqHandle {
            shared: Arc::clone(&self.shared),
            wake: self.wake_tx.clone(),
        }
    }

    pub fn state(&self) -> EngineState {
        self.shared.state()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn core(&self) -> &AudioCore<K> {
        &self.shared.core
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn codecs(&self) -> &C {
        &self.codecs
    }

    fn fail(&mut self, err: EngineError) -> EngineError {
        error!("audio engine fault: {err}");
        self.shared.set_state(EngineState::Fault);
        err
    }

    fn mute(&mut self, mute: bool) {
        if let Err(err) = self.codecs.set_mute(mute) {
            warn!("output {} failed: {err}", if mute { "mute" } else { "unmute" });
        }
    }

    /// Identify the codecs, configure the transport, silence the buffers and
    /// restore the default mix. No-op once initialized, unless faulted.
    pub fn init(&mut self) -> Result<(), EngineError> {
        if self.initialized && self.state() != EngineState::Fault {
            return Ok(());
        }
        self.halt();

        if let Err(err) = self.codecs.init() {
            return Err(self.fail(err.into()));
        }
        if let Err(err) = self.transport.configure(&self.config) {
            return Err(self.fail(err.into()));
        }

        // SAFETY: `halt` stopped both DMA channels and joined the worker.
        unsafe { self.shared.core.reset_stream() };
        self.shared.core.control().reset();
        self.shared.core.clear_stats();
        lock(&self.worker).cartridge.clear();

        self.initialized = true;
        self.shared.set_state(EngineState::Ready);
        info!(
            "audio engine ready: {} Hz, {} in / {} out slots",
            self.config.sample_rate_hz, self.config.rx_slots, self.config.tx_slots
        );
        Ok(())
    }

    /// Bring the codecs up, arm both DMA channels, start the worker and
    /// unmute. A second call while running does nothing.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.state() == EngineState::Running {
            return Ok(());
        }
        if !self.initialized {
            if let Err(err) = self.init() {
                self.mute(true);
                return Err(err);
            }
        }
        if self.state() == EngineState::Fault {
            self.mute(true);
            return Err(EngineError::Faulted);
        }

        self.mute(true);
        if let Err(err) = self.codecs.apply_default_config() {
            return Err(self.fail(err.into()));
        }

        // SAFETY: not running, so both channels are stopped and no block is
        // in progress.
        unsafe { self.shared.core.reset_stream() };
        self.shared.core.set_streaming(true);
        let (rx, tx) = (self.shared.core.rx_region(), self.shared.core.tx_region());
        if let Err(err) = self.transport.start(rx, tx) {
            self.shared.core.set_streaming(false);
            self.transport.stop();
            return Err(self.fail(err.into()));
        }

        if self.thread.is_none() {
            if let Err(err) = self.spawn_worker() {
                self.shared.core.set_streaming(false);
                self.transport.stop();
                return Err(self.fail(err));
            }
        }

        if !self.transport.is_running() {
            self.halt();
            return Err(self.fail(TransportError::NotRunning.into()));
        }

        // A DMA error may already have hit while the transport came up.
        let promoted = self.shared.core.fault().is_none()
            && self
                .shared
                .state
                .compare_exchange(
                    EngineState::Ready as u8,
                    EngineState::Running as u8,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok();
        if !promoted {
            self.halt();
            let err = self.shared.core.fault().unwrap_or(TransportError::NotRunning);
            return Err(self.fail(err.into()));
        }
        self.mute(false);
        info!("audio engine running");
        Ok(())
    }

    fn spawn_worker(&mut self) -> Result<(), EngineError> {
        self.shared.shutdown.store(false, Ordering::Release);
        // Drop a wake-up left over from the previous run.
        while self.wake_rx.try_recv().is_ok() {}

        let shared = Arc::clone(&self.shared);
        let worker = Arc::clone(&self.worker);
        let wake = self.wake_rx.clone();
        let handle = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.into())
            .spawn(move || run_worker(shared, worker, wake))
            .map_err(|err| {
                error!("failed to spawn {WORKER_THREAD_NAME}: {err}");
                EngineError::Spawn
            })?;
        self.thread = Some(handle);
        Ok(())
    }

    /// Mute, stop the transport, release the worker and join it.
    /// Does nothing when nothing is streaming.
    fn halt(&mut self) {
        if self.thread.is_none() && !self.transport.is_running() {
            return;
        }
        self.mute(true);
        self.shared.core.set_streaming(false);
        self.transport.stop();

        if let Some(handle) = self.thread.take() {
            self.shared.shutdown.store(true, Ordering::Release);
            let _ = self.wake_tx.try_send(());
            if handle.join().is_err() {
                error!("{WORKER_THREAD_NAME} panicked");
            }
        }
    }

    /// Stop streaming: `Running` becomes `Ready`. In `Fault` the hardware is
    /// halted and the state stays `Fault`. Safe to call repeatedly.
    pub fn stop(&mut self) {
        let was = self.state();
        if was == EngineState::Stopped {
            return;
        }
        self.halt();
        if was == EngineState::Running {
            self.shared.set_state(EngineState::Ready);
            info!("audio engine stopped");
        }
    }

    /// Control-side housekeeping. Completes the halt after a DMA fault
    /// raised in interrupt context, or after the worker died; returns the
    /// current state.
    pub fn poll(&mut self) -> EngineState {
        let worker_gone = self.thread.as_ref().is_some_and(|t| t.is_finished());
        if worker_gone && self.state() != EngineState::Fault {
            self.fail(EngineError::WorkerExited);
        }
        let state = self.state();
        if state == EngineState::Fault && (self.thread.is_some() || self.transport.is_running()) {
            if let Some(err) = self.shared.core.fault() {
                error!("audio stream fault: {err}");
            }
            self.halt();
        }
        state
    }

    /// Halt everything and forget the initialization, back to `Stopped`.
    pub fn teardown(&mut self) {
        self.halt();
        self.initialized = false;
        self.shared.set_state(EngineState::Stopped);
        info!("audio engine torn down");
    }

    pub fn stats(&self) -> EngineStats {
        self.shared.core.stats()
    }

    /// Pair-ready wake-ups the interrupt handlers have posted to the worker
    /// since this engine was built.
    pub fn worker_signals(&self) -> u32 {
        self.shared.signals.load(Ordering::Relaxed)
    }

    pub fn set_master_volume(&self, volume: f32) {
        self.shared.core.control().set_master_volume(volume);
    }

    pub fn set_route(&self, track: usize, to_main: bool, to_cue: bool) {
        self.shared.core.control().set_route(track, to_main, to_cue);
    }

    pub fn set_route_gain(&self, track: usize, gain_main: f32, gain_cue: f32) {
        self.shared.core.control().set_route_gain(track, gain_main, gain_cue);
    }

    /// Copy of one captured half. May be torn while streaming.
    pub fn read_input(&self, half: HalfIndex) -> InputBlock {
        self.shared.core.read_input(half)
    }

    /// Copy of one playback half. May be torn while streaming.
    pub fn read_output(&self, half: HalfIndex) -> OutputBlock {
        self.shared.core.read_output(half)
    }

    fn idle_worker(&self) -> Result<MutexGuard<'_, Worker<P>>, EngineError> {
        if self.thread.is_some() {
            return Err(EngineError::Busy);
        }
        Ok(lock(&self.worker))
    }

    /// Install (or with `None`, remove) the cartridge pull callback.
    /// Only while the worker is not running.
    pub fn register_cartridge_pull(&mut self, pull: Option<PullFn>) -> Result<(), EngineError> {
        self.idle_worker()?.cartridge.set_pull(pull);
        Ok(())
    }

    /// Install (or with `None`, remove) the cartridge push callback.
    /// Only while the worker is not running.
    pub fn register_cartridge_push(&mut self, push: Option<PushFn>) -> Result<(), EngineError> {
        self.idle_worker()?.cartridge.set_push(push);
        Ok(())
    }

    /// Access the cartridge input and output blocks while not running.
    pub fn with_cartridges<R>(
        &self,
        f: impl FnOnce(&mut CartridgeBlock, &mut CartridgeBlock) -> R,
    ) -> Result<R, EngineError> {
        let mut worker = self.idle_worker()?;
        let link = &mut worker.cartridge;
        Ok(f(&mut link.input, &mut link.output))
    }

    /// Access the block processor while not running.
    pub fn with_block_processor<R>(&self, f: impl FnOnce(&mut P) -> R) -> Result<R, EngineError> {
        Ok(f(&mut self.idle_worker()?.processor))
    }
}

impl<T, C, K, P> Drop for AudioEngine<T, C, K, P>
where
    T: TdmTransport,
    C: CodecControl,
    K: CacheMaintenance + Send + Sync + 'static,
    P: BlockProcessor + Send + 'static,
{
    fn drop(&mut self) {
        self.halt();
    }
}

fn run_worker<K, P>(shared: Arc<Shared<K>>, worker: Arc<Mutex<Worker<P>>>, wake: Receiver<()>)
where
    K: CacheMaintenance,
    P: BlockProcessor,
{
    let mut guard = lock(&worker);
    let Worker { processor, cartridge } = &mut *guard;
    let core = &shared.core;
    let mut last = core.stats();
    debug!("{WORKER_THREAD_NAME} started");

    while wake.recv().is_ok() {
        if shared.shutdown.load(Ordering::Acquire) {
            break;
        }
        if let Some(half) = core.take_ready() {
            cartridge.run_block(core, half, processor);
        }

        let stats = core.stats();
        if stats.dropped_blocks != last.dropped_blocks {
            warn!(
                "RX/TX half mismatch, {} partial completions dropped",
                stats.dropped_blocks.wrapping_sub(last.dropped_blocks)
            );
        }
        if stats.overruns != last.overruns {
            warn!(
                "audio worker late, {} ready pairs overwritten",
                stats.overruns.wrapping_sub(last.overruns)
            );
        }
        last = stats;
    }
    debug!("{WORKER_THREAD_NAME} exiting");
}
