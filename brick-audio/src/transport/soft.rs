//! Software stand-in for the SAI + DMA pair, for host tests and bring-up.
//!
//! [`SoftTransport`] is handed to the engine like a real transport. The
//! matching [`SoftTransportProbe`] stays with the test: it plays the DMA
//! engine (writing captured samples into the half the receive channel owns,
//! reading the half the transmit channel sends) and records every call the
//! engine made.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::block::{HalfIndex, InputBlock, OutputBlock};

use super::{DmaRegion, TdmConfig, TdmTransport, TransportError};

#[derive(Debug, Default)]
struct SoftState {
    config: Option<TdmConfig>,
    regions: Option<(DmaRegion, DmaRegion)>,
    running: bool,
    configure_calls: usize,
    start_calls: usize,
    stop_calls: usize,
    fail_start: Option<TransportError>,
}

fn lock(state: &Mutex<SoftState>) -> MutexGuard<'_, SoftState> {
    // A panicking test thread must not hide the recorded calls.
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Loopback transport with no hardware behind it.
#[derive(Debug, Default)]
pub struct SoftTransport {
    state: Arc<Mutex<SoftState>>,
}

/// Test-side handle onto a [`SoftTransport`].
#[derive(Debug, Clone)]
pub struct SoftTransportProbe {
    state: Arc<Mutex<SoftState>>,
}

impl SoftTransport {
    pub fn new() -> (Self, SoftTransportProbe) {
        let state = Arc::new(Mutex::new(SoftState::default()));
        let probe = SoftTransportProbe {
            state: Arc::clone(&state),
        };
        (SoftTransport { state }, probe)
    }
}

impl TdmTransport for SoftTransport {
    fn configure(&mut self, config: &TdmConfig) -> Result<(), TransportError> {
        config.validate()?;
        let mut s = lock(&self.state);
        s.configure_calls += 1;
        s.config = Some(*config);
        Ok(())
    }

    fn start(&mut self, rx: DmaRegion, tx: DmaRegion) -> Result<(), TransportError> {
        let mut s = lock(&self.state);
        if s.config.is_none() {
            return Err(TransportError::NotConfigured);
        }
        if s.running {
            return Ok(());
        }
        if let Some(err) = s.fail_start.take() {
            return Err(err);
        }
        s.start_calls += 1;
        s.regions = Some((rx, tx));
        s.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        let mut s = lock(&self.state);
        if s.running {
            s.stop_calls += 1;
            s.running = false;
        }
    }

    fn is_running(&self) -> bool {
        lock(&self.state).running
    }
}

impl SoftTransportProbe {
    pub fn is_running(&self) -> bool {
        lock(&self.state).running
    }

    pub fn configure_calls(&self) -> usize {
        lock(&self.state).configure_calls
    }

    /// Number of times both channels were armed.
    pub fn start_calls(&self) -> usize {
        lock(&self.state).start_calls
    }

    /// Number of times a running transport was stopped.
    pub fn stop_calls(&self) -> usize {
        lock(&self.state).stop_calls
    }

    pub fn config(&self) -> Option<TdmConfig> {
        lock(&self.state).config
    }

    /// Make the next `start` fail with `err`.
    pub fn fail_next_start(&self, err: TransportError) {
        lock(&self.state).fail_start = Some(err);
    }

    /// Play the receive DMA: store `block` into `half` of the capture buffer.
    ///
    /// Returns `false` (and writes nothing) unless the transport is running.
    pub fn capture(&self, half: HalfIndex, block: &InputBlock) -> bool {
        let s = lock(&self.state);
        match (s.running, s.regions) {
            (true, Some((rx, _))) => {
                debug_assert_eq!(rx.half_words(), InputBlock::WORDS);
                // SAFETY: the region was handed over by `start` and points at
                // a live, aligned input double buffer; the receive channel
                // owns `half` until this event is reported.
                unsafe {
                    let base = rx.as_mut_ptr() as *mut InputBlock;
                    core::ptr::write_volatile(base.add(half.index()), *block);
                }
                true
            }
            _ => false,
        }
    }

    /// Play the transmit DMA: copy out `half` of the playback buffer.
    pub fn playback(&self, half: HalfIndex) -> Option<OutputBlock> {
        let s = lock(&self.state);
        let (_, tx) = s.regions?;
        debug_assert_eq!(tx.half_words(), OutputBlock::WORDS);
        // SAFETY: as for `capture`; a volatile copy tolerates concurrent
        // writes from the worker.
        unsafe {
            let base = tx.as_mut_ptr() as *const OutputBlock;
            Some(core::ptr::read_volatile(base.add(half.index())))
        }
    }
}
