//! # brick-audio
//!
//! Real-time audio engine for the Brick instrument: eight TDM capture slots
//! from a pair of ADAU1979 ADCs are mixed into a stereo main bus and a
//! stereo cue bus and played through a PCM4104 DAC, 16 frames at a time at
//! 48 kHz.
//!
//! Both serial directions run circular DMA over ping-pong buffers. Each
//! half-completion interrupt marks its half done; once RX and TX agree on the
//! same half the block worker is woken to process it while DMA works on the
//! other one.
//!
//! ## Architecture
//!
//! | Layer | Module | Purpose |
//! |-------|--------|---------|
//! | Memory | [`block`] / [`cache`] | DMA double buffers, cache barriers |
//! | Sync | [`sync`] | Lock-free RX/TX half-completion handshake |
//! | Control | [`control`] | Mix parameters with per-block snapshots |
//! | Transport | [`transport`] | TDM framing config, DMA status decoding |
//! | Codec | [`codec`] | ADAU1979 / PCM4104 drivers (feature-gated) |
//! | DSP | [`dsp`] / [`processor`] | Mixer, soft clip, test tone |
//! | Block | [`pipeline`] | One block: acquire, process, publish |
//! | Runtime | `engine` / `cartridge` | Worker thread and lifecycle (`std`) |
//!
//! ## Quick start
//!
//! ```ignore
//! use brick_audio::{AudioEngine, FrontEnd, Adau1979Pair, Pcm4104};
//!
//! let codecs = FrontEnd::new(Adau1979Pair::new(i2c, delay), Pcm4104::new(mute_pin)?);
//! let mut engine = AudioEngine::new(sai, codecs, CortexM7DCache);
//! let irq = engine.irq_handle();
//!
//! engine.start()?;
//! engine.set_route(1, true, true);
//! engine.set_master_volume(0.8);
//!
//! // In the DMA stream interrupts:
//! irq.on_dma_event(Direction::Rx, status);
//! ```
//!
//! ## Features
//!
//! | Feature | Default | Enables |
//! |---------|---------|---------|
//! | `std` | yes | Worker thread, [`AudioEngine`], software transport |
//! | `codecs` | yes | ADAU1979 and PCM4104 drivers |
//! | `cortex-m7` | no | D-cache maintenance via `cortex-m` |
//!
//! ## Audio parameters
//!
//! - **Block size:** 16 frames ([`constants::AUDIO_FRAMES_PER_BLOCK`])
//! - **Sample rate:** 48 kHz ([`constants::AUDIO_SAMPLE_RATE_HZ`])
//! - **Sample format:** signed 24-bit in 32-bit slots

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod constants;
pub mod block;
pub mod cache;
pub mod sync;
pub mod control;
pub mod transport;
pub mod codec;
pub mod dsp;
pub mod processor;
pub mod pipeline;
pub mod error;

#[cfg(feature = "std")]
pub mod cartridge;

#[cfg(feature = "std")]
pub mod engine;


pub use block::{CartridgeBlock, HalfIndex, InputBlock, OutputBlock};
pub use cache::{CacheMaintenance, Coherent};
#[cfg(feature = "cortex-m7")]
pub use cache::CortexM7DCache;
pub use codec::{CodecControl, CodecError, FrontEnd};
#[cfg(feature = "codecs")]
pub use codec::{Adau1979Pair, Pcm4104};
pub use control::{ControlPlane, ControlSnapshot, RouteConfig};
pub use dsp::{MixRouter, TestTone};
pub use error::EngineError;
pub use pipeline::{AudioCore, EngineStats, IrqOutcome};
pub use processor::BlockProcessor;
pub use transport::{Direction, DmaStatus, TdmConfig, TdmTransport, TransportError};

#[cfg(feature = "std")]
pub use engine::{AudioEngine, EngineState, IrqHandle};
