//! Error types shared across the engine.
//!
//! Codec and transport failures are fatal to the start attempt that hit them.
//! The engine never retries: streaming corrupted audio is worse than silence.

use crate::codec::CodecError;
use crate::transport::TransportError;

/// Errors reported by [`AudioEngine`](crate::engine::AudioEngine) operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// A codec did not respond or reported the wrong identity.
    #[error("codec bring-up failed: {0}")]
    HardwareInit(CodecError),
    /// The codec PLL never locked within the allowed time.
    #[error("codec clock did not lock in time")]
    ClockLockTimeout,
    /// The serial/DMA transport refused to start or faulted.
    #[error("transport failure: {0}")]
    Transport(TransportError),
    /// The engine is latched in `Fault`; a fresh `init` is required.
    #[error("engine is faulted")]
    Faulted,
    /// The operation needs the worker to be stopped.
    #[error("engine is running")]
    Busy,
    /// The worker thread could not be created.
    #[error("failed to spawn the audio worker")]
    Spawn,
    /// The worker thread ended while the engine was streaming.
    #[error("audio worker exited unexpectedly")]
    WorkerExited,
}

impl From<CodecError> for EngineError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::ClockLockTimeout => EngineError::ClockLockTimeout,
            other => EngineError::HardwareInit(other),
        }
    }
}

impl From<TransportError> for EngineError {
    fn from(err: TransportError) -> Self {
        EngineError::Transport(err)
    }
}
