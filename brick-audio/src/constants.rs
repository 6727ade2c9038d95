/// Sample rate shared by every converter on the TDM bus, in Hz.
pub const AUDIO_SAMPLE_RATE_HZ: u32 = 48_000;

/// Frames per half-buffer. One half is processed per block.
pub const AUDIO_FRAMES_PER_BLOCK: usize = 16;

/// TDM input slots (two 4-channel ADCs).
pub const AUDIO_INPUT_CHANNELS: usize = 8;

/// TDM output slots (one 4-channel DAC).
pub const AUDIO_OUTPUT_CHANNELS: usize = 4;

/// Width of one TDM slot in bits. Samples live in a 32-bit container.
pub const AUDIO_SLOT_BITS: u32 = 32;

/// Significant bits per sample.
pub const AUDIO_SAMPLE_BITS: u32 = 24;

/// Largest positive 24-bit sample value.
pub const INT24_MAX: i32 = (1 << (AUDIO_SAMPLE_BITS - 1)) - 1;

/// [`INT24_MAX`] as a float, used for normalization.
pub const INT24_MAX_F: f32 = INT24_MAX as f32;

/// Logical stereo tracks on the input side (2 channels each).
pub const AUDIO_TRACKS: usize = AUDIO_INPUT_CHANNELS / 2;

/// Cartridges on the external audio link.
pub const CARTRIDGE_COUNT: usize = 4;

/// Channels carried per cartridge.
pub const CARTRIDGE_CHANNELS: usize = 4;

/// Cortex-M7 D-cache line size in bytes.
pub const CACHE_LINE_BYTES: usize = 32;

/// Upper bound on the codec PLL lock wait, in milliseconds.
pub const PLL_LOCK_TIMEOUT_MS: u32 = 20;
