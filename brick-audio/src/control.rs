//! Mix configuration shared between control code and the audio worker.
//!
//! Writers (UI, MIDI, automation) may call the setters at any time and from
//! any context. The worker copies the whole [`ControlState`] once per block
//! with [`ControlPlane::snapshot`] and never looks at the live state again
//! during that block, so it can never observe a half-applied update.
//!
//! The lock is a `critical_section::Mutex`: every update is a handful of
//! stores, so the section is short and bounded.

use core::cell::RefCell;

use critical_section::Mutex;

use crate::constants::AUDIO_TRACKS;

/// Routing of one stereo input track to the two output buses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteConfig {
    /// Gain into the main bus, `0.0..=1.0`.
    pub gain_main: f32,
    /// Gain into the cue bus, `0.0..=1.0`.
    pub gain_cue: f32,
    pub to_main: bool,
    pub to_cue: bool,
}

impl RouteConfig {
    /// Main bus at unity, cue off.
    pub const DEFAULT: RouteConfig = RouteConfig {
        gain_main: 1.0,
        gain_cue: 1.0,
        to_main: true,
        to_cue: false,
    };

    /// Track contributes to neither bus.
    pub const MUTED: RouteConfig = RouteConfig {
        gain_main: 0.0,
        gain_cue: 0.0,
        to_main: false,
        to_cue: false,
    };
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Complete mix configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlState {
    /// Post-mix gain, `>= 0.0`, unbounded above.
    pub master_volume: f32,
    pub routes: [RouteConfig; AUDIO_TRACKS],
}

impl ControlState {
    /// Unity master, every track to main only.
    pub const DEFAULT: ControlState = ControlState {
        master_volume: 1.0,
        routes: [RouteConfig::DEFAULT; AUDIO_TRACKS],
    };
}

impl Default for ControlState {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Per-block copy of [`ControlState`] handed to block processors.
pub type ControlSnapshot = ControlState;

fn clamp_unit(v: f32) -> f32 {
    // NaN fails both comparisons below; treat it as silence.
    if v.is_nan() || v < 0.0 {
        0.0
    } else if v > 1.0 {
        1.0
    } else {
        v
    }
}

fn clamp_volume(v: f32) -> f32 {
    if v.is_nan() || v < 0.0 {
        0.0
    } else {
        v
    }
}

/// Lock-protected owner of the live [`ControlState`].
pub struct ControlPlane {
    state: Mutex<RefCell<ControlState>>,
}

impl ControlPlane {
    /// A plane holding [`ControlState::DEFAULT`].
    pub const fn new() -> Self {
        ControlPlane {
            state: Mutex::new(RefCell::new(ControlState::DEFAULT)),
        }
    }

    fn update<F: FnOnce(&mut ControlState)>(&self, f: F) {
        critical_section::with(|cs| f(&mut self.state.borrow_ref_mut(cs)));
    }

    /// Set the master volume. Negative values (and NaN) become `0.0`.
    pub fn set_master_volume(&self, volume: f32) {
        let volume = clamp_volume(volume);
        self.update(|s| s.master_volume = volume);
    }

    /// Choose which buses `track` feeds. Out-of-range tracks are ignored.
    pub fn set_route(&self, track: usize, to_main: bool, to_cue: bool) {
        if track >= AUDIO_TRACKS {
            return;
        }
        self.update(|s| {
            s.routes[track].to_main = to_main;
            s.routes[track].to_cue = to_cue;
        });
    }

    /// Set both bus gains of `track`, each clamped to `0.0..=1.0`.
    /// Out-of-range tracks are ignored.
    pub fn set_route_gain(&self, track: usize, gain_main: f32, gain_cue: f32) {
        if track >= AUDIO_TRACKS {
            return;
        }
        let (gain_main, gain_cue) = (clamp_unit(gain_main), clamp_unit(gain_cue));
        self.update(|s| {
            s.routes[track].gain_main = gain_main;
            s.routes[track].gain_cue = gain_cue;
        });
    }

    /// Restore [`ControlState::DEFAULT`].
    pub fn reset(&self) {
        self.update(|s| *s = ControlState::DEFAULT);
    }

    /// Copy the whole state out under the lock.
    pub fn snapshot(&self) -> ControlSnapshot {
        critical_section::with(|cs| *self.state.borrow_ref(cs))
    }
}

impl Default for ControlPlane {
    fn default() -> Self {
        Self::new()
    }
}
