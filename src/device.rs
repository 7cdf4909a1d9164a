//! Backlight device abstraction and percent/level conversion.

use std::time::Duration;

use log::{error, info};

use crate::errors::BacklightError;

/// Named ramp durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Instant,
    Fast,
    Slow,
}

pub const FAST_TRANSITION: Duration = Duration::from_millis(200);
pub const SLOW_TRANSITION: Duration = Duration::from_millis(2000);

impl Transition {
    pub fn duration(self) -> Duration {
        match self {
            Transition::Instant => Duration::ZERO,
            Transition::Fast => FAST_TRANSITION,
            Transition::Slow => SLOW_TRANSITION,
        }
    }
}

/// Range and level of a present device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BacklightDeviceState {
    pub max_level: u64,
    pub current_level: u64,
}

/// Hardware backlight.
pub trait Backlight {
    /// Current state, or `None` if no device is present.
    fn probe(&self) -> Option<BacklightDeviceState>;
    /// Move to `level` over `transition`. Must supersede any transition that
    /// is still in flight.
    fn set_level(&mut self, level: u64, transition: Duration) -> Result<(), BacklightError>;
    fn transition_in_progress(&self) -> bool;
}

pub fn percent_to_level(percent: f64, max_level: u64) -> Option<u64> {
    if max_level == 0 {
        return None;
    }
    let percent = percent.clamp(0.0, 100.0);
    Some((max_level as f64 * percent / 100.0).round() as u64)
}

pub fn level_to_percent(level: u64, max_level: u64) -> Option<f64> {
    if max_level == 0 {
        return None;
    }
    Some(level.min(max_level) as f64 * 100.0 / max_level as f64)
}

/// Owns the backlight and the last known state of it.
#[derive(Debug)]
pub struct DeviceAdapter<B> {
    backlight: B,
    state: Option<BacklightDeviceState>,
    /// Set after a hot-swap: the new device's level isn't what we asked for.
    stale: bool,
    last_percent: Option<f64>,
}

impl<B: Backlight> DeviceAdapter<B> {
    pub fn new(backlight: B) -> Self {
        let state = backlight.probe();
        match state {
            Some(state) => info!(
                "Backlight has range [0, {}] with initial level {}",
                state.max_level, state.current_level
            ),
            None => info!("No backlight device present"),
        }
        Self {
            backlight,
            state,
            stale: false,
            last_percent: None,
        }
    }

    pub fn backlight(&self) -> &B {
        &self.backlight
    }

    pub fn backlight_mut(&mut self) -> &mut B {
        &mut self.backlight
    }

    pub fn state(&self) -> Option<BacklightDeviceState> {
        self.state
    }

    pub fn is_present(&self) -> bool {
        self.state.is_some_and(|s| s.max_level > 0)
    }

    /// Percent the engine last asked for, whether or not it reached hardware.
    pub fn last_percent(&self) -> Option<f64> {
        self.last_percent
    }

    pub fn current_percent(&self) -> Option<f64> {
        self.state
            .and_then(|s| level_to_percent(s.current_level, s.max_level))
    }

    /// Swap in a new device, or record that it went away.
    pub fn replace(&mut self, state: Option<BacklightDeviceState>) {
        match state {
            Some(s) => info!(
                "Backlight device changed: range [0, {}], level {}",
                s.max_level, s.current_level
            ),
            None => info!("Backlight device disappeared"),
        }
        self.state = state;
        self.stale = state.is_some();
    }

    /// The hardware moved by itself.
    pub fn adopt_level(&mut self, level: u64) {
        if let Some(state) = self.state.as_mut() {
            state.current_level = level.min(state.max_level);
        }
    }

    /// Quantize and write `percent`. Returns whether the hardware was written.
    pub fn apply(&mut self, percent: f64, transition: Transition) -> bool {
        self.last_percent = Some(percent);
        let Some(state) = self.state.as_mut() else {
            return false;
        };
        let Some(level) = percent_to_level(percent, state.max_level) else {
            return false;
        };
        if level == state.current_level && !self.stale && !self.backlight.transition_in_progress()
        {
            return false;
        }

        let interval = transition.duration();
        info!(
            "Setting brightness to {level} ({percent}%) over {} ms",
            interval.as_millis()
        );
        if let Err(err) = self.backlight.set_level(level, interval) {
            error!("Failed to set brightness: {err}");
            return false;
        }
        state.current_level = level;
        self.stale = false;
        true
    }
}
