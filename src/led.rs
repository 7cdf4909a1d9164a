//! Abstraction for LED in /sys

use std::{
    fs::OpenOptions,
    io::{Read, Write},
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use snafu::prelude::*;

use kbd_backlight_arbiter::{
    device::{Backlight, BacklightDeviceState},
    errors::{BacklightError, GenericIoSnafu, IoOpeningFileSnafu, LevelParseSnafu},
};

const BRIGHTNESS: &str = "brightness";
const MAX_BRIGHTNESS: &str = "max_brightness";
const BRIGHTNESS_HW_CHANGED: &str = "brightness_hw_changed";

/// Time between intermediate writes of a ramp.
const RAMP_TICK: Duration = Duration::from_millis(25);

/// Helper to read an integer from a path.
pub(crate) fn read_int(p: &Path) -> Result<u64, BacklightError> {
    let mut f = OpenOptions::new()
        .read(true)
        .open(p)
        .context(IoOpeningFileSnafu { path: p.display().to_string() })?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)
        .context(GenericIoSnafu { path: p.display().to_string() })?;
    buf.trim_end_matches('\n')
        .trim()
        .parse()
        .context(LevelParseSnafu { path: p.display().to_string() })
}

/// A transition in progress.
#[derive(Debug, Clone, Copy)]
struct Ramp {
    from: u64,
    to: u64,
    start: Instant,
    duration: Duration,
}

impl Ramp {
    fn level_at(&self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.start);
        if elapsed >= self.duration {
            return self.to;
        }
        let frac = elapsed.as_secs_f64() / self.duration.as_secs_f64();
        let (from, to) = (self.from as f64, self.to as f64);
        (from + (to - from) * frac).round() as u64
    }

    fn done(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.start) >= self.duration
    }
}

#[derive(Debug)]
pub(crate) struct Led {
    /// Path to LED
    path: PathBuf,
    /// Last level written.
    written: Option<u64>,
    ramp: Option<Ramp>,
}

impl Led {
    /// Create a new LED wrapper.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            written: None,
            ramp: None,
        }
    }

    /// Get the current brightness
    pub fn brightness(&self) -> Result<u64, BacklightError> {
        read_int(&self.path.join(BRIGHTNESS))
    }

    /// Get the max brightness supported
    pub fn max_brightness(&self) -> Result<u64, BacklightError> {
        read_int(&self.path.join(MAX_BRIGHTNESS))
    }

    fn write_brightness(&mut self, brightness: u64) -> Result<(), BacklightError> {
        let p = self.path.join(BRIGHTNESS);
        let path = p.display().to_string();
        let mut f = OpenOptions::new()
            .write(true)
            .open(&p)
            .context(IoOpeningFileSnafu { path: path.clone() })?;
        write!(f, "{brightness}").context(GenericIoSnafu { path })?;
        self.written = Some(brightness);
        Ok(())
    }

    /// Get the path to monitor for HW changes. Not all LEDs support this.
    pub fn hw_monitor_path(&self) -> Option<PathBuf> {
        let p = self.path.join(BRIGHTNESS_HW_CHANGED);
        p.try_exists().unwrap_or(false).then_some(p)
    }

    /// Forget what was written, e.g. after the device was replaced.
    pub fn reset(&mut self) {
        self.written = None;
        self.ramp = None;
    }

    /// Advance the ramp. Returns when it wants to be called again.
    pub fn tick(&mut self, now: Instant) -> Result<Option<Instant>, BacklightError> {
        let Some(ramp) = self.ramp else {
            return Ok(None);
        };
        let level = ramp.level_at(now);
        if self.written != Some(level) {
            self.write_brightness(level)?;
        }
        if ramp.done(now) {
            self.ramp = None;
            Ok(None)
        } else {
            Ok(Some(now + RAMP_TICK))
        }
    }
}

impl Backlight for Led {
    fn probe(&self) -> Option<BacklightDeviceState> {
        let max_level = self.max_brightness().ok()?;
        let current_level = self.brightness().ok()?;
        Some(BacklightDeviceState {
            max_level,
            current_level,
        })
    }

    fn set_level(&mut self, level: u64, transition: Duration) -> Result<(), BacklightError> {
        // Start from wherever the previous ramp got to.
        let from = match self.written {
            Some(written) => written,
            None => self.brightness()?,
        };
        self.ramp = None;
        if transition.is_zero() || from == level {
            return self.write_brightness(level);
        }
        self.ramp = Some(Ramp {
            from,
            to: level,
            start: Instant::now(),
            duration: transition,
        });
        Ok(())
    }

    fn transition_in_progress(&self) -> bool {
        self.ramp.is_some()
    }
}
