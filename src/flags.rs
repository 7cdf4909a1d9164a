//! Command line parsing
use std::{path::PathBuf, time::Duration};

use anyhow::Context;

use kbd_backlight_arbiter::{
    config::Prefs,
    steps::{AmbientStepTable, UserStepTable},
};

#[derive(Debug, clap::Parser)]
#[command(version, about, long_about = None)]
/// Keyboard backlight daemon. Picks brightness from ambient light, user
/// requests and laptop state.
pub struct Cli {
    /// Paths to evdev devices to monitor. Use /dev/input/by-id or
    /// /dev/input/by-path.
    #[clap(short = 'i', long)]
    pub monitor_input: Vec<PathBuf>,
    /// Path for LED to control.
    #[clap(short, long = "led")]
    pub led_base_dir: Option<PathBuf>,
    /// Display backlight directory (in /sys/class/backlight) to follow. When
    /// the display is off, so is the keyboard.
    #[clap(long = "display")]
    pub display_dir: Option<PathBuf>,
    /// IIO illuminance file, e.g.
    /// /sys/bus/iio/devices/iio:device0/in_illuminance_input
    #[clap(long = "als")]
    pub als_path: Option<PathBuf>,
    /// Milliseconds between ambient light (and display backlight) polls.
    #[clap(long, default_value_t = 1000)]
    pub als_interval: u32,
    /// Weight of a new lux reading in the running average, in (0, 1].
    #[clap(long, default_value_t = 0.5)]
    pub als_smoothing: f64,
    /// User brightness steps in percent, separated by commas.
    #[clap(long)]
    pub user_steps: Option<String>,
    /// Ambient light steps: "<percent> <lower lux> <upper lux>" separated by
    /// semicolons. -1 means unbounded.
    #[clap(long)]
    pub als_steps: Option<String>,
    /// Brightness in percent when there is no ambient light sensor.
    #[clap(long = "no-als-brightness")]
    pub no_als_percent: Option<f64>,
    /// Turn on while a hand hovers over the keyboard.
    #[clap(long)]
    pub detect_hover: bool,
    /// Only light up for a while after user activity.
    #[clap(long)]
    pub turn_on_for_user_activity: bool,
    /// Milliseconds to stay on after hover or activity ends.
    #[clap(long, default_value_t = 30000)]
    pub keep_on: u32,
    /// Same as --keep-on, while fullscreen video is playing.
    #[clap(long, default_value_t = 3000)]
    pub keep_on_during_video: u32,
    /// Milliseconds without input before dimming.
    #[clap(long)]
    pub dim_timeout: Option<u32>,
    /// Milliseconds without input before turning off.
    #[clap(short, long)]
    pub timeout: Option<u32>,
    /// Enable extra verbosity!
    #[clap(short, long)]
    pub verbose: bool,
    /// Timeout during startup for device nodes to appear.
    ///
    /// This can help with late loaded kernel modules.
    #[clap(short, long)]
    pub wait: Option<u32>,
}

impl Cli {
    pub fn prefs(&self) -> anyhow::Result<Prefs> {
        let mut prefs = Prefs::default();
        if let Some(steps) = &self.user_steps {
            prefs.user_steps = UserStepTable::parse(steps).context("Bad --user-steps")?;
        }
        if let Some(steps) = &self.als_steps {
            prefs.als_steps = AmbientStepTable::parse(steps).context("Bad --als-steps")?;
        }
        prefs.no_als_percent = self.no_als_percent;
        prefs.detect_hover = self.detect_hover;
        prefs.turn_on_for_user_activity = self.turn_on_for_user_activity;
        prefs.keep_on = Duration::from_millis(self.keep_on.into());
        prefs.keep_on_during_video = Duration::from_millis(self.keep_on_during_video.into());
        Ok(prefs)
    }

    pub fn als_interval(&self) -> Duration {
        Duration::from_millis(self.als_interval.max(1).into())
    }
}
