//! Keyboard backlight daemon. Picks the keyboard backlight brightness from
//! ambient light, user requests and laptop state.
//!
//! There is no public code API for you to use in this binary! The engine
//! lives in the `kbd_backlight_arbiter` library; the command line interface
//! should be stable.

use std::path::Path;
use std::sync::mpsc::channel;
use std::time::Duration;
use std::time::Instant;

use clap::Parser;
use log::info;

use handlers::{EvDevListener, Handler, HwChangeListener};
use kbd_backlight_arbiter::{
    controller::{InitialState, KeyboardBacklightController},
    state::{LidState, SessionState, TabletMode},
    timer::SystemClock,
};
use monitor::{Daemon, Inactivity, Monitor, Polled};

use crate::led::Led;
use crate::sensor::{AmbientLightSensor, DisplayBacklight};
use crate::utils::wait_for_file;

mod flags;
mod handlers;
mod led;
mod monitor;
mod sensor;
mod utils;

fn main() -> anyhow::Result<()> {
    let cli = flags::Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
    setup_daemon(&cli)
}

/// Set up and run the daemon until told to stop.
fn setup_daemon(config: &flags::Cli) -> anyhow::Result<()> {
    let prefs = config.prefs()?;

    let devices_to_monitor =
        utils::normalize_devices(config.monitor_input.clone(), utils::get_default_devices()?)?;
    let evdev_listeners = devices_to_monitor
        .iter()
        .map(|e| EvDevListener::new(e))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let led_dir = match &config.led_base_dir {
        Some(dir) => dir.clone(),
        None => utils::find_kbd_led(Path::new("/sys/class/leds"))?,
    };
    if let Some(timeout) = config.wait {
        wait_for_file(&led_dir, Duration::from_millis(timeout.into()))?;
    }
    let led = Led::new(led_dir);
    let hw_listener = led.hw_monitor_path().map(HwChangeListener::new);

    let sensor = match config.als_path.clone().or_else(AmbientLightSensor::find_default) {
        Some(path) => Some(AmbientLightSensor::new(path, config.als_smoothing)?),
        None => {
            info!("No ambient light sensor");
            None
        }
    };
    let display = config
        .display_dir
        .clone()
        .or_else(DisplayBacklight::find_default)
        .map(DisplayBacklight::new);

    let initial = InitialState {
        sensor_present: sensor.is_some(),
        lid_state: evdev_listeners
            .iter()
            .find_map(EvDevListener::lid_state)
            .unwrap_or(LidState::NotPresent),
        tablet_mode: evdev_listeners
            .iter()
            .find_map(EvDevListener::tablet_mode)
            .unwrap_or(TabletMode::Unsupported),
    };
    let docked = evdev_listeners.iter().find_map(EvDevListener::docked);

    // Signals are blocked here, before anything else could spawn a thread.
    let (tx, rx) = channel();
    let mut monitor = Monitor::new(rx)?;

    let mut controller =
        KeyboardBacklightController::new(led, prefs, initial, Box::new(SystemClock));
    controller.subscribe(tx);
    // A daemon only runs for a logged in machine.
    controller.handle_session_state_change(SessionState::Started);
    if let Some(docked) = docked {
        controller.set_docked(docked);
    }

    let mut listeners: Vec<Box<dyn Handler>> = evdev_listeners
        .into_iter()
        .map(|l| Box::new(l) as Box<dyn Handler>)
        .collect();
    if let Some(l) = hw_listener {
        listeners.push(Box::new(l));
    }

    let daemon = Daemon {
        controller,
        last_input: Instant::now(),
    };
    let polled = Polled {
        sensor,
        display,
        interval: config.als_interval(),
    };
    let inactivity = Inactivity {
        dim_after: config.dim_timeout.map(|ms| Duration::from_millis(ms.into())),
        off_after: config.timeout.map(|ms| Duration::from_millis(ms.into())),
    };
    monitor.monitor(listeners, daemon, polled, inactivity)
}
