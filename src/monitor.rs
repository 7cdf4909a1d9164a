//! Main inotify/epoll loop

use std::{
    collections::HashMap,
    sync::mpsc::Receiver,
    time::{Duration, Instant},
};

use anyhow::Context;
use log::{debug, info, warn};
use nix::{
    errno::Errno,
    sys::{
        epoll::{Epoll, EpollCreateFlags, EpollEvent, EpollFlags, EpollTimeout},
        inotify::{AddWatchFlags, InitFlags, Inotify, WatchDescriptor},
        signal::{SigSet, Signal},
        signalfd::{SfdFlags, SignalFd},
    },
};

use kbd_backlight_arbiter::{
    bus::{BrightnessChange, BrightnessChangeCause},
    controller::{KeyboardBacklightController, Policy},
    device::{Backlight, BacklightDeviceState},
};

use crate::{
    handlers::{Handler, ListenType},
    led::Led,
    sensor::{AmbientLightSensor, DisplayBacklight},
};

/// Marker value in epoll for the inotify watch.
const INOTIFY_HANDLE: u64 = u64::MAX;
/// Marker value in epoll for the signalfd.
const SIGNAL_HANDLE: u64 = u64::MAX - 1;

pub(crate) type Controller = KeyboardBacklightController<Led>;

/// Everything handlers may touch.
#[derive(Debug)]
pub(crate) struct Daemon {
    pub controller: Controller,
    /// Time of the last input event.
    pub last_input: Instant,
}

/// Dim and turn off after a period without input.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Inactivity {
    pub dim_after: Option<Duration>,
    pub off_after: Option<Duration>,
}

impl Inactivity {
    /// Whether to be dimmed and off after `idle` without input.
    fn state(&self, idle: Duration) -> (bool, bool) {
        let reached = |after: Option<Duration>| after.is_some_and(|after| idle >= after);
        (reached(self.dim_after), reached(self.off_after))
    }

    /// Next time the state changes without further input.
    fn next_change(&self, last_input: Instant, now: Instant) -> Option<Instant> {
        [self.dim_after, self.off_after]
            .into_iter()
            .flatten()
            .map(|after| last_input + after)
            .filter(|&at| at > now)
            .min()
    }
}

/// Whether the LED found on disk is not the one the controller knows about.
/// A re-enumerated LED often keeps its range but comes back at another level.
/// Levels can only be compared while no ramp is moving the hardware.
fn device_replaced(
    known: Option<BacklightDeviceState>,
    probed: Option<BacklightDeviceState>,
    ramping: bool,
) -> bool {
    match (known, probed) {
        (Some(known), Some(probed)) => {
            known.max_level != probed.max_level
                || (!ramping && known.current_level != probed.current_level)
        }
        (known, probed) => known.is_some() != probed.is_some(),
    }
}

/// Inputs read on a fixed interval.
#[derive(Debug)]
pub(crate) struct Polled {
    pub sensor: Option<AmbientLightSensor>,
    pub display: Option<DisplayBacklight>,
    pub interval: Duration,
}

#[derive(Debug)]
pub(crate) struct Monitor {
    inotify: Inotify,
    epoll: Epoll,
    signals: SignalFd,
    /// Mapping of inotify watch descriptors to listener indices
    inotify_map: HashMap<WatchDescriptor, usize>,
    changes: Receiver<BrightnessChange>,
}

impl Monitor {
    /// Must be called before any other thread is spawned, as it blocks the
    /// handled signals.
    pub(crate) fn new(changes: Receiver<BrightnessChange>) -> anyhow::Result<Self> {
        let mut mask = SigSet::empty();
        for signal in [
            Signal::SIGTERM,
            Signal::SIGINT,
            Signal::SIGUSR1,
            Signal::SIGUSR2,
        ] {
            mask.add(signal);
        }
        mask.thread_block().context("Failed to block signals")?;
        Ok(Self {
            inotify: Inotify::init(InitFlags::IN_CLOEXEC | InitFlags::IN_NONBLOCK)?,
            epoll: Epoll::new(EpollCreateFlags::EPOLL_CLOEXEC)?,
            signals: SignalFd::with_flags(&mask, SfdFlags::SFD_CLOEXEC | SfdFlags::SFD_NONBLOCK)?,
            inotify_map: HashMap::new(),
            changes,
        })
    }

    fn setup(&mut self, listeners: &[Box<dyn Handler>]) -> anyhow::Result<()> {
        self.epoll.add(
            &self.inotify,
            EpollEvent::new(EpollFlags::EPOLLIN | EpollFlags::EPOLLERR, INOTIFY_HANDLE),
        )?;
        self.epoll.add(
            &self.signals,
            EpollEvent::new(EpollFlags::EPOLLIN, SIGNAL_HANDLE),
        )?;

        // Add all the listeners
        for (idx, listener) in listeners.iter().enumerate() {
            self.add_handler(listener.monitored(), idx)?;
        }
        Ok(())
    }

    /// Add a handler
    fn add_handler(&mut self, listen_type: ListenType, idx: usize) -> anyhow::Result<()> {
        match listen_type {
            ListenType::Fd(fd) => {
                // TRICKY BIT: Data = 0 is used to indicate nothing happend.
                // We thus offset the array index into listeners by one.
                self.epoll.add(
                    fd,
                    EpollEvent::new(EpollFlags::EPOLLIN | EpollFlags::EPOLLERR, (idx + 1) as u64),
                )?;
            }
            ListenType::Path(p) => {
                let wd = self
                    .inotify
                    .add_watch(p, AddWatchFlags::IN_MODIFY)
                    .with_context(|| format!("Failed to watch {p:?}"))?;
                self.inotify_map.insert(wd, idx);
            }
        };
        Ok(())
    }

    /// Returns `true` when the daemon should exit.
    fn handle_signals(&mut self, daemon: &mut Daemon) -> anyhow::Result<bool> {
        while let Some(info) = self.signals.read_signal()? {
            let Ok(signal) = Signal::try_from(info.ssi_signo as i32) else {
                continue;
            };
            match signal {
                Signal::SIGTERM | Signal::SIGINT => {
                    info!("Got {signal}, shutting down");
                    daemon.controller.set_shutting_down(true);
                    return Ok(true);
                }
                Signal::SIGUSR1 => {
                    let forced_off = daemon.controller.get_forced_off();
                    info!("Got {signal}, forced off: {}", !forced_off);
                    daemon.controller.set_forced_off(!forced_off);
                }
                Signal::SIGUSR2 => {
                    info!("Got {signal}, resetting user brightness");
                    daemon.controller.handle_policy_change(&Policy {
                        reset_user_brightness: true,
                    });
                }
                _ => (),
            }
        }
        Ok(false)
    }

    fn poll(&self, daemon: &mut Daemon, polled: &mut Polled) {
        let controller = &mut daemon.controller;

        // Detect a replaced or removed LED.
        let probed = controller.backlight().probe();
        let known = controller.device_state();
        let ramping = controller.backlight().transition_in_progress();
        if device_replaced(known, probed, ramping) {
            controller.backlight_mut().reset();
            controller.on_device_changed(probed);
        }

        if let Some(sensor) = polled.sensor.as_mut() {
            match sensor.read() {
                Ok(lux) => controller.on_ambient_light_reading(lux),
                Err(e) => warn!("Failed to read ambient light: {e:#}"),
            }
        }
        if let Some(display) = polled.display.as_ref() {
            match display.percent() {
                Ok(percent) => {
                    controller.on_sibling_brightness_change(percent, BrightnessChangeCause::Other)
                }
                Err(e) => warn!("Failed to read display brightness: {e:#}"),
            }
        }
    }

    fn apply_inactivity(daemon: &mut Daemon, inactivity: &Inactivity, now: Instant) {
        let (dimmed, off) = inactivity.state(now.saturating_duration_since(daemon.last_input));
        daemon.controller.set_dimmed_for_inactivity(dimmed);
        daemon.controller.set_off_for_inactivity(off);
    }

    /// Main loop that monitors all the different data sources.
    pub(crate) fn monitor(
        &mut self,
        mut listeners: Vec<Box<dyn Handler>>,
        mut daemon: Daemon,
        mut polled: Polled,
        inactivity: Inactivity,
    ) -> anyhow::Result<()> {
        self.setup(&listeners)?;

        let mut next_poll = Instant::now();
        let mut next_ramp = None;
        'main_loop: loop {
            let now = Instant::now();
            let deadline = [
                daemon.controller.next_timer_deadline(),
                next_ramp,
                Some(next_poll),
                inactivity.next_change(daemon.last_input, now),
            ]
            .into_iter()
            .flatten()
            .min();
            let timeout = match deadline {
                // Round up so we don't wake just before the deadline.
                Some(at) => EpollTimeout::try_from(
                    at.saturating_duration_since(now) + Duration::from_micros(999),
                )
                .unwrap_or(EpollTimeout::MAX),
                None => EpollTimeout::NONE,
            };

            let mut events = [EpollEvent::empty(); 32];
            let n = match self.epoll.wait(&mut events, timeout) {
                Ok(n) => n,
                // Retry.
                Err(Errno::EINTR) => continue 'main_loop,
                Err(err) => {
                    return Err(anyhow::anyhow!("Epoll error code: {err}"));
                }
            };

            // Process events
            for event in &events[..n] {
                match event.data() {
                    INOTIFY_HANDLE => {
                        for ievent in self.inotify.read_events()? {
                            let Some(&idx) = self.inotify_map.get(&ievent.wd) else {
                                continue;
                            };
                            if let Some(l) = listeners.get_mut(idx) {
                                l.process(&mut daemon)?;
                            }
                        }
                    }
                    SIGNAL_HANDLE => {
                        if self.handle_signals(&mut daemon)? {
                            self.drain_changes();
                            return Ok(());
                        }
                    }
                    0 => (),
                    idx => {
                        if let Some(l) = listeners.get_mut((idx - 1) as usize) {
                            l.process(&mut daemon)?;
                        }
                    }
                }
            }

            let now = Instant::now();
            daemon.controller.run_due_timers();
            if now >= next_poll {
                self.poll(&mut daemon, &mut polled);
                next_poll = now + polled.interval;
            }
            Self::apply_inactivity(&mut daemon, &inactivity, now);
            next_ramp = match daemon.controller.backlight_mut().tick(now) {
                Ok(next) => next,
                Err(e) => {
                    warn!("Failed to advance brightness transition: {e}");
                    None
                }
            };
            self.drain_changes();
        }
    }

    fn drain_changes(&self) {
        for change in self.changes.try_iter() {
            debug!(
                "Brightness of {} now {}% ({:?})",
                change.source.0, change.percent, change.cause
            );
        }
    }
}
