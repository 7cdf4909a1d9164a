//! Handlers for activity on paths

use std::{os::fd::BorrowedFd, path::Path};

use crate::monitor::Daemon;

/// Describes what a handler wants to monitor.
#[derive(Debug)]
pub(crate) enum ListenType<'a> {
    /// Monitor a file descriptor
    Fd(BorrowedFd<'a>),
    /// Monitor a path
    Path(&'a Path),
}

/// Handles some type of notification
pub(crate) trait Handler: std::fmt::Debug {
    /// What needs to be monitored for this listener
    fn monitored(&self) -> ListenType<'_>;
    /// Called on change of the monitored thing
    fn process(&mut self, daemon: &mut Daemon) -> anyhow::Result<()>;
}

pub(crate) use ev_dev::EvDevListener;
pub(crate) use hw_change::HwChangeListener;

/// Code for handling /dev/input
mod ev_dev {
    use std::{io::ErrorKind, os::fd::AsFd, path::Path, time::Instant};

    use anyhow::Context;
    use evdev_rs::{
        enums::{EventCode, EV_KEY, EV_SW},
        Device, DeviceWrapper, InputEvent, ReadFlag, ReadStatus,
    };
    use log::{debug, warn};

    use kbd_backlight_arbiter::{
        controller::KeyboardBacklightController,
        device::Backlight,
        state::{LidState, TabletMode, UserActivityType},
    };

    use super::{Handler, ListenType};
    use crate::monitor::Daemon;

    /// What an input event means to us.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(super) enum Input {
        Ignore,
        Activity(UserActivityType),
        Increase,
        Decrease,
        ToggleOff,
        Lid(LidState),
        Tablet(TabletMode),
        Dock(bool),
    }

    pub(super) fn classify(event: &InputEvent) -> Input {
        let pressed = event.value != 0;
        match &event.event_code {
            // Releases still count as activity, but only presses (and
            // repeats) step the brightness.
            EventCode::EV_KEY(EV_KEY::KEY_KBDILLUMUP) if pressed => Input::Increase,
            EventCode::EV_KEY(EV_KEY::KEY_KBDILLUMDOWN) if pressed => Input::Decrease,
            EventCode::EV_KEY(EV_KEY::KEY_KBDILLUMTOGGLE) if event.value == 1 => Input::ToggleOff,
            EventCode::EV_KEY(key) => Input::Activity(match key {
                EV_KEY::KEY_BRIGHTNESSUP => UserActivityType::BrightnessUpKey,
                EV_KEY::KEY_BRIGHTNESSDOWN => UserActivityType::BrightnessDownKey,
                EV_KEY::KEY_VOLUMEUP => UserActivityType::VolumeUpKey,
                EV_KEY::KEY_VOLUMEDOWN => UserActivityType::VolumeDownKey,
                EV_KEY::KEY_MUTE => UserActivityType::VolumeMuteKey,
                _ => UserActivityType::Other,
            }),
            EventCode::EV_SW(EV_SW::SW_LID) => Input::Lid(if pressed {
                LidState::Closed
            } else {
                LidState::Open
            }),
            EventCode::EV_SW(EV_SW::SW_TABLET_MODE) => Input::Tablet(if pressed {
                TabletMode::On
            } else {
                TabletMode::Off
            }),
            EventCode::EV_SW(EV_SW::SW_DOCK) => Input::Dock(pressed),
            EventCode::EV_SYN(_) | EventCode::EV_MSC(_) | EventCode::EV_SW(_) => Input::Ignore,
            _ => Input::Activity(UserActivityType::Other),
        }
    }

    /// Handler for /dev/input
    #[derive(Debug)]
    pub(crate) struct EvDevListener {
        dev: Device,
    }

    impl EvDevListener {
        pub fn new(path: &Path) -> anyhow::Result<Self> {
            Ok(Self {
                dev: Device::new_from_path(path)
                    .with_context(|| format!("Failed to open input device {path:?}"))?,
            })
        }

        /// Current position of a switch, if the device has it.
        fn switch(&self, sw: EV_SW) -> Option<bool> {
            self.dev.event_value(&EventCode::EV_SW(sw)).map(|v| v != 0)
        }

        pub fn lid_state(&self) -> Option<LidState> {
            self.switch(EV_SW::SW_LID).map(|closed| {
                if closed {
                    LidState::Closed
                } else {
                    LidState::Open
                }
            })
        }

        pub fn tablet_mode(&self) -> Option<TabletMode> {
            self.switch(EV_SW::SW_TABLET_MODE).map(|on| {
                if on {
                    TabletMode::On
                } else {
                    TabletMode::Off
                }
            })
        }

        pub fn docked(&self) -> Option<bool> {
            self.switch(EV_SW::SW_DOCK)
        }
    }

    impl Handler for EvDevListener {
        fn monitored(&self) -> ListenType<'_> {
            ListenType::Fd(self.dev.file().as_fd())
        }

        fn process(&mut self, daemon: &mut Daemon) -> anyhow::Result<()> {
            let events = self.read_pending();
            if apply(&mut daemon.controller, events) {
                // The time in the event is not monotonic, thus we need
                // to get the time right now instead.
                daemon.last_input = Instant::now();
            }
            Ok(())
        }
    }

    impl EvDevListener {
        /// Read everything libevdev has queued. It drains the fd into its own
        /// queue, so epoll will not wake us again for what is left there.
        fn read_pending(&mut self) -> Vec<InputEvent> {
            let mut events = vec![];
            let mut flag = ReadFlag::NORMAL;
            loop {
                match self.dev.next_event(flag) {
                    Ok((ReadStatus::Success, event)) => events.push(event),
                    Ok((ReadStatus::Sync, event)) => {
                        // SYN_DROPPED: the sync events that follow describe
                        // the current device state.
                        if flag == ReadFlag::NORMAL {
                            debug!("Events dropped on {:?}, resyncing", self.dev.file());
                            flag = ReadFlag::SYNC;
                        } else {
                            events.push(event);
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::WouldBlock => {
                        if flag == ReadFlag::NORMAL {
                            break;
                        }
                        flag = ReadFlag::NORMAL;
                    }
                    Err(e) => {
                        warn!("Error reading {:?}: {}", self.dev.file(), e);
                        break;
                    }
                }
                if flag == ReadFlag::NORMAL && !self.dev.has_event_pending() {
                    break;
                }
            }
            events
        }
    }

    /// Feed a batch of events to the controller. Returns `true` if anything
    /// but sync and scan reports was in it.
    pub(super) fn apply<B: Backlight>(
        controller: &mut KeyboardBacklightController<B>,
        events: impl IntoIterator<Item = InputEvent>,
    ) -> bool {
        let mut any = false;
        for input in events.into_iter().map(|e| classify(&e)) {
            if input == Input::Ignore {
                continue;
            }
            debug!("Input: {input:?}");
            any = true;
            match input {
                Input::Ignore => (),
                Input::Activity(kind) => controller.handle_user_activity(kind),
                Input::Increase => {
                    controller.handle_user_activity(UserActivityType::Other);
                    controller.increase_user_brightness();
                }
                Input::Decrease => {
                    controller.handle_user_activity(UserActivityType::Other);
                    controller.decrease_user_brightness(true);
                }
                Input::ToggleOff => {
                    let forced_off = controller.get_forced_off();
                    controller.set_forced_off(!forced_off);
                }
                Input::Lid(state) => controller.handle_lid_state_change(state),
                Input::Tablet(mode) => controller.handle_tablet_mode_change(mode),
                Input::Dock(docked) => controller.set_docked(docked),
            }
        }
        any
    }
}

/// Code for handling /sys/class/leds/tpacpi::kbd_backlight/brightness_hw_changed (or similar files)
mod hw_change {
    use std::path::PathBuf;

    use log::warn;

    use super::{Handler, ListenType};
    use crate::{led::read_int, monitor::Daemon};

    /// Handler for /sys/class/leds/tpacpi::kbd_backlight/brightness_hw_changed (or similar files
    #[derive(Debug)]
    pub(crate) struct HwChangeListener {
        path: PathBuf,
    }

    impl HwChangeListener {
        pub fn new(path: PathBuf) -> Self {
            Self { path }
        }
    }

    impl Handler for HwChangeListener {
        fn monitored(&self) -> ListenType<'_> {
            ListenType::Path(self.path.as_path())
        }

        fn process(&mut self, daemon: &mut Daemon) -> anyhow::Result<()> {
            match read_int(&self.path) {
                Ok(level) => daemon.controller.handle_external_level_change(level),
                Err(e) => warn!("Ignoring hardware brightness change: {e}"),
            }
            Ok(())
        }
    }
}
