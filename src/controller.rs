//! The keyboard backlight arbitration engine.
//!
//! Every handler records its signal and then recomputes the whole decision
//! via [`policy::decide`]. The controller never keeps a partially updated
//! brightness around: whatever the signals say right now is what gets
//! applied.

use std::{sync::mpsc::Sender, time::Instant};

use log::{debug, info, warn};

use crate::{
    ambient::{AmbientLightArbiter, AmbientLightUpdate},
    bus::{BrightnessChange, BrightnessChangeCause, ControllerId, ObserverBus, SubscriptionId},
    config::Prefs,
    cursor::UserStepCursor,
    device::{Backlight, BacklightDeviceState, DeviceAdapter, Transition},
    policy::{self, PolicyInput},
    state::{
        BrightnessSource, Counters, DisplayMode, LidState, PowerSource, SessionState, Signals,
        TabletMode, UserActivityType,
    },
    timer::{Clock, KeepOn, KeepOnTimer},
};

pub const KEYBOARD: ControllerId = ControllerId("keyboard");

/// Sibling brightness at or below this counts as off.
const ZERO_EPSILON: f64 = 0.001;

/// Power management policy pushed at runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Policy {
    /// Hand brightness back to the automatic source.
    pub reset_user_brightness: bool,
}

/// Facts known when the controller is created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InitialState {
    pub sensor_present: bool,
    pub lid_state: LidState,
    pub tablet_mode: TabletMode,
}

#[derive(Debug)]
pub struct KeyboardBacklightController<B> {
    clock: Box<dyn Clock>,
    device: DeviceAdapter<B>,
    bus: ObserverBus,
    ambient: Option<AmbientLightArbiter>,
    cursor: UserStepCursor,
    keep_on: KeepOn,
    signals: Signals,
    counters: Counters,
    /// Undimmed percent while brightness is automatic.
    automated_percent: f64,
}

impl<B: Backlight> KeyboardBacklightController<B> {
    pub fn new(backlight: B, prefs: Prefs, initial: InitialState, clock: Box<dyn Clock>) -> Self {
        let device = DeviceAdapter::new(backlight);
        let ambient = initial
            .sensor_present
            .then(|| AmbientLightArbiter::new(prefs.als_steps.clone(), device.current_percent()));
        let (source, automated_percent) = match &ambient {
            Some(als) => (BrightnessSource::AmbientLight, als.percent()),
            None => (BrightnessSource::Fixed, prefs.no_als_percent()),
        };

        let mut controller = Self {
            clock,
            device,
            bus: ObserverBus::new(KEYBOARD),
            ambient,
            cursor: UserStepCursor::new(prefs.user_steps.clone()),
            keep_on: KeepOn::new(prefs.keep_on_config()),
            signals: Signals::new(source, initial.lid_state, initial.tablet_mode),
            counters: Counters::default(),
            automated_percent,
        };
        // With a sensor, wait for its first reading instead.
        if controller.ambient.is_none() {
            controller.update_state(Transition::Slow, BrightnessChangeCause::Other);
        }
        controller
    }

    pub fn id(&self) -> ControllerId {
        self.bus.source()
    }

    pub fn signals(&self) -> &Signals {
        &self.signals
    }

    pub fn backlight(&self) -> &B {
        self.device.backlight()
    }

    pub fn backlight_mut(&mut self) -> &mut B {
        self.device.backlight_mut()
    }

    pub fn device_state(&self) -> Option<BacklightDeviceState> {
        self.device.state()
    }

    pub fn subscribe(&mut self, listener: Sender<BrightnessChange>) -> SubscriptionId {
        self.bus.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    pub fn handle_power_source_change(&mut self, source: PowerSource) {
        debug!("Power source is now {source:?}");
        self.signals.power_source = source;
    }

    pub fn handle_display_mode_change(&mut self, mode: DisplayMode) {
        debug!("Display mode is now {mode:?}");
        self.signals.display_mode = mode;
    }

    pub fn handle_session_state_change(&mut self, state: SessionState) {
        self.signals.session_state = state;
        if state == SessionState::Started {
            self.counters.reset();
        }
    }

    pub fn handle_power_button_press(&mut self) {
        debug!("Power button pressed");
    }

    pub fn handle_user_activity(&mut self, kind: UserActivityType) {
        debug!("User activity: {kind:?}");
        let now = self.clock.now();
        self.keep_on.user_active(now);
        self.rearm_turn_off(now);
        self.update_state(Transition::Fast, BrightnessChangeCause::Other);
    }

    pub fn handle_video_activity(&mut self, is_fullscreen: bool) {
        // Login screen animations can look like fullscreen video.
        let is_fullscreen = is_fullscreen && self.signals.session_state != SessionState::Stopped;

        if is_fullscreen != self.signals.fullscreen_video_playing {
            debug!(
                "Fullscreen video {}",
                if is_fullscreen { "started" } else { "went non-fullscreen" }
            );
            self.signals.fullscreen_video_playing = is_fullscreen;
            // The keep-on window runs with the other delay now.
            let now = self.clock.now();
            self.rearm_turn_off(now);
            self.update_state(Transition::Slow, BrightnessChangeCause::Other);
        }

        self.keep_on.cancel_video();
        if is_fullscreen {
            let now = self.clock.now();
            self.keep_on.arm_video(now);
        }
    }

    pub fn handle_hover_state_change(&mut self, hovering: bool) {
        if !self.keep_on.detect_hover() || hovering == self.signals.hovering {
            return;
        }
        self.signals.hovering = hovering;

        let now = self.clock.now();
        if hovering {
            info!("Hovering on");
            self.keep_on.hover_started();
        } else {
            info!("Hovering off");
            self.keep_on.hover_stopped(now);
            self.rearm_turn_off(now);
        }
        let transition = if hovering {
            Transition::Fast
        } else {
            Transition::Slow
        };
        self.update_state(transition, BrightnessChangeCause::Other);
    }

    pub fn handle_tablet_mode_change(&mut self, mode: TabletMode) {
        if mode == self.signals.tablet_mode {
            return;
        }
        info!("Tablet mode is now {mode:?}");
        self.signals.tablet_mode = mode;
        self.update_state(Transition::Fast, BrightnessChangeCause::Other);
    }

    pub fn handle_lid_state_change(&mut self, state: LidState) {
        if state == self.signals.lid_state {
            return;
        }
        info!("Lid is now {state:?}");
        self.signals.lid_state = state;
        self.update_state(Transition::Instant, BrightnessChangeCause::Other);
    }

    pub fn handle_policy_change(&mut self, policy: &Policy) {
        if !policy.reset_user_brightness || self.signals.source != BrightnessSource::User {
            return;
        }
        info!("Policy reset, returning to automatic brightness");
        self.signals.source = if self.ambient.is_some() {
            BrightnessSource::AmbientLight
        } else {
            BrightnessSource::Fixed
        };
        self.update_state(Transition::Fast, BrightnessChangeCause::Other);
    }

    pub fn handle_display_service_start(&mut self) {
        debug!("Display service started");
    }

    pub fn set_dimmed_for_inactivity(&mut self, dimmed: bool) {
        if dimmed == self.signals.dimmed_for_inactivity {
            return;
        }
        self.signals.dimmed_for_inactivity = dimmed;
        self.update_state(Transition::Slow, BrightnessChangeCause::Other);
    }

    pub fn set_off_for_inactivity(&mut self, off: bool) {
        if off == self.signals.off_for_inactivity {
            return;
        }
        self.signals.off_for_inactivity = off;
        self.update_state(Transition::Slow, BrightnessChangeCause::Other);
    }

    pub fn set_suspended(&mut self, suspended: bool) {
        if suspended == self.signals.suspended {
            return;
        }
        self.signals.suspended = suspended;
        let transition = if suspended {
            Transition::Instant
        } else {
            Transition::Fast
        };
        self.update_state(transition, BrightnessChangeCause::Other);
    }

    pub fn set_shutting_down(&mut self, shutting_down: bool) {
        if shutting_down == self.signals.shutting_down {
            return;
        }
        self.signals.shutting_down = shutting_down;
        self.update_state(Transition::Instant, BrightnessChangeCause::Other);
    }

    pub fn set_docked(&mut self, docked: bool) {
        if docked == self.signals.docked {
            return;
        }
        self.signals.docked = docked;
        self.update_state(Transition::Instant, BrightnessChangeCause::Other);
    }

    pub fn set_forced_off(&mut self, forced_off: bool) {
        if forced_off == self.signals.forced_off {
            return;
        }
        self.signals.forced_off = forced_off;
        self.update_state(Transition::Instant, BrightnessChangeCause::Other);
    }

    pub fn get_forced_off(&self) -> bool {
        self.signals.forced_off
    }

    /// Current hardware brightness, `None` without a device.
    pub fn get_brightness_percent(&self) -> Option<f64> {
        self.device.current_percent()
    }

    pub fn increase_user_brightness(&mut self) -> bool {
        info!("Got user-triggered request to increase brightness");
        self.step_user_brightness(UserStepCursor::increase)
    }

    pub fn decrease_user_brightness(&mut self, allow_off: bool) -> bool {
        info!("Got user-triggered request to decrease brightness");
        self.step_user_brightness(|cursor| cursor.decrease(allow_off))
    }

    pub fn get_num_ambient_light_adjustments(&self) -> u32 {
        self.counters.ambient_light_adjustments
    }

    pub fn get_num_user_adjustments(&self) -> u32 {
        self.counters.user_adjustments
    }

    pub fn on_ambient_light_reading(&mut self, lux: f64) {
        let Some(als) = self.ambient.as_mut() else {
            debug!("Ignoring ALS reading without a sensor");
            return;
        };
        let Some(update) = als.on_reading(lux) else {
            return;
        };
        debug!("ALS step {} after {lux} lux", als.index());
        self.automated_percent = update.percent();
        if matches!(update, AmbientLightUpdate::Step { .. }) && self.signals.using_ambient_light() {
            self.counters.ambient_light_adjustments += 1;
        }
        self.update_state(Transition::Slow, BrightnessChangeCause::AmbientLight);
    }

    pub fn on_sibling_brightness_change(&mut self, percent: f64, cause: BrightnessChangeCause) {
        let zero = percent <= ZERO_EPSILON;
        if zero == self.signals.sibling_display_brightness_is_zero {
            return;
        }
        debug!("Display brightness {percent}% ({cause:?})");
        self.signals.sibling_display_brightness_is_zero = zero;
        self.update_state(Transition::Slow, cause);
    }

    /// The backlight device was replaced or removed. The last percent asked
    /// for is written to the new device whatever level it reports. Nothing
    /// is written if no decision was made yet.
    pub fn on_device_changed(&mut self, device: Option<BacklightDeviceState>) {
        self.device.replace(device);
        if !self.device.is_present() {
            return;
        }
        if let Some(percent) = self.device.last_percent() {
            self.apply_brightness_percent(
                percent,
                Transition::Instant,
                BrightnessChangeCause::Other,
            );
        }
    }

    /// The hardware changed its level on its own, e.g. through a firmware
    /// hotkey. Treated as the user taking over.
    pub fn handle_external_level_change(&mut self, level: u64) {
        if self
            .device
            .state()
            .is_none_or(|state| state.current_level == level)
        {
            return;
        }
        self.device.adopt_level(level);
        let Some(percent) = self.device.current_percent() else {
            return;
        };
        info!("Backlight changed externally to level {level} ({percent}%)");
        self.cursor.snap_to_nearest(percent);
        self.signals.source = BrightnessSource::User;
        self.counters.user_adjustments += 1;
        self.bus.notify(percent, BrightnessChangeCause::UserRequest);
    }

    pub fn next_timer_deadline(&self) -> Option<Instant> {
        self.keep_on.next_deadline()
    }

    /// Fire every timer that is due. Returns how many fired.
    pub fn run_due_timers(&mut self) -> usize {
        let now = self.clock.now();
        let due = self.keep_on.take_due(now);
        for &timer in &due {
            self.on_timer(timer);
        }
        due.len()
    }

    /// Fire the turn-off timer now, even if it isn't due yet.
    pub fn fire_turn_off_timer(&mut self) -> bool {
        self.fire_early(KeepOnTimer::TurnOff)
    }

    /// Fire the video timer now, even if it isn't due yet.
    pub fn fire_video_timer(&mut self) -> bool {
        self.fire_early(KeepOnTimer::Video)
    }

    fn fire_early(&mut self, timer: KeepOnTimer) -> bool {
        if !self.keep_on.take(timer) {
            return false;
        }
        self.on_timer(timer);
        true
    }

    fn on_timer(&mut self, timer: KeepOnTimer) {
        match timer {
            KeepOnTimer::Video => {
                if self.signals.fullscreen_video_playing {
                    debug!("Fullscreen video stopped");
                }
                self.signals.fullscreen_video_playing = false;
                self.update_state(Transition::Fast, BrightnessChangeCause::Other);
            }
            KeepOnTimer::TurnOff => {
                self.update_state(Transition::Slow, BrightnessChangeCause::Other);
            }
        }
        // Fired early or the video state changed: arm for what's left.
        let now = self.clock.now();
        self.rearm_turn_off(now);
    }

    fn rearm_turn_off(&mut self, now: Instant) {
        self.keep_on.rearm_turn_off(
            now,
            self.signals.hovering,
            self.signals.fullscreen_video_playing,
        );
    }

    fn step_user_brightness(&mut self, step: impl FnOnce(&mut UserStepCursor) -> bool) -> bool {
        if !self.device.is_present() {
            warn!("Ignoring brightness request: no backlight device");
            return false;
        }
        if self.signals.source.is_automatic() {
            if let Some(percent) = self.device.current_percent() {
                self.cursor.snap_to_nearest(percent);
            }
        }
        if !step(&mut self.cursor) {
            debug!("No further user step in that direction");
            return false;
        }
        debug!("User step now {:?}", self.cursor.index());
        self.signals.source = BrightnessSource::User;
        self.counters.user_adjustments += 1;
        self.update_state(Transition::Fast, BrightnessChangeCause::UserRequest);
        true
    }

    fn undimmed_percent(&self) -> f64 {
        match self.signals.source {
            BrightnessSource::User => self.cursor.percent().unwrap_or(self.automated_percent),
            BrightnessSource::AmbientLight | BrightnessSource::Fixed => self.automated_percent,
        }
    }

    /// Recompute and apply. `transition` is the triggering event's speed and
    /// is used unless the winning suppression has one of its own.
    fn update_state(&mut self, transition: Transition, cause: BrightnessChangeCause) -> bool {
        let now = self.clock.now();
        let keep_on = self.keep_on.status(
            now,
            self.signals.hovering,
            self.signals.fullscreen_video_playing,
        );
        let input = PolicyInput {
            signals: &self.signals,
            undimmed_percent: self.undimmed_percent(),
            keep_on,
        };
        let decision = policy::decide(&input);
        debug!(
            "Decision: {decision:?} (active: {:?})",
            policy::active_suppressions(&input)
        );
        let transition = decision.transition.unwrap_or(transition);
        self.apply_brightness_percent(decision.percent, transition, cause)
    }

    fn apply_brightness_percent(
        &mut self,
        percent: f64,
        transition: Transition,
        cause: BrightnessChangeCause,
    ) -> bool {
        if !self.device.apply(percent, transition) {
            return false;
        }
        self.bus.notify(percent, cause);
        true
    }
}

#[cfg(test)]
mod tests;
