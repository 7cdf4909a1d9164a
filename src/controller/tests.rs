use std::{
    sync::mpsc::{channel, Receiver},
    time::Duration,
};

use super::*;
use crate::{
    device::{stub::StubBacklight, FAST_TRANSITION, SLOW_TRANSITION},
    steps::{AmbientStepTable, UserStepTable, DIM_PERCENT},
    timer::manual::ManualClock,
};

const INSTANT: Option<Duration> = Some(Duration::ZERO);
const FAST: Option<Duration> = Some(FAST_TRANSITION);
const SLOW: Option<Duration> = Some(SLOW_TRANSITION);

/// Knobs applied before the controller is built.
struct Setup {
    max_level: u64,
    initial_level: u64,
    device_exists: bool,
    sensor_present: bool,
    als_steps: &'static str,
    user_steps: &'static str,
    no_als_percent: Option<f64>,
    detect_hover: bool,
    turn_on_for_user_activity: bool,
    keep_on_ms: u64,
    keep_on_during_video_ms: u64,
    lid_state: LidState,
    tablet_mode: TabletMode,
}

impl Default for Setup {
    fn default() -> Self {
        Self {
            max_level: 100,
            initial_level: 50,
            device_exists: true,
            sensor_present: true,
            als_steps: "20.0 -1 50\n50.0 35 75\n75.0 60 -1",
            user_steps: "0.0\n10.0\n40.0\n60.0\n100.0",
            no_als_percent: Some(40.0),
            detect_hover: false,
            turn_on_for_user_activity: false,
            keep_on_ms: 0,
            keep_on_during_video_ms: 0,
            lid_state: LidState::NotPresent,
            tablet_mode: TabletMode::Unsupported,
        }
    }
}

impl Setup {
    fn init(self) -> Fixture {
        let mut backlight = StubBacklight::new(self.max_level, self.initial_level);
        backlight.device_exists = self.device_exists;
        let prefs = Prefs {
            user_steps: UserStepTable::parse(self.user_steps).unwrap(),
            als_steps: AmbientStepTable::parse(self.als_steps).unwrap(),
            no_als_percent: self.no_als_percent,
            detect_hover: self.detect_hover,
            turn_on_for_user_activity: self.turn_on_for_user_activity,
            keep_on: Duration::from_millis(self.keep_on_ms),
            keep_on_during_video: Duration::from_millis(self.keep_on_during_video_ms),
        };
        let initial = InitialState {
            sensor_present: self.sensor_present,
            lid_state: self.lid_state,
            tablet_mode: self.tablet_mode,
        };
        let clock = ManualClock::new();
        let mut controller =
            KeyboardBacklightController::new(backlight, prefs, initial, Box::new(clock.clone()));
        let (tx, changes) = channel();
        controller.subscribe(tx);
        Fixture {
            c: controller,
            clock,
            changes,
        }
    }
}

struct Fixture {
    c: KeyboardBacklightController<StubBacklight>,
    clock: ManualClock,
    changes: Receiver<BrightnessChange>,
}

impl Fixture {
    fn level(&self) -> u64 {
        self.c.backlight().current_level
    }

    fn interval(&self) -> Option<Duration> {
        self.c.backlight().current_interval
    }

    fn advance(&self, ms: u64) {
        self.clock.advance(Duration::from_millis(ms));
    }

    fn changes(&self) -> Vec<(f64, BrightnessChangeCause)> {
        self.changes
            .try_iter()
            .map(|change| (change.percent, change.cause))
            .collect()
    }

    /// Plug in or unplug the stub and tell the controller.
    fn swap_device(&mut self, exists: bool, max_level: u64, current_level: u64) {
        let stub = self.c.backlight_mut();
        stub.device_exists = exists;
        stub.max_level = max_level;
        stub.current_level = current_level;
        let probed = self.c.backlight().probe();
        self.c.on_device_changed(probed);
    }
}

fn dimmed_level() -> u64 {
    DIM_PERCENT.round() as u64
}

#[test]
fn get_brightness_percent() {
    let mut f = Setup::default().init();
    assert_eq!(f.c.get_brightness_percent(), Some(50.0));

    assert!(f.c.increase_user_brightness());
    assert_eq!(f.c.get_brightness_percent(), Some(f.level() as f64));
}

#[test]
fn no_device_reports_no_brightness() {
    let f = Setup {
        device_exists: false,
        ..Setup::default()
    }
    .init();
    assert_eq!(f.c.get_brightness_percent(), None);
}

#[test]
fn turn_off_for_fullscreen_video() {
    let mut f = Setup {
        initial_level: 20,
        user_steps: "0.0\n100.0",
        ..Setup::default()
    }
    .init();
    f.c.handle_session_state_change(SessionState::Started);
    f.c.on_ambient_light_reading(25.0);
    assert_eq!(f.level(), 20);

    // Non-fullscreen video doesn't matter.
    f.c.handle_video_activity(false);
    assert_eq!(f.level(), 20);

    f.c.handle_video_activity(true);
    assert_eq!(f.level(), 0);
    assert_eq!(f.interval(), SLOW);

    f.c.handle_video_activity(false);
    assert_eq!(f.level(), 20);
    assert_eq!(f.interval(), SLOW);

    f.c.handle_video_activity(true);
    assert_eq!(f.level(), 0);

    // Reports stopped arriving.
    assert!(f.c.fire_video_timer());
    assert_eq!(f.level(), 20);
    assert_eq!(f.interval(), FAST);

    // Ignored on the login screen.
    f.c.handle_session_state_change(SessionState::Stopped);
    f.c.handle_video_activity(true);
    assert_eq!(f.level(), 20);

    // And once the user picked a brightness.
    f.c.handle_session_state_change(SessionState::Started);
    f.c.handle_video_activity(true);
    assert_eq!(f.level(), 0);
    assert!(f.c.increase_user_brightness());
    assert_eq!(f.level(), 100);
    f.c.handle_video_activity(true);
    assert_eq!(f.level(), 100);
    assert!(f.c.decrease_user_brightness(true));
    assert_eq!(f.level(), 0);
    assert!(f.c.fire_video_timer());
    assert_eq!(f.level(), 0);
}

#[test]
fn video_timer_expires_on_schedule() {
    let mut f = Setup {
        initial_level: 20,
        ..Setup::default()
    }
    .init();
    f.c.handle_session_state_change(SessionState::Started);
    f.c.on_ambient_light_reading(25.0);
    f.c.handle_video_activity(true);
    assert_eq!(f.level(), 0);

    f.advance(6999);
    assert_eq!(f.c.run_due_timers(), 0);
    assert_eq!(f.level(), 0);

    // Another report pushes the deadline out.
    f.c.handle_video_activity(true);
    f.advance(1);
    assert_eq!(f.c.run_due_timers(), 0);
    f.advance(6999);
    assert_eq!(f.c.run_due_timers(), 1);
    assert_eq!(f.level(), 20);
    assert_eq!(f.c.next_timer_deadline(), None);
}

#[test]
fn ambient_light_updates() {
    let mut f = Setup {
        initial_level: 20,
        ..Setup::default()
    }
    .init();
    assert_eq!(f.level(), 20);
    assert_eq!(f.c.get_num_ambient_light_adjustments(), 0);

    f.c.on_ambient_light_reading(-1.0);
    assert_eq!(f.level(), 20);

    f.c.on_ambient_light_reading(25.0);
    assert_eq!(f.level(), 20);

    // Hysteresis holds the first one back.
    f.c.on_ambient_light_reading(80.0);
    assert_eq!(f.level(), 20);

    // Second one skips the middle step.
    f.c.on_ambient_light_reading(80.0);
    assert_eq!(f.level(), 75);
    assert_eq!(f.interval(), SLOW);
    assert_eq!(f.c.get_num_ambient_light_adjustments(), 1);

    f.c.on_ambient_light_reading(55.0);
    assert_eq!(f.level(), 75);
    f.c.on_ambient_light_reading(55.0);
    assert_eq!(f.level(), 50);
    assert_eq!(f.interval(), SLOW);
    assert_eq!(f.c.get_num_ambient_light_adjustments(), 2);

    f.c.handle_session_state_change(SessionState::Started);
    assert_eq!(f.c.get_num_ambient_light_adjustments(), 0);
}

#[test]
fn change_states() {
    let mut f = Setup {
        als_steps: "50.0 -1 -1",
        user_steps: "0.0\n60.0\n100.0",
        ..Setup::default()
    }
    .init();
    f.c.on_ambient_light_reading(0.0);
    assert_eq!(f.level(), 50);

    f.c.set_dimmed_for_inactivity(true);
    assert_eq!(f.level(), dimmed_level());
    assert_eq!(f.interval(), SLOW);
    f.c.set_off_for_inactivity(true);
    assert_eq!(f.level(), 0);
    assert_eq!(f.interval(), SLOW);
    f.c.set_off_for_inactivity(false);
    assert_eq!(f.level(), dimmed_level());
    assert_eq!(f.interval(), SLOW);
    f.c.set_dimmed_for_inactivity(false);
    assert_eq!(f.level(), 50);
    assert_eq!(f.interval(), SLOW);

    // Switch to user control.
    assert!(f.c.increase_user_brightness());
    assert_eq!(f.level(), 100);
    assert_eq!(f.interval(), FAST);

    f.c.set_dimmed_for_inactivity(true);
    assert_eq!(f.level(), dimmed_level());
    assert_eq!(f.interval(), SLOW);
    f.c.set_off_for_inactivity(true);
    assert_eq!(f.level(), 0);
    f.c.set_off_for_inactivity(false);
    assert_eq!(f.level(), dimmed_level());
    f.c.set_dimmed_for_inactivity(false);
    assert_eq!(f.level(), 100);
    assert_eq!(f.interval(), SLOW);
}

#[test]
fn dont_brighten_to_dim() {
    let mut f = Setup {
        als_steps: "2.0 -1 60\n80.0 40 -1",
        initial_level: 2,
        ..Setup::default()
    }
    .init();
    f.c.on_ambient_light_reading(2.0);
    assert_eq!(f.level(), 2);
    assert!(f.level() < dimmed_level());

    f.c.set_dimmed_for_inactivity(true);
    assert_eq!(f.level(), 2);
}

#[test]
fn defer_changes_while_dimmed() {
    let mut f = Setup {
        als_steps: "20.0 -1 60\n80.0 40 -1",
        initial_level: 20,
        ..Setup::default()
    }
    .init();
    f.c.on_ambient_light_reading(20.0);
    assert_eq!(f.level(), 20);

    f.c.set_dimmed_for_inactivity(true);
    assert_eq!(f.level(), dimmed_level());

    f.c.on_ambient_light_reading(80.0);
    f.c.on_ambient_light_reading(80.0);
    assert_eq!(f.level(), dimmed_level());
    assert_eq!(f.c.get_num_ambient_light_adjustments(), 1);

    f.c.set_dimmed_for_inactivity(false);
    assert_eq!(f.level(), 80);
    assert_eq!(f.interval(), SLOW);
}

#[test]
fn initial_user_level() {
    let mut f = Setup {
        initial_level: 15,
        ..Setup::default()
    }
    .init();
    assert_eq!(f.level(), 15);

    // Aligns to 10 first, then steps once.
    assert!(f.c.increase_user_brightness());
    assert_eq!(f.level(), 40);
    assert_eq!(f.interval(), FAST);
}

#[test]
fn initial_als_level() {
    let mut f = Setup {
        als_steps: "0.0 -1 30\n30.0 20 60\n60.0 50 90\n100.0 80 -1",
        initial_level: 55,
        ..Setup::default()
    }
    .init();
    assert_eq!(f.level(), 55);

    f.c.on_ambient_light_reading(85.0);
    assert_eq!(f.level(), 60);
    assert_eq!(f.interval(), SLOW);
}

#[test]
fn increase_brightness() {
    let mut f = Setup {
        initial_level: 0,
        ..Setup::default()
    }
    .init();
    assert_eq!(f.level(), 0);

    for (n, level) in [10, 40, 60, 100].into_iter().enumerate() {
        assert!(f.c.increase_user_brightness());
        assert_eq!(f.level(), level);
        assert_eq!(f.interval(), FAST);
        assert_eq!(f.c.get_num_user_adjustments(), n as u32 + 1);
    }

    // Top step: nothing happens.
    assert!(!f.c.increase_user_brightness());
    assert_eq!(f.level(), 100);
    assert_eq!(f.c.get_num_user_adjustments(), 4);

    f.c.handle_session_state_change(SessionState::Started);
    assert_eq!(f.c.get_num_user_adjustments(), 0);
}

#[test]
fn decrease_brightness() {
    let mut f = Setup {
        initial_level: 100,
        ..Setup::default()
    }
    .init();

    for (n, level) in [60, 40, 10, 0].into_iter().enumerate() {
        assert!(f.c.decrease_user_brightness(true));
        assert_eq!(f.level(), level);
        assert_eq!(f.interval(), FAST);
        assert_eq!(f.c.get_num_user_adjustments(), n as u32 + 1);
    }

    assert!(!f.c.decrease_user_brightness(true));
    assert_eq!(f.level(), 0);
    assert_eq!(f.c.get_num_user_adjustments(), 4);
}

#[test]
fn decrease_without_off_stops_at_lowest_lit_step() {
    let mut f = Setup {
        initial_level: 40,
        ..Setup::default()
    }
    .init();
    assert!(f.c.decrease_user_brightness(false));
    assert_eq!(f.level(), 10);
    assert!(!f.c.decrease_user_brightness(false));
    assert_eq!(f.level(), 10);
    assert_eq!(f.c.get_num_user_adjustments(), 1);
}

#[test]
fn counters_reset_only_when_session_starts() {
    let mut f = Setup::default().init();
    assert!(f.c.increase_user_brightness());
    f.c.handle_session_state_change(SessionState::Stopped);
    f.c.set_dimmed_for_inactivity(true);
    f.c.handle_power_source_change(PowerSource::Battery);
    assert_eq!(f.c.get_num_user_adjustments(), 1);

    f.c.handle_session_state_change(SessionState::Started);
    assert_eq!(f.c.get_num_user_adjustments(), 0);
}

#[test]
fn turn_off_when_suspended() {
    let mut f = Setup {
        no_als_percent: Some(50.0),
        sensor_present: false,
        ..Setup::default()
    }
    .init();
    f.c.set_suspended(true);
    assert_eq!(f.level(), 0);
    assert_eq!(f.interval(), INSTANT);

    f.c.set_suspended(false);
    assert_eq!(f.level(), 50);
    assert_eq!(f.interval(), FAST);
}

#[test]
fn turn_off_when_shutting_down() {
    let mut f = Setup::default().init();
    f.c.set_shutting_down(true);
    assert_eq!(f.level(), 0);
    assert_eq!(f.interval(), INSTANT);
}

#[test]
fn turn_off_when_docked() {
    let mut f = Setup::default().init();
    f.c.set_docked(true);
    assert_eq!(f.level(), 0);
    assert_eq!(f.interval(), INSTANT);
    f.c.set_docked(false);
    assert_eq!(f.level(), 50);
    assert_eq!(f.interval(), INSTANT);
}

#[test]
fn turn_off_when_lid_closed() {
    let mut f = Setup {
        lid_state: LidState::Open,
        ..Setup::default()
    }
    .init();
    assert_eq!(f.level(), 50);

    f.c.handle_lid_state_change(LidState::Closed);
    assert_eq!(f.level(), 0);
    assert_eq!(f.interval(), INSTANT);

    // Accepted, but the backlight stays off.
    assert!(f.c.increase_user_brightness());
    assert_eq!(f.level(), 0);
    assert_eq!(f.c.get_num_user_adjustments(), 1);

    f.c.handle_lid_state_change(LidState::Open);
    assert_eq!(f.level(), 10);
}

#[test]
fn turn_off_when_display_backlight_is_off() {
    let mut f = Setup {
        als_steps: "50.0 -1 -1",
        user_steps: "0.0\n100.0",
        ..Setup::default()
    }
    .init();
    f.c.on_ambient_light_reading(100.0);

    f.c.on_sibling_brightness_change(10.0, BrightnessChangeCause::UserRequest);
    assert_eq!(f.level(), 50);

    f.c.on_sibling_brightness_change(0.0, BrightnessChangeCause::UserRequest);
    assert_eq!(f.level(), 0);
    assert_eq!(f.interval(), SLOW);

    f.c.on_sibling_brightness_change(20.0, BrightnessChangeCause::UserRequest);
    assert_eq!(f.level(), 50);
    assert_eq!(f.interval(), SLOW);

    // Not once the user is in control.
    assert!(f.c.increase_user_brightness());
    assert_eq!(f.level(), 100);
    f.c.on_sibling_brightness_change(0.0, BrightnessChangeCause::UserRequest);
    assert_eq!(f.level(), 100);
}

#[test]
fn hover() {
    let mut f = Setup {
        als_steps: "50.0 -1 -1",
        user_steps: "0.0\n100.0",
        detect_hover: true,
        keep_on_ms: 30000,
        keep_on_during_video_ms: 3000,
        ..Setup::default()
    }
    .init();
    f.c.handle_session_state_change(SessionState::Started);
    f.c.on_ambient_light_reading(0.0);

    // Off until the user hovers.
    assert_eq!(f.level(), 0);

    f.c.handle_hover_state_change(true);
    assert_eq!(f.level(), 50);
    assert_eq!(f.interval(), FAST);

    // Hovering beats fullscreen video.
    f.c.handle_video_activity(true);
    assert_eq!(f.level(), 50);

    // Short grace period while video plays.
    f.c.handle_hover_state_change(false);
    assert_eq!(f.level(), 50);

    f.advance(3000);
    assert_eq!(f.c.run_due_timers(), 1);
    assert_eq!(f.level(), 0);
    assert_eq!(f.interval(), SLOW);

    // Video stops while the user was hovering recently.
    assert!(f.c.fire_video_timer());
    assert_eq!(f.level(), 50);
    assert_eq!(f.interval(), FAST);

    // The rest of the full window.
    f.advance(27000);
    assert_eq!(f.c.run_due_timers(), 1);
    assert_eq!(f.level(), 0);
    assert_eq!(f.interval(), SLOW);

    // User activity keeps it on for the full window too.
    f.c.handle_user_activity(UserActivityType::Other);
    assert_eq!(f.level(), 50);
    assert_eq!(f.interval(), FAST);
    f.advance(30000);
    assert_eq!(f.c.run_due_timers(), 1);
    assert_eq!(f.level(), 0);
    assert_eq!(f.interval(), SLOW);

    // User control: hover restores the chosen step over dimming and off.
    assert!(f.c.increase_user_brightness());
    assert_eq!(f.level(), 100);
    f.c.set_dimmed_for_inactivity(true);
    assert_eq!(f.level(), dimmed_level());
    f.c.handle_hover_state_change(true);
    assert_eq!(f.level(), 100);
    assert_eq!(f.interval(), FAST);

    f.c.set_off_for_inactivity(true);
    assert_eq!(f.level(), 100);

    f.c.handle_hover_state_change(false);
    assert_eq!(f.level(), 0);
    assert_eq!(f.interval(), SLOW);
    f.c.handle_hover_state_change(true);
    assert_eq!(f.level(), 100);
    assert_eq!(f.interval(), FAST);

    f.c.set_shutting_down(true);
    assert_eq!(f.level(), 0);
    assert_eq!(f.interval(), INSTANT);
}

#[test]
fn hover_overrides_off_for_inactivity() {
    let mut f = Setup {
        als_steps: "50.0 -1 -1",
        detect_hover: true,
        keep_on_ms: 30000,
        ..Setup::default()
    }
    .init();
    f.c.on_ambient_light_reading(0.0);
    f.c.handle_hover_state_change(true);
    f.c.handle_hover_state_change(false);
    assert_eq!(f.level(), 50);

    f.c.set_off_for_inactivity(true);
    assert_eq!(f.level(), 0);

    f.c.handle_hover_state_change(true);
    assert_eq!(f.level(), 50);
    assert_eq!(f.interval(), FAST);

    f.c.handle_hover_state_change(false);
    assert_eq!(f.level(), 0);
    assert_eq!(f.interval(), SLOW);
}

#[test]
fn hover_ignored_unless_detection_enabled() {
    let mut f = Setup::default().init();
    f.c.handle_hover_state_change(true);
    assert!(!f.c.signals().hovering);
    assert_eq!(f.c.next_timer_deadline(), None);
}

#[test]
fn video_shortens_running_keep_on_window() {
    let mut f = Setup {
        als_steps: "50.0 -1 -1",
        detect_hover: true,
        keep_on_ms: 30000,
        keep_on_during_video_ms: 3000,
        ..Setup::default()
    }
    .init();
    f.c.handle_session_state_change(SessionState::Started);
    f.c.on_ambient_light_reading(0.0);
    f.c.handle_hover_state_change(true);
    f.c.handle_hover_state_change(false);
    let hover_stop = f.clock.now();

    f.advance(1000);
    f.c.handle_video_activity(true);
    assert_eq!(f.level(), 50);
    assert_eq!(
        f.c.next_timer_deadline(),
        Some(hover_stop + Duration::from_millis(3000))
    );

    f.advance(2000);
    assert_eq!(f.c.run_due_timers(), 1);
    assert_eq!(f.level(), 0);
    assert_eq!(f.interval(), SLOW);
}

#[test]
fn keep_on_timer_only_turns_off_when_due() {
    let mut f = Setup {
        als_steps: "50.0 -1 -1",
        detect_hover: true,
        keep_on_ms: 30000,
        ..Setup::default()
    }
    .init();
    f.c.on_ambient_light_reading(0.0);
    f.c.handle_hover_state_change(true);
    f.c.handle_hover_state_change(false);
    assert_eq!(f.level(), 50);

    f.advance(29999);
    assert_eq!(f.c.run_due_timers(), 0);
    assert_eq!(f.level(), 50);

    // Firing early re-checks the window and stays on.
    assert!(f.c.fire_turn_off_timer());
    assert_eq!(f.level(), 50);

    f.advance(1);
    assert_eq!(f.c.run_due_timers(), 1);
    assert_eq!(f.level(), 0);
    assert_eq!(f.interval(), SLOW);
    assert!(!f.c.fire_turn_off_timer());
}

#[test]
fn rearmed_keep_on_voids_earlier_deadline() {
    let mut f = Setup {
        sensor_present: false,
        turn_on_for_user_activity: true,
        keep_on_ms: 30000,
        ..Setup::default()
    }
    .init();
    f.c.handle_user_activity(UserActivityType::Other);
    assert_eq!(f.level(), 40);

    f.advance(20000);
    f.c.handle_user_activity(UserActivityType::BrightnessUpKey);
    f.advance(15000);
    assert_eq!(f.c.run_due_timers(), 0);
    assert_eq!(f.level(), 40);

    f.advance(15000);
    assert_eq!(f.c.run_due_timers(), 1);
    assert_eq!(f.level(), 0);
}

#[test]
fn no_ambient_light_sensor() {
    let mut f = Setup {
        initial_level: 0,
        no_als_percent: Some(40.0),
        user_steps: "0.0\n50.0\n100.0",
        sensor_present: false,
        ..Setup::default()
    }
    .init();

    // Applied right away from the preference.
    assert_eq!(f.level(), 40);
    assert_eq!(f.interval(), SLOW);

    assert!(f.c.increase_user_brightness());
    assert_eq!(f.level(), 100);
    assert!(f.c.decrease_user_brightness(true));
    assert_eq!(f.level(), 50);

    // Readings without a sensor go nowhere.
    f.c.on_ambient_light_reading(1000.0);
    assert_eq!(f.level(), 50);
}

#[test]
fn enable_for_user_activity() {
    let mut f = Setup {
        no_als_percent: Some(40.0),
        user_steps: "0.0\n100.0",
        turn_on_for_user_activity: true,
        keep_on_ms: 30000,
        sensor_present: false,
        ..Setup::default()
    }
    .init();

    assert_eq!(f.level(), 0);
    assert_eq!(f.interval(), SLOW);

    f.c.handle_user_activity(UserActivityType::Other);
    assert_eq!(f.level(), 40);
    assert_eq!(f.interval(), FAST);

    f.advance(15000);
    f.c.handle_user_activity(UserActivityType::Other);
    assert_eq!(f.level(), 40);

    f.advance(30000);
    assert_eq!(f.c.run_due_timers(), 1);
    assert_eq!(f.level(), 0);
    assert_eq!(f.interval(), SLOW);
}

#[test]
fn preempt_transition_for_shutdown() {
    let mut f = Setup::default().init();

    // Display turned off, as happens when shutting down.
    f.c.on_sibling_brightness_change(0.0, BrightnessChangeCause::Other);
    assert_eq!(f.level(), 0);
    assert_eq!(f.interval(), SLOW);

    // The slow ramp is still running; shutdown must replace it.
    f.c.backlight_mut().transition_in_progress = true;
    f.c.set_shutting_down(true);
    assert_eq!(f.level(), 0);
    assert_eq!(f.interval(), INSTANT);
}

#[test]
fn turn_off_when_in_tablet_mode() {
    let mut f = Setup {
        initial_level: 100,
        no_als_percent: Some(100.0),
        sensor_present: false,
        tablet_mode: TabletMode::On,
        ..Setup::default()
    }
    .init();
    assert_eq!(f.level(), 0);
    assert_eq!(f.interval(), SLOW);

    f.c.handle_tablet_mode_change(TabletMode::Off);
    assert_eq!(f.level(), 100);
    assert_eq!(f.interval(), FAST);

    f.c.handle_tablet_mode_change(TabletMode::On);
    assert_eq!(f.level(), 0);
    assert_eq!(f.interval(), FAST);
}

#[test]
fn forced_off() {
    let mut f = Setup::default().init();
    assert!(f.level() > 0);

    f.c.set_forced_off(true);
    assert!(f.c.get_forced_off());
    assert_eq!(f.level(), 0);
    assert_eq!(f.interval(), INSTANT);

    f.c.set_forced_off(false);
    assert!(!f.c.get_forced_off());
    assert!(f.level() > 0);
    assert_eq!(f.interval(), INSTANT);
}

#[test]
fn change_backlight_device() {
    let mut f = Setup {
        user_steps: "0.0\n50.0\n100.0",
        sensor_present: false,
        no_als_percent: Some(50.0),
        device_exists: false,
        ..Setup::default()
    }
    .init();
    assert!(!f.c.increase_user_brightness());
    assert_eq!(f.c.get_num_user_adjustments(), 0);
    f.c.set_off_for_inactivity(true);

    // Earlier off state lands on the new device.
    f.swap_device(true, 100, 50);
    assert_eq!(f.level(), 0);

    f.c.set_off_for_inactivity(false);
    assert_eq!(f.level(), 50);
    assert!(f.c.increase_user_brightness());
    assert!(!f.c.increase_user_brightness());
    assert_eq!(f.level(), 100);
    assert_eq!(f.c.get_num_user_adjustments(), 1);

    // Requests while disconnected are dropped.
    f.swap_device(false, 100, 100);
    assert!(!f.c.decrease_user_brightness(true));
    assert_eq!(f.c.get_num_user_adjustments(), 1);
    assert_eq!(f.c.get_brightness_percent(), None);

    // 100% carries over to a device with a different range.
    f.swap_device(true, 200, 100);
    assert_eq!(f.level(), 200);
    assert_eq!(f.c.get_brightness_percent(), Some(100.0));
}

#[test]
fn late_device_waits_for_first_reading() {
    let mut f = Setup {
        device_exists: false,
        ..Setup::default()
    }
    .init();
    f.swap_device(true, 100, 50);
    assert_eq!(f.level(), 50);
    assert_eq!(f.c.backlight().writes, 0);
    assert_eq!(f.changes(), vec![]);

    f.c.on_ambient_light_reading(80.0);
    assert_eq!(f.level(), 75);
    assert_eq!(f.changes(), vec![(75.0, BrightnessChangeCause::AmbientLight)]);
}

#[test]
fn observers_hear_why_the_display_turned_off() {
    let mut f = Setup {
        sensor_present: false,
        ..Setup::default()
    }
    .init();
    f.changes();
    f.c.on_sibling_brightness_change(0.0, BrightnessChangeCause::UserRequest);
    assert_eq!(f.level(), 0);
    assert_eq!(f.changes(), vec![(0.0, BrightnessChangeCause::UserRequest)]);
}

#[test]
fn observers_get_one_tagged_change_per_apply() {
    let mut f = Setup {
        initial_level: 20,
        ..Setup::default()
    }
    .init();
    f.c.on_ambient_light_reading(25.0);
    assert_eq!(f.changes(), vec![]);

    f.c.on_ambient_light_reading(80.0);
    f.c.on_ambient_light_reading(80.0);
    assert_eq!(f.changes(), vec![(75.0, BrightnessChangeCause::AmbientLight)]);

    assert!(f.c.increase_user_brightness());
    assert_eq!(f.changes(), vec![(100.0, BrightnessChangeCause::UserRequest)]);

    // Nothing changed, nothing sent.
    f.c.set_dimmed_for_inactivity(false);
    f.c.handle_user_activity(UserActivityType::Other);
    assert_eq!(f.changes(), vec![]);

    f.c.set_shutting_down(true);
    let changes: Vec<_> = f.changes.try_iter().collect();
    assert_eq!(
        changes,
        vec![BrightnessChange {
            percent: 0.0,
            cause: BrightnessChangeCause::Other,
            source: KEYBOARD,
        }]
    );
}

#[test]
fn external_level_change_hands_control_to_user() {
    let mut f = Setup::default().init();
    f.c.handle_external_level_change(100);
    assert_eq!(f.c.signals().source, BrightnessSource::User);
    assert_eq!(f.c.get_num_user_adjustments(), 1);
    assert_eq!(f.c.get_brightness_percent(), Some(100.0));
    assert_eq!(f.changes(), vec![(100.0, BrightnessChangeCause::UserRequest)]);

    // Same level again is not a change.
    f.c.handle_external_level_change(100);
    assert_eq!(f.c.get_num_user_adjustments(), 1);

    assert!(f.c.decrease_user_brightness(false));
    assert_eq!(f.level(), 60);
}

#[test]
fn policy_reset_returns_to_ambient_light() {
    let mut f = Setup {
        als_steps: "50.0 -1 -1",
        user_steps: "0.0\n100.0",
        ..Setup::default()
    }
    .init();
    f.c.on_ambient_light_reading(10.0);
    assert!(f.c.increase_user_brightness());
    f.c.on_sibling_brightness_change(0.0, BrightnessChangeCause::Other);
    assert_eq!(f.level(), 100);

    f.c.handle_policy_change(&Policy::default());
    assert_eq!(f.level(), 100);

    f.c.handle_policy_change(&Policy {
        reset_user_brightness: true,
    });
    assert!(f.c.signals().using_ambient_light());
    assert_eq!(f.level(), 0);
    assert_eq!(f.interval(), FAST);
}

#[test]
fn ambient_adjustments_not_counted_under_user_control() {
    let mut f = Setup {
        initial_level: 20,
        ..Setup::default()
    }
    .init();
    f.c.on_ambient_light_reading(25.0);
    assert!(f.c.increase_user_brightness());
    f.c.on_ambient_light_reading(80.0);
    f.c.on_ambient_light_reading(80.0);
    assert_eq!(f.c.get_num_ambient_light_adjustments(), 0);
    assert_eq!(f.level(), 40);
}

#[test]
fn unsubscribed_observer_hears_nothing() {
    let mut f = Setup::default().init();
    let (tx, rx) = channel();
    let id = f.c.subscribe(tx);
    assert!(f.c.unsubscribe(id));
    f.c.set_shutting_down(true);
    assert!(rx.try_recv().is_err());
    assert_eq!(f.c.id(), KEYBOARD);
}
