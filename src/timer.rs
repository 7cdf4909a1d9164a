//! Keep-on timers.
//!
//! Timers here never run anything by themselves. They only remember a
//! deadline; whoever owns the event loop asks for [`KeepOn::next_deadline`]
//! and hands due timers back to the controller. Re-arming replaces the
//! deadline, so a superseded arming can never fire.

use std::time::{Duration, Instant};

use smallvec::SmallVec;

/// Fullscreen video is considered stopped this long after the last report.
pub const VIDEO_TIMEOUT: Duration = Duration::from_millis(7000);

/// Source of the current time.
pub trait Clock: std::fmt::Debug {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OneShotTimer {
    due: Option<Instant>,
}

impl OneShotTimer {
    pub fn arm(&mut self, due: Instant) {
        self.due = Some(due);
    }

    pub fn cancel(&mut self) {
        self.due = None;
    }

    pub fn is_armed(&self) -> bool {
        self.due.is_some()
    }

    pub fn due(&self) -> Option<Instant> {
        self.due
    }

    /// Disarm and return `true` if due at `now`.
    pub fn take_if_due(&mut self, now: Instant) -> bool {
        if self.due.is_some_and(|due| due <= now) {
            self.due = None;
            true
        } else {
            false
        }
    }

    /// Disarm and return whether it was armed.
    pub fn take(&mut self) -> bool {
        self.due.take().is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeepOnTimer {
    /// Fullscreen video reports stopped arriving.
    Video,
    /// The keep-on window after hover or user activity ran out.
    TurnOff,
}

/// Whether recent hover/activity keeps the backlight on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepOnStatus {
    /// Neither hover detection nor turn-on-for-activity is enabled.
    Disabled,
    Active,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepOnConfig {
    pub detect_hover: bool,
    pub turn_on_for_user_activity: bool,
    pub keep_on: Duration,
    pub keep_on_during_video: Duration,
}

#[derive(Debug, Clone)]
pub struct KeepOn {
    config: KeepOnConfig,
    last_hover: Option<Instant>,
    last_user_activity: Option<Instant>,
    video: OneShotTimer,
    turn_off: OneShotTimer,
}

impl KeepOn {
    pub fn new(config: KeepOnConfig) -> Self {
        Self {
            config,
            last_hover: None,
            last_user_activity: None,
            video: OneShotTimer::default(),
            turn_off: OneShotTimer::default(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.config.detect_hover || self.config.turn_on_for_user_activity
    }

    pub fn detect_hover(&self) -> bool {
        self.config.detect_hover
    }

    fn delay(&self, video: bool) -> Duration {
        if video {
            self.config.keep_on_during_video
        } else {
            self.config.keep_on
        }
    }

    /// Start of the current keep-on window, if any.
    fn window_start(&self) -> Option<Instant> {
        self.last_hover.max(self.last_user_activity)
    }

    pub fn status(&self, now: Instant, hovering: bool, video: bool) -> KeepOnStatus {
        if !self.enabled() {
            return KeepOnStatus::Disabled;
        }
        if hovering {
            return KeepOnStatus::Active;
        }
        let delay = self.delay(video);
        let recent =
            |at: Option<Instant>| at.is_some_and(|at| now.saturating_duration_since(at) < delay);
        if recent(self.last_hover) || recent(self.last_user_activity) {
            KeepOnStatus::Active
        } else {
            KeepOnStatus::Expired
        }
    }

    pub fn hover_started(&mut self) {
        self.last_hover = None;
        self.turn_off.cancel();
    }

    pub fn hover_stopped(&mut self, now: Instant) {
        self.last_hover = Some(now);
    }

    pub fn user_active(&mut self, now: Instant) {
        self.last_user_activity = Some(now);
    }

    /// Arm the turn-off timer for whatever is left of the keep-on window.
    pub fn rearm_turn_off(&mut self, now: Instant, hovering: bool, video: bool) {
        if !self.enabled() {
            return;
        }
        self.turn_off.cancel();
        if hovering {
            return;
        }
        let Some(start) = self.window_start() else {
            return;
        };
        let elapsed = now.saturating_duration_since(start);
        if let Some(remaining) = self.delay(video).checked_sub(elapsed) {
            if !remaining.is_zero() {
                self.turn_off.arm(now + remaining);
            }
        }
    }

    pub fn arm_video(&mut self, now: Instant) {
        self.video.arm(now + VIDEO_TIMEOUT);
    }

    pub fn cancel_video(&mut self) {
        self.video.cancel();
    }

    pub fn is_armed(&self, timer: KeepOnTimer) -> bool {
        match timer {
            KeepOnTimer::Video => self.video.is_armed(),
            KeepOnTimer::TurnOff => self.turn_off.is_armed(),
        }
    }

    /// Disarm `timer` regardless of its deadline. Returns whether it was armed.
    pub fn take(&mut self, timer: KeepOnTimer) -> bool {
        match timer {
            KeepOnTimer::Video => self.video.take(),
            KeepOnTimer::TurnOff => self.turn_off.take(),
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        [self.video.due(), self.turn_off.due()]
            .into_iter()
            .flatten()
            .min()
    }

    /// Disarm and return every timer due at `now`, video first.
    pub fn take_due(&mut self, now: Instant) -> SmallVec<[KeepOnTimer; 2]> {
        let mut due = SmallVec::new();
        if self.video.take_if_due(now) {
            due.push(KeepOnTimer::Video);
        }
        if self.turn_off.take_if_due(now) {
            due.push(KeepOnTimer::TurnOff);
        }
        due
    }
}
