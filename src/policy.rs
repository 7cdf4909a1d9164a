//! This module computes the brightness to apply.
//!
//! Every reason to override the undimmed brightness is a [`Suppression`].
//! They are collected in strict priority order and the first one wins.

use smallvec::SmallVec;

use crate::{
    device::Transition,
    state::{LidState, Signals, TabletMode},
    steps::DIM_PERCENT,
    timer::KeepOnStatus,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Suppression {
    ShuttingDown,
    ForcedOff,
    Docked,
    LidClosed,
    TabletMode,
    Suspended,
    OffForInactivity,
    DimmedForInactivity,
    FullscreenVideo,
    /// Hover/activity keep-on window ran out.
    KeepOnExpired,
    /// The sibling display backlight is at zero.
    DisplayOff,
}

impl Suppression {
    pub fn percent(self, undimmed: f64) -> f64 {
        match self {
            // Never brighten to dim.
            Suppression::DimmedForInactivity => DIM_PERCENT.min(undimmed),
            _ => 0.0,
        }
    }

    /// Transition forced by this reason, overriding the one of the triggering
    /// event.
    pub fn natural_transition(self) -> Option<Transition> {
        match self {
            Suppression::ShuttingDown
            | Suppression::ForcedOff
            | Suppression::Docked
            | Suppression::LidClosed
            | Suppression::Suspended => Some(Transition::Instant),
            Suppression::TabletMode
            | Suppression::OffForInactivity
            | Suppression::DimmedForInactivity
            | Suppression::FullscreenVideo
            | Suppression::KeepOnExpired
            | Suppression::DisplayOff => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PolicyInput<'a> {
    pub signals: &'a Signals,
    pub undimmed_percent: f64,
    pub keep_on: KeepOnStatus,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub percent: f64,
    pub reason: Option<Suppression>,
    pub transition: Option<Transition>,
}

/// All reasons that currently apply, highest priority first.
pub fn active_suppressions(input: &PolicyInput<'_>) -> SmallVec<[Suppression; 4]> {
    let s = input.signals;
    let mut active = SmallVec::new();
    let mut push = |cond: bool, reason| {
        if cond {
            active.push(reason);
        }
    };

    push(s.shutting_down, Suppression::ShuttingDown);
    push(s.forced_off, Suppression::ForcedOff);
    push(s.docked, Suppression::Docked);
    push(s.lid_state == LidState::Closed, Suppression::LidClosed);
    push(s.tablet_mode == TabletMode::On, Suppression::TabletMode);
    push(s.suspended, Suppression::Suspended);
    push(
        s.off_for_inactivity && !s.hovering,
        Suppression::OffForInactivity,
    );
    push(
        s.dimmed_for_inactivity && !s.hovering,
        Suppression::DimmedForInactivity,
    );
    if s.source.is_automatic() {
        push(
            s.fullscreen_video_playing && input.keep_on != KeepOnStatus::Active,
            Suppression::FullscreenVideo,
        );
        push(
            input.keep_on == KeepOnStatus::Expired,
            Suppression::KeepOnExpired,
        );
        push(
            s.sibling_display_brightness_is_zero,
            Suppression::DisplayOff,
        );
    }
    active
}

pub fn decide(input: &PolicyInput<'_>) -> Decision {
    match active_suppressions(input).first() {
        Some(&reason) => Decision {
            percent: reason.percent(input.undimmed_percent),
            reason: Some(reason),
            transition: reason.natural_transition(),
        },
        None => Decision {
            percent: input.undimmed_percent,
            reason: None,
            transition: None,
        },
    }
}
