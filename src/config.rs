//! Parsed preferences consumed by the controller.

use std::time::Duration;

use crate::{
    steps::{AmbientStepTable, UserStepTable},
    timer::KeepOnConfig,
};

pub const DEFAULT_KEEP_ON: Duration = Duration::from_millis(30000);
pub const DEFAULT_KEEP_ON_DURING_VIDEO: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone)]
pub struct Prefs {
    pub user_steps: UserStepTable,
    pub als_steps: AmbientStepTable,
    /// Brightness without a light sensor. Defaults to the top user step.
    pub no_als_percent: Option<f64>,
    pub detect_hover: bool,
    pub turn_on_for_user_activity: bool,
    pub keep_on: Duration,
    pub keep_on_during_video: Duration,
}

impl Prefs {
    pub fn no_als_percent(&self) -> f64 {
        self.no_als_percent
            .map_or_else(|| self.user_steps.last(), |p| p.clamp(0.0, 100.0))
    }

    pub fn keep_on_config(&self) -> KeepOnConfig {
        KeepOnConfig {
            detect_hover: self.detect_hover,
            turn_on_for_user_activity: self.turn_on_for_user_activity,
            keep_on: self.keep_on,
            keep_on_during_video: self.keep_on_during_video,
        }
    }
}

impl Default for Prefs {
    fn default() -> Self {
        Self {
            user_steps: UserStepTable::default(),
            als_steps: AmbientStepTable::default(),
            no_als_percent: None,
            detect_hover: false,
            turn_on_for_user_activity: false,
            keep_on: DEFAULT_KEEP_ON,
            keep_on_during_video: DEFAULT_KEEP_ON_DURING_VIDEO,
        }
    }
}
