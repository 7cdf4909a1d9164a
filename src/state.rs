//! Implements current state

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PowerSource {
    #[default]
    Ac,
    Battery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DisplayMode {
    #[default]
    Normal,
    Presentation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Stopped,
    Started,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LidState {
    Open,
    Closed,
    #[default]
    NotPresent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TabletMode {
    On,
    Off,
    #[default]
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserActivityType {
    Other,
    BrightnessUpKey,
    BrightnessDownKey,
    VolumeUpKey,
    VolumeDownKey,
    VolumeMuteKey,
}

/// Where the undimmed brightness comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrightnessSource {
    /// Steps chosen by the ambient light sensor.
    AmbientLight,
    /// No sensor: a fixed configured percent.
    Fixed,
    /// The user took over with increase/decrease requests.
    User,
}

impl BrightnessSource {
    /// Ambient light or fixed, i.e. not chosen by the user.
    pub fn is_automatic(self) -> bool {
        !matches!(self, BrightnessSource::User)
    }
}

/// Every input the arbitration looks at. Each field has exactly one writer.
#[derive(Debug, Clone)]
pub struct Signals {
    pub power_source: PowerSource,
    pub display_mode: DisplayMode,
    pub session_state: SessionState,
    pub dimmed_for_inactivity: bool,
    pub off_for_inactivity: bool,
    pub suspended: bool,
    pub shutting_down: bool,
    pub docked: bool,
    pub forced_off: bool,
    pub lid_state: LidState,
    pub tablet_mode: TabletMode,
    pub hovering: bool,
    pub fullscreen_video_playing: bool,
    pub sibling_display_brightness_is_zero: bool,
    pub source: BrightnessSource,
}

impl Signals {
    pub fn new(source: BrightnessSource, lid_state: LidState, tablet_mode: TabletMode) -> Self {
        Self {
            power_source: PowerSource::default(),
            display_mode: DisplayMode::default(),
            session_state: SessionState::default(),
            dimmed_for_inactivity: false,
            off_for_inactivity: false,
            suspended: false,
            shutting_down: false,
            docked: false,
            forced_off: false,
            lid_state,
            tablet_mode,
            hovering: false,
            fullscreen_video_playing: false,
            sibling_display_brightness_is_zero: false,
            source,
        }
    }

    pub fn using_ambient_light(&self) -> bool {
        self.source == BrightnessSource::AmbientLight
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub ambient_light_adjustments: u32,
    pub user_adjustments: u32,
}

impl Counters {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
