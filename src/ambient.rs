//! Ambient light driven step selection with hysteresis.

use log::{debug, info};

use crate::steps::AmbientStepTable;

/// Number of consecutive readings needed before a step change is committed.
const HYSTERESIS_THRESHOLD: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hysteresis {
    /// No reading seen yet; the next valid one reports the current step.
    Immediate,
    Stable,
    Pending { direction: Direction, count: u32 },
}

/// What a reading changed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AmbientLightUpdate {
    /// First reading: the step chosen at startup should now be applied.
    Initial { percent: f64 },
    /// The selected step moved.
    Step { from: usize, to: usize, percent: f64 },
}

impl AmbientLightUpdate {
    pub fn percent(&self) -> f64 {
        match *self {
            AmbientLightUpdate::Initial { percent } | AmbientLightUpdate::Step { percent, .. } => {
                percent
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct AmbientLightArbiter {
    table: AmbientStepTable,
    index: usize,
    hysteresis: Hysteresis,
}

impl AmbientLightArbiter {
    /// Start at the step closest to the hardware's current percent so that
    /// startup doesn't jump. Without a known percent, start at the top step.
    pub fn new(table: AmbientStepTable, current_percent: Option<f64>) -> Self {
        let index = match current_percent {
            Some(percent) => table.nearest_index(percent),
            None => table.len().saturating_sub(1),
        };
        debug!("Initial ALS step {index} for current brightness {current_percent:?}");
        Self {
            table,
            index,
            hysteresis: Hysteresis::Immediate,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn percent(&self) -> f64 {
        self.table.get(self.index).map_or(100.0, |e| e.percent)
    }

    /// Feed a smoothed lux reading.
    pub fn on_reading(&mut self, lux: f64) -> Option<AmbientLightUpdate> {
        if !lux.is_finite() || lux < 0.0 {
            debug!("Ignoring invalid ALS reading {lux}");
            return None;
        }

        let initial = (self.hysteresis == Hysteresis::Immediate).then(|| {
            self.hysteresis = Hysteresis::Stable;
            AmbientLightUpdate::Initial {
                percent: self.percent(),
            }
        });

        let Some((direction, target)) = self.wanted_move(lux) else {
            self.hysteresis = Hysteresis::Stable;
            return initial;
        };

        let count = match self.hysteresis {
            Hysteresis::Pending {
                direction: pending,
                count,
            } if pending == direction => count + 1,
            _ => 1,
        };
        if count < HYSTERESIS_THRESHOLD {
            self.hysteresis = Hysteresis::Pending { direction, count };
            return initial;
        }

        let from = self.index;
        self.index = target;
        self.hysteresis = Hysteresis::Stable;
        info!(
            "ALS step {from} -> {target} ({}%) at {lux} lux",
            self.percent()
        );
        Some(AmbientLightUpdate::Step {
            from,
            to: target,
            percent: self.percent(),
        })
    }

    /// Direction and destination step if `lux` is outside the current step.
    /// The destination is the furthest step in that direction that accepts
    /// `lux`, so several steps may be skipped at once.
    fn wanted_move(&self, lux: f64) -> Option<(Direction, usize)> {
        let current = self.table.get(self.index)?;
        if current.contains(lux) {
            return None;
        }
        let entries = self.table.entries();
        if current.lux_upper_bound.is_some_and(|upper| lux > upper) {
            let target = (self.index + 1..entries.len())
                .rev()
                .find(|&idx| entries[idx].contains(lux))?;
            Some((Direction::Up, target))
        } else {
            let target = (0..self.index).find(|&idx| entries[idx].contains(lux))?;
            Some((Direction::Down, target))
        }
    }
}
