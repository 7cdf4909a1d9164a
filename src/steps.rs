//! Brightness step tables
//!
//! Two flavours exist: ambient light tables, where every step carries the lux
//! range it is valid for, and user tables, which are just an ordered list of
//! percents the user can step through.

use log::warn;
use snafu::prelude::*;

use crate::errors::{
    DeadZoneSnafu, InvalidRangeSnafu, NoNonZeroStepSnafu, NotIncreasingSnafu, StepTableError,
};

/// Brightness used when dimmed for inactivity. Also the middle built-in user step.
pub const DIM_PERCENT: f64 = 10.0;

/// A single ambient light step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepEntry {
    pub percent: f64,
    /// `None` means unbounded below.
    pub lux_lower_bound: Option<f64>,
    /// `None` means unbounded above.
    pub lux_upper_bound: Option<f64>,
}

impl StepEntry {
    pub fn new(percent: f64, lux_lower_bound: Option<f64>, lux_upper_bound: Option<f64>) -> Self {
        Self {
            percent,
            lux_lower_bound,
            lux_upper_bound,
        }
    }

    /// Is `lux` inside this step's (inclusive) bounds?
    pub fn contains(&self, lux: f64) -> bool {
        self.lux_lower_bound.is_none_or(|lower| lux >= lower)
            && self.lux_upper_bound.is_none_or(|upper| lux <= upper)
    }
}

/// Clamp to [0, 100], complaining if that changed anything.
fn clamp_percent(percent: f64) -> f64 {
    let clamped = percent.clamp(0.0, 100.0);
    if clamped != percent {
        warn!("Clamping step {percent}% to {clamped}%");
    }
    clamped
}

/// Split a table into entry lines. Newlines and `;` both separate entries.
fn entry_lines(input: &str) -> impl Iterator<Item = &str> {
    input
        .split(['\n', ';'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
}

/// Lux bound, where a negative value means unbounded.
fn parse_bound(field: &str) -> Option<Option<f64>> {
    let value: f64 = field.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some((value >= 0.0).then_some(value))
}

/// Index of the first percent closest to `percent`.
fn nearest(percents: impl Iterator<Item = f64>, percent: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, step) in percents.enumerate() {
        let delta = (percent - step).abs();
        if best.is_none_or(|(_, best_delta)| delta < best_delta) {
            best = Some((idx, delta));
        }
    }
    best.map(|(idx, _)| idx)
}

fn check_increasing(percents: impl Iterator<Item = f64>) -> Result<(), StepTableError> {
    let mut previous: Option<f64> = None;
    for next in percents {
        if let Some(previous) = previous {
            ensure!(next > previous, NotIncreasingSnafu { previous, next });
        }
        previous = Some(next);
    }
    Ok(())
}

/// Steps selected by the ambient light sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct AmbientStepTable {
    entries: Vec<StepEntry>,
}

impl AmbientStepTable {
    /// Validate and build a table.
    pub fn new(entries: Vec<StepEntry>) -> Result<Self, StepTableError> {
        if entries.is_empty() {
            return Ok(Self::default());
        }
        check_increasing(entries.iter().map(|e| e.percent))?;

        let last = entries.len() - 1;
        for (index, entry) in entries.iter().enumerate() {
            // Only the outermost bounds may be open.
            let lower_ok = (index == 0) == entry.lux_lower_bound.is_none();
            let upper_ok = (index == last) == entry.lux_upper_bound.is_none();
            let ordered = match (entry.lux_lower_bound, entry.lux_upper_bound) {
                (Some(lower), Some(upper)) => lower <= upper,
                _ => true,
            };
            ensure!(
                lower_ok && upper_ok && ordered,
                InvalidRangeSnafu {
                    index,
                    percent: entry.percent
                }
            );
        }
        for (index, pair) in entries.windows(2).enumerate() {
            if let (Some(upper), Some(lower)) = (pair[0].lux_upper_bound, pair[1].lux_lower_bound) {
                ensure!(upper >= lower, DeadZoneSnafu { index, upper, lower });
            }
        }
        Ok(Self { entries })
    }

    /// Parse lines of `<percent> <lower lux> <upper lux>`, `-1` meaning
    /// unbounded. Bad lines are skipped.
    pub fn parse(input: &str) -> Result<Self, StepTableError> {
        let mut entries = vec![];
        for line in entry_lines(input) {
            match Self::parse_line(line) {
                Some(entry) => entries.push(entry),
                None => warn!("Skipping invalid ALS step \"{line}\""),
            }
        }
        if entries.is_empty() {
            warn!("No usable ALS steps, using built-in default");
        }
        Self::new(entries)
    }

    fn parse_line(line: &str) -> Option<StepEntry> {
        let mut fields = line.split_whitespace();
        let percent: f64 = fields.next()?.parse().ok()?;
        if !percent.is_finite() {
            return None;
        }
        let lower = parse_bound(fields.next()?)?;
        let upper = parse_bound(fields.next()?)?;
        if fields.next().is_some() {
            return None;
        }
        Some(StepEntry::new(clamp_percent(percent), lower, upper))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&StepEntry> {
        self.entries.get(idx)
    }

    pub fn entries(&self) -> &[StepEntry] {
        &self.entries
    }

    /// Step whose percent is closest to `percent`.
    pub fn nearest_index(&self, percent: f64) -> usize {
        nearest(self.entries.iter().map(|e| e.percent), percent).unwrap_or(0)
    }
}

impl Default for AmbientStepTable {
    fn default() -> Self {
        Self {
            entries: vec![StepEntry::new(100.0, None, None)],
        }
    }
}

/// Steps the user moves between with increase/decrease requests.
#[derive(Debug, Clone, PartialEq)]
pub struct UserStepTable {
    percents: Vec<f64>,
}

impl UserStepTable {
    pub fn new(percents: Vec<f64>) -> Result<Self, StepTableError> {
        if percents.is_empty() {
            return Ok(Self::default());
        }
        check_increasing(percents.iter().copied())?;
        ensure!(percents.iter().any(|&p| p > 0.0), NoNonZeroStepSnafu);
        Ok(Self { percents })
    }

    /// Parse one percent per line (commas also separate). Bad lines are skipped.
    pub fn parse(input: &str) -> Result<Self, StepTableError> {
        let mut percents = vec![];
        for field in entry_lines(input).flat_map(|line| line.split(',')).map(str::trim) {
            if field.is_empty() {
                continue;
            }
            match field.parse::<f64>() {
                Ok(percent) if percent.is_finite() => percents.push(clamp_percent(percent)),
                _ => warn!("Skipping invalid user step \"{field}\""),
            }
        }
        if percents.is_empty() {
            warn!("No usable user steps, using built-in default");
        }
        Self::new(percents)
    }

    pub fn len(&self) -> usize {
        self.percents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.percents.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<f64> {
        self.percents.get(idx).copied()
    }

    pub fn last(&self) -> f64 {
        self.percents.last().copied().unwrap_or(100.0)
    }

    pub fn nearest_index(&self, percent: f64) -> usize {
        nearest(self.percents.iter().copied(), percent).unwrap_or(0)
    }
}

impl Default for UserStepTable {
    fn default() -> Self {
        Self {
            percents: vec![0.0, DIM_PERCENT, 100.0],
        }
    }
}
