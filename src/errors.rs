//! Error types

use std::num::ParseIntError;

use snafu::{prelude::*, Backtrace};

/// A step table that was parsed but cannot be used.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StepTableError {
    #[snafu(display("Step percents must be strictly increasing: {previous} followed by {next}"))]
    NotIncreasing {
        previous: f64,
        next: f64,
        backtrace: Backtrace,
    },
    #[snafu(display("User step table needs at least one step above 0%"))]
    NoNonZeroStep { backtrace: Backtrace },
    #[snafu(display("ALS step {index} ({percent}%) has an invalid lux range"))]
    InvalidRange {
        index: usize,
        percent: f64,
        backtrace: Backtrace,
    },
    #[snafu(display("ALS steps {index} and {} leave a lux gap between {upper} and {lower}", index + 1))]
    DeadZone {
        index: usize,
        upper: f64,
        lower: f64,
        backtrace: Backtrace,
    },
}

/// Failure talking to a backlight device.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum BacklightError {
    #[snafu(display("Failed to open {path}: {source}"))]
    IoOpeningFile {
        path: String,
        source: std::io::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("Unexpected IO error on {path}: {source}"))]
    GenericIoError {
        path: String,
        source: std::io::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("Failed to parse {path}: {source}"))]
    LevelParse {
        path: String,
        source: ParseIntError,
        backtrace: Backtrace,
    },
    #[snafu(display("Backlight device is not present"))]
    NoDevice { backtrace: Backtrace },
}
