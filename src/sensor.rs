//! Polled inputs: ambient light sensor via IIO and the display backlight

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use log::{debug, info};

const IIO_DEVICES: &str = "/sys/bus/iio/devices";
const ILLUMINANCE_INPUT: &str = "in_illuminance_input";
const ILLUMINANCE_RAW: &str = "in_illuminance_raw";
const ILLUMINANCE_SCALE: &str = "in_illuminance_scale";
const BACKLIGHTS: &str = "/sys/class/backlight";

fn read_f64(p: &Path) -> anyhow::Result<f64> {
    let buf = fs::read_to_string(p).with_context(|| format!("Failed to read {p:?}"))?;
    buf.trim()
        .parse()
        .with_context(|| format!("Failed to parse {p:?}"))
}

/// Exponential moving average of lux readings.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Smoother {
    /// Weight of a new sample.
    alpha: f64,
    value: Option<f64>,
}

impl Smoother {
    pub fn new(alpha: f64) -> Self {
        let alpha = if alpha.is_finite() && alpha > 0.0 {
            alpha.min(1.0)
        } else {
            1.0
        };
        Self { alpha, value: None }
    }

    pub fn push(&mut self, sample: f64) -> f64 {
        let next = match self.value {
            Some(prev) => prev + self.alpha * (sample - prev),
            None => sample,
        };
        self.value = Some(next);
        next
    }
}

#[derive(Debug)]
pub(crate) struct AmbientLightSensor {
    /// Either `in_illuminance_input` or `in_illuminance_raw`.
    path: PathBuf,
    scale: f64,
    smoother: Smoother,
}

impl AmbientLightSensor {
    pub fn new(path: PathBuf, smoothing: f64) -> anyhow::Result<Self> {
        let scale = if path.file_name().is_some_and(|n| n == ILLUMINANCE_RAW) {
            let scale_path = path.with_file_name(ILLUMINANCE_SCALE);
            if scale_path.exists() {
                read_f64(&scale_path)?
            } else {
                1.0
            }
        } else {
            1.0
        };
        info!("Using ambient light sensor {path:?} (scale {scale})");
        Ok(Self {
            path,
            scale,
            smoother: Smoother::new(smoothing),
        })
    }

    /// First IIO device that reports illuminance.
    pub fn find_default() -> Option<PathBuf> {
        let mut devices: Vec<_> = fs::read_dir(IIO_DEVICES)
            .ok()?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .collect();
        devices.sort();
        devices.into_iter().find_map(|dev| {
            [ILLUMINANCE_INPUT, ILLUMINANCE_RAW]
                .into_iter()
                .map(|name| dev.join(name))
                .find(|p| p.exists())
        })
    }

    /// Read and smooth one sample.
    pub fn read(&mut self) -> anyhow::Result<f64> {
        let lux = read_f64(&self.path)? * self.scale;
        let smoothed = self.smoother.push(lux);
        debug!("ALS: {lux} lux (smoothed {smoothed})");
        Ok(smoothed)
    }
}

/// Display backlight in /sys/class/backlight, followed so the keyboard can
/// go dark with the screen.
#[derive(Debug)]
pub(crate) struct DisplayBacklight {
    dir: PathBuf,
}

impl DisplayBacklight {
    pub fn new(dir: PathBuf) -> Self {
        info!("Following display backlight {dir:?}");
        Self { dir }
    }

    /// First display backlight, if there is one.
    pub fn find_default() -> Option<PathBuf> {
        let mut dirs: Vec<_> = fs::read_dir(BACKLIGHTS)
            .ok()?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .collect();
        dirs.sort();
        dirs.into_iter().next()
    }

    pub fn percent(&self) -> anyhow::Result<f64> {
        let max = read_f64(&self.dir.join("max_brightness"))?;
        let current = read_f64(&self.dir.join("brightness"))?;
        if max <= 0.0 {
            anyhow::bail!("Display backlight {:?} has no range", self.dir);
        }
        Ok((current / max * 100.0).clamp(0.0, 100.0))
    }
}
