//! Keyboard backlight arbitration engine.
//!
//! [`controller::KeyboardBacklightController`] combines user requests,
//! ambient light readings, power management state and hover/activity
//! detection into a single brightness for a keyboard backlight. The hardware
//! is reached through the [`device::Backlight`] trait; the daemon binary in
//! this package provides a sysfs implementation.

pub mod ambient;
pub mod bus;
pub mod config;
pub mod controller;
pub mod cursor;
pub mod device;
pub mod errors;
pub mod policy;
pub mod state;
pub mod steps;
pub mod timer;
