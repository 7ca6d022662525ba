//! Hardware-independent core library for geiger-rs
//!
//! This crate contains the pulse-to-dose measurement pipeline of the radiation
//! monitor: pulse acquisition, the rolling CPM window, dose integration,
//! decimated trend history, the threshold alarm and the channels that carry
//! data between tasks.
//!
//! It is `#![no_std]` and allocation-free so it compiles on both embedded
//! targets (ESP32-S3) and desktop hosts (for the simulator and tests).

#![no_std]

#[cfg(test)]
extern crate std;

pub mod acquisition;
pub mod alarm;
pub mod app_state;
pub mod config;
pub mod dose;
pub mod history;
pub mod level;
pub mod measurement;
pub mod rate;
pub mod settings;

pub use measurement::{MeasurementCore, Snapshot};
