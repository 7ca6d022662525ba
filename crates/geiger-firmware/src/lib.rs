//! ESP32-S3 firmware-specific modules for geiger-rs
//!
//! This crate contains hardware-specific code that cannot compile on desktop
//! targets: PCNT pulse counting, the LEDC buzzer, power and display bring-up
//! for the CoreS3 board, and the readout screen.

#![no_std]

pub mod buzzer;
pub mod config;
pub mod display;
pub mod error;
pub mod hardware;
pub mod pulse_counter;
pub mod shared_i2c;
