//! Board wiring and build-time defaults for the M5Stack CoreS3 build
//!
//! | Signal        | GPIO |
//! |---------------|------|
//! | Geiger pulse  | 9    |
//! | Buzzer (LEDC) | 8    |
//! | LCD SCK       | 36   |
//! | LCD MOSI      | 37   |
//! | LCD CS        | 35   |
//! | LCD DC        | 34   |
//! | I2C SDA       | 12   |
//! | I2C SCL       | 11   |

use geiger_core::alarm::AlarmThresholds;
use geiger_core::config::{AlarmCadence, MeasurementConfig};

pub const DISPLAY_WIDTH: u16 = 320;
pub const DISPLAY_HEIGHT: u16 = 240;

/// PCNT glitch filter length in APB clock cycles (80 MHz, max 1023 ≈ 12.8 µs)
pub const PCNT_FILTER_CYCLES: u16 = 1023;

/// The PCNT unit counts up to this value, then restarts at zero
pub const PCNT_HIGH_LIMIT: i16 = i16::MAX;

/// Measurement update cadence (20 Hz)
pub const MEASUREMENT_TICK_MS: u64 = 50;
/// Alarm evaluation cadence, fine enough for the 200 + 50 ms siren pattern
pub const ALARM_TICK_MS: u64 = 10;
/// Readout refresh
pub const DISPLAY_REFRESH_MS: u64 = 500;

pub fn measurement_config() -> MeasurementConfig {
    MeasurementConfig::default()
}

pub fn alarm_cadence() -> AlarmCadence {
    AlarmCadence::default()
}

/// Alarm thresholds baked in at build time from `.env`, if any were given
pub fn default_thresholds() -> Option<AlarmThresholds> {
    let rate = option_env!("GEIGER_ALARM_RATE").and_then(|v| v.trim().parse::<f32>().ok());
    let dose = option_env!("GEIGER_ALARM_DOSE").and_then(|v| v.trim().parse::<f32>().ok());
    let enabled = option_env!("GEIGER_ALARM_ENABLED").and_then(|v| v.trim().parse::<bool>().ok());

    if rate.is_none() && dose.is_none() && enabled.is_none() {
        return None;
    }

    let defaults = AlarmThresholds::default();
    Some(AlarmThresholds {
        current_rate_limit: rate.unwrap_or(defaults.current_rate_limit),
        cumulative_dose_limit: dose.unwrap_or(defaults.cumulative_dose_limit),
        enabled: enabled.unwrap_or(true),
    })
}
