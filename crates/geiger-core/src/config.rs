//! Measurement and alarm configuration

use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

/// CPM per µSv/h for the SBM-20 / M4011 class of tubes
pub const DEFAULT_CONVERSION_FACTOR: f32 = 153.8;

/// Upper bound on the rate-smoothing window
pub const MAX_SMOOTHING_SAMPLES: usize = 16;

/// Number of entries in the short-term history (3-minute means over 1 hour)
pub const SHORT_TERM_DEPTH: usize = 20;
/// Number of entries in the long-term history (1-hour means over 24 hours)
pub const LONG_TERM_DEPTH: usize = 24;

pub const SHORT_TERM_INTERVAL_SECS: u32 = 180;
pub const LONG_TERM_INTERVAL_SECS: u32 = 3600;

/// How the rate window reports CPM before 60 seconds have been collected.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WarmupPolicy {
    /// Sum the window as-is; empty slots count as zero pulses.
    /// Biases the estimate low during the first minute.
    ZeroPadded,
    /// Scale the partial sum by `60 / filled_seconds`.
    #[default]
    Extrapolated,
}

/// Tunables for the pulse-to-dose pipeline
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct MeasurementConfig {
    /// Counts per minute corresponding to 1 µSv/h
    pub conversion_factor: f32,
    /// Hardware counter polling cadence
    pub poll_interval_ms: u32,
    /// Number of update ticks averaged into the published current rate
    pub smoothing_samples: usize,
    pub warmup_policy: WarmupPolicy,
    /// Rates above this (µSv/h) never raise the recorded maximum
    pub max_plausible_rate: f32,
    pub short_term_interval_secs: u32,
    pub long_term_interval_secs: u32,
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            conversion_factor: DEFAULT_CONVERSION_FACTOR,
            poll_interval_ms: 100,
            smoothing_samples: 5,
            warmup_policy: WarmupPolicy::Extrapolated,
            max_plausible_rate: 1000.0,
            short_term_interval_secs: SHORT_TERM_INTERVAL_SECS,
            long_term_interval_secs: LONG_TERM_INTERVAL_SECS,
        }
    }
}

impl MeasurementConfig {
    /// Check that every field is usable by the pipeline
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.conversion_factor.is_finite() || self.conversion_factor <= 0.0 {
            return Err(ConfigError::ConversionFactor(self.conversion_factor));
        }
        if self.poll_interval_ms == 0 || self.poll_interval_ms > 1000 {
            return Err(ConfigError::PollInterval(self.poll_interval_ms));
        }
        if self.smoothing_samples == 0 || self.smoothing_samples > MAX_SMOOTHING_SAMPLES {
            return Err(ConfigError::SmoothingWindow {
                requested: self.smoothing_samples,
                max: MAX_SMOOTHING_SAMPLES,
            });
        }
        if self.max_plausible_rate.is_nan() || self.max_plausible_rate <= 0.0 {
            return Err(ConfigError::SanityCeiling(self.max_plausible_rate));
        }
        if self.short_term_interval_secs == 0 {
            return Err(ConfigError::HistoryInterval("short-term"));
        }
        if self.long_term_interval_secs == 0 {
            return Err(ConfigError::HistoryInterval("long-term"));
        }
        Ok(())
    }
}

/// Two-tone siren pattern played while an alarm condition holds
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmCadence {
    pub tone_a_hz: u32,
    pub tone_b_hz: u32,
    pub tone_ms: u32,
    pub pause_ms: u32,
}

impl AlarmCadence {
    /// Time between two tone switches
    pub const fn period_ms(&self) -> u64 {
        (self.tone_ms + self.pause_ms) as u64
    }
}

impl Default for AlarmCadence {
    fn default() -> Self {
        Self {
            tone_a_hz: 1000,
            tone_b_hz: 1500,
            tone_ms: 200,
            pause_ms: 50,
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    #[error("Conversion factor must be a positive number, got {0}")]
    ConversionFactor(f32),
    #[error("Poll interval must be within 1..=1000 ms, got {0}")]
    PollInterval(u32),
    #[error("Smoothing window must be within 1..={max} samples, got {requested}")]
    SmoothingWindow { requested: usize, max: usize },
    #[error("Sanity ceiling must be a positive rate, got {0}")]
    SanityCeiling(f32),
    #[error("The {0} history interval must be non-zero")]
    HistoryInterval(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(MeasurementConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_rejects_bad_conversion_factor() {
        for factor in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            let config = MeasurementConfig {
                conversion_factor: factor,
                ..Default::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::ConversionFactor(_))
            ));
        }
    }

    #[test]
    fn test_rejects_oversized_smoothing_window() {
        let config = MeasurementConfig {
            smoothing_samples: MAX_SMOOTHING_SAMPLES + 1,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::SmoothingWindow {
                requested: MAX_SMOOTHING_SAMPLES + 1,
                max: MAX_SMOOTHING_SAMPLES
            })
        );
    }

    #[test]
    fn test_rejects_zero_history_interval() {
        let config = MeasurementConfig {
            long_term_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::HistoryInterval("long-term"))
        );
    }

    #[test]
    fn test_cadence_period() {
        assert_eq!(AlarmCadence::default().period_ms(), 250);
    }
}
