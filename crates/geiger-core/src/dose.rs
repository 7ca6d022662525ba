//! Dose accumulation and lifetime statistics

use log::warn;
use serde::{Deserialize, Serialize};

use crate::config::MeasurementConfig;
use crate::rate::{EstimatorState, RateReading};

/// Seconds per hour, for integrating µSv/h over seconds
const SECS_PER_HOUR: f64 = 3600.0;
/// µSv per mSv
const USV_PER_MSV: f64 = 1000.0;

/// Dose figures updated once per update tick.
///
/// `cumulative_dose` is kept in `f64`: per-tick increments at background
/// levels are around 1e-8 mSv and would stop registering in an `f32` total
/// long before the device is switched off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DoseState {
    /// Unsmoothed dose rate from the rate window (µSv/h)
    pub current_rate: f32,
    /// Moving average of `current_rate` (µSv/h); this is the published rate
    pub smoothed_rate: f32,
    /// Lifetime pulses per elapsed minute, converted to µSv/h
    pub average_rate: f32,
    /// Highest plausible smoothed rate seen once the rate window was full (µSv/h)
    pub max_rate: f32,
    /// Integrated dose since start (mSv), never decreases
    pub cumulative_dose: f64,
}

/// Integrates dose rate over wall-clock time.
pub struct DoseAccumulator {
    state: DoseState,
    elapsed_secs: f64,
    conversion_factor: f32,
    max_plausible_rate: f32,
    rejected_outliers: u32,
}

impl DoseAccumulator {
    pub fn new(config: &MeasurementConfig) -> Self {
        Self {
            state: DoseState::default(),
            elapsed_secs: 0.0,
            conversion_factor: config.conversion_factor,
            max_plausible_rate: config.max_plausible_rate,
            rejected_outliers: 0,
        }
    }

    /// Apply one update tick.
    ///
    /// `dt_secs` is the measured wall-clock time since the previous tick.
    /// Negative or non-finite deltas contribute nothing. `total_pulses` is the
    /// lifetime pulse count used for the average rate.
    pub fn update(&mut self, reading: &RateReading, dt_secs: f32, total_pulses: u64) -> &DoseState {
        let dt = if dt_secs.is_finite() && dt_secs > 0.0 {
            dt_secs as f64
        } else {
            0.0
        };
        self.elapsed_secs += dt;

        self.state.current_rate = reading.instant_rate;
        self.state.smoothed_rate = reading.smoothed_rate;

        let elapsed_minutes = self.elapsed_secs / 60.0;
        if elapsed_minutes > 0.0 {
            let average_cpm = total_pulses as f64 / elapsed_minutes;
            self.state.average_rate = (average_cpm / self.conversion_factor as f64) as f32;
        }

        let rate = reading.smoothed_rate;
        match reading.state {
            // Warm-up readings rest on a few seconds of data and must not pin the maximum
            EstimatorState::WarmingUp => {}
            EstimatorState::Steady if rate > self.max_plausible_rate => {
                self.rejected_outliers = self.rejected_outliers.saturating_add(1);
                warn!(
                    "Ignoring implausible rate {} uSv/h for maximum (ceiling {})",
                    rate, self.max_plausible_rate
                );
            }
            EstimatorState::Steady => {
                if rate > self.state.max_rate {
                    self.state.max_rate = rate;
                }
            }
        }

        let increment = (rate as f64 / SECS_PER_HOUR) * dt / USV_PER_MSV;
        if increment.is_finite() && increment > 0.0 {
            self.state.cumulative_dose += increment;
        }

        &self.state
    }

    pub fn state(&self) -> &DoseState {
        &self.state
    }

    /// Total wall-clock seconds integrated so far
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed_secs
    }

    /// Number of ticks whose rate exceeded the sanity ceiling
    pub fn rejected_outliers(&self) -> u32 {
        self.rejected_outliers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(rate: f32) -> RateReading {
        RateReading {
            cpm: rate * 153.8,
            instant_rate: rate,
            smoothed_rate: rate,
            state: EstimatorState::Steady,
        }
    }

    #[test]
    fn test_integrates_with_wall_clock_delta() {
        let mut acc = DoseAccumulator::new(&MeasurementConfig::default());

        // 3.6 µSv/h for one hour in uneven steps = 3.6 µSv = 0.0036 mSv
        for dt in [600.0, 1200.0, 1800.0] {
            acc.update(&reading(3.6), dt, 0);
        }

        assert!((acc.state().cumulative_dose - 0.0036).abs() < 1e-9);
        assert_eq!(acc.elapsed_secs(), 3600.0);
    }

    #[test]
    fn test_bad_deltas_do_not_decrease_dose() {
        let mut acc = DoseAccumulator::new(&MeasurementConfig::default());
        acc.update(&reading(1.0), 10.0, 0);
        let before = acc.state().cumulative_dose;

        acc.update(&reading(1.0), -5.0, 0);
        acc.update(&reading(1.0), f32::NAN, 0);
        acc.update(&reading(-2.0), 10.0, 0);

        assert_eq!(acc.state().cumulative_dose, before);
    }

    #[test]
    fn test_average_rate_from_lifetime_pulses() {
        let mut acc = DoseAccumulator::new(&MeasurementConfig::default());

        // 615 pulses over two minutes, roughly 2 µSv/h at 153.8 CPM per µSv/h
        let state = acc.update(&reading(0.0), 60.0, 0);
        assert_eq!(state.average_rate, 0.0);
        let state = acc.update(&reading(0.0), 60.0, 615);
        assert!((state.average_rate - 615.0 / 2.0 / 153.8).abs() < 1e-4);
    }

    #[test]
    fn test_max_rate_ignores_implausible_spike() {
        let config = MeasurementConfig {
            max_plausible_rate: 100.0,
            ..Default::default()
        };
        let mut acc = DoseAccumulator::new(&config);

        acc.update(&reading(5.0), 1.0, 0);
        let state = *acc.update(&reading(5000.0), 1.0, 0);

        assert_eq!(state.max_rate, 5.0);
        // The spike is still visible to consumers of the current rate
        assert_eq!(state.smoothed_rate, 5000.0);
        assert!(state.cumulative_dose > 0.0);
        assert_eq!(acc.rejected_outliers(), 1);
    }

    #[test]
    fn test_max_rate_is_high_water_mark() {
        let mut acc = DoseAccumulator::new(&MeasurementConfig::default());
        for rate in [0.1, 0.4, 0.2, 0.3] {
            acc.update(&reading(rate), 1.0, 0);
        }
        assert_eq!(acc.state().max_rate, 0.4);
    }

    #[test]
    fn test_warm_up_readings_do_not_set_max_rate() {
        let mut acc = DoseAccumulator::new(&MeasurementConfig::default());
        let warming = RateReading {
            state: EstimatorState::WarmingUp,
            ..reading(0.39)
        };

        let state = *acc.update(&warming, 1.0, 1);
        assert_eq!(state.max_rate, 0.0);
        assert_eq!(state.smoothed_rate, 0.39);
        assert!(state.cumulative_dose > 0.0);

        acc.update(&reading(0.195), 1.0, 31);
        assert_eq!(acc.state().max_rate, 0.195);
    }
}
