//! The measurement pipeline as a single owned aggregate
//!
//! [`MeasurementCore`] owns the rate window, dose state and both history
//! buffers. It is constructed once at startup and driven by one task:
//!
//! 1. [`MeasurementCore::record_second`] for every [`SecondBucket`] received
//!    from acquisition
//! 2. [`MeasurementCore::update`] once per update tick with the measured
//!    wall-clock delta
//! 3. [`MeasurementCore::snapshot`] to produce the copy-out state that other
//!    tasks read
//!
//! Nothing here blocks or allocates; every call is bounded-time.

use heapless::Vec;
use serde::{Deserialize, Serialize};

use crate::acquisition::SecondBucket;
use crate::config::{ConfigError, LONG_TERM_DEPTH, MeasurementConfig, SHORT_TERM_DEPTH};
use crate::dose::{DoseAccumulator, DoseState};
use crate::history::{HistoryAggregator, HistoryEvent};
use crate::level::RadiationLevel;
use crate::rate::{EstimatorState, RateEstimator, RateReading};

/// Published measurement state.
///
/// This is the complete payload handed to presentation and transport: four
/// scalar quantities, the lifetime pulse count and both history series
/// ordered oldest to newest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Smoothed dose rate (µSv/h)
    pub current_rate: f32,
    /// Lifetime average dose rate (µSv/h)
    pub average_rate: f32,
    /// Highest plausible dose rate seen (µSv/h)
    pub max_rate: f32,
    /// Integrated dose since start (mSv)
    pub cumulative_dose: f32,
    #[serde(rename = "totalPulseCount")]
    pub total_pulses: u64,
    pub short_term_history: [f32; SHORT_TERM_DEPTH],
    pub long_term_history: [f32; LONG_TERM_DEPTH],
}

impl Snapshot {
    /// State before the first update tick
    pub const EMPTY: Self = Self {
        current_rate: 0.0,
        average_rate: 0.0,
        max_rate: 0.0,
        cumulative_dose: 0.0,
        total_pulses: 0,
        short_term_history: [0.0; SHORT_TERM_DEPTH],
        long_term_history: [0.0; LONG_TERM_DEPTH],
    };

    pub fn level(&self) -> RadiationLevel {
        RadiationLevel::assess(self.current_rate)
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::EMPTY
    }
}

pub struct MeasurementCore {
    config: MeasurementConfig,
    estimator: RateEstimator,
    dose: DoseAccumulator,
    history: HistoryAggregator,
    total_pulses: u64,
    last_reading: RateReading,
}

impl MeasurementCore {
    pub fn new(config: MeasurementConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            estimator: RateEstimator::new(&config),
            dose: DoseAccumulator::new(&config),
            history: HistoryAggregator::new(&config),
            total_pulses: 0,
            last_reading: RateReading::default(),
            config,
        })
    }

    /// Apply one completed second from acquisition
    pub fn record_second(&mut self, bucket: SecondBucket) {
        self.estimator.record_second(bucket);
        self.total_pulses = self.total_pulses.saturating_add(bucket.pulses as u64);
    }

    /// Run one update tick: sample the rate, integrate dose, feed history.
    ///
    /// `dt_secs` is the measured wall-clock time since the previous update.
    /// Returns any history intervals that closed on this tick.
    pub fn update(&mut self, dt_secs: f32) -> Vec<HistoryEvent, 2> {
        let reading = self.estimator.sample();
        self.last_reading = reading;

        let rate = self
            .dose
            .update(&reading, dt_secs, self.total_pulses)
            .smoothed_rate;

        self.history.tick(rate, dt_secs)
    }

    /// Copy out the current published state
    pub fn snapshot(&self) -> Snapshot {
        let dose = self.dose.state();
        Snapshot {
            current_rate: dose.smoothed_rate,
            average_rate: dose.average_rate,
            max_rate: dose.max_rate,
            cumulative_dose: dose.cumulative_dose as f32,
            total_pulses: self.total_pulses,
            short_term_history: self.history.short_term().to_array(),
            long_term_history: self.history.long_term().to_array(),
        }
    }

    pub fn dose_state(&self) -> &DoseState {
        self.dose.state()
    }

    pub fn estimator_state(&self) -> EstimatorState {
        self.estimator.state()
    }

    pub fn last_reading(&self) -> RateReading {
        self.last_reading
    }

    pub fn current_cpm(&self) -> f32 {
        self.estimator.current_cpm()
    }

    pub fn history(&self) -> &HistoryAggregator {
        &self.history
    }

    pub fn total_pulses(&self) -> u64 {
        self.total_pulses
    }

    /// Ticks whose rate was too large to count toward the maximum
    pub fn rejected_outliers(&self) -> u32 {
        self.dose.rejected_outliers()
    }

    pub fn config(&self) -> &MeasurementConfig {
        &self.config
    }
}
