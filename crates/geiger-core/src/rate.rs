//! Rolling-window rate estimation
//!
//! The [`RateWindow`] holds the pulse counts of the last 60 seconds in a
//! circular buffer; its sum is the counts-per-minute figure. The
//! [`RateEstimator`] converts CPM to a dose rate and damps tick-to-tick jitter
//! with a short moving average before the value is published.
//!
//! The estimator starts in [`EstimatorState::WarmingUp`] and moves to
//! [`EstimatorState::Steady`] once the window has been filled. The transition is
//! one-way; only constructing a new estimator starts warm-up again.

use heapless::Deque;
use log::info;

use crate::acquisition::SecondBucket;
use crate::config::{MAX_SMOOTHING_SAMPLES, MeasurementConfig, WarmupPolicy};

/// Length of the CPM window in one-second buckets
pub const RATE_WINDOW_SECONDS: usize = 60;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EstimatorState {
    /// Fewer than 60 one-second buckets collected
    #[default]
    WarmingUp,
    /// The window holds a full minute of data
    Steady,
}

/// Fixed 60-slot circular buffer of per-second pulse counts.
#[derive(Debug, Clone)]
pub struct RateWindow {
    buckets: [u32; RATE_WINDOW_SECONDS],
    cursor: usize,
    filled: usize,
}

impl Default for RateWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl RateWindow {
    pub const fn new() -> Self {
        Self {
            buckets: [0; RATE_WINDOW_SECONDS],
            cursor: 0,
            filled: 0,
        }
    }

    /// Write one second's count, overwriting the slot from 60 seconds ago
    pub fn push(&mut self, bucket: SecondBucket) {
        self.buckets[self.cursor] = bucket.pulses;
        self.cursor = (self.cursor + 1) % RATE_WINDOW_SECONDS;
        if self.filled < RATE_WINDOW_SECONDS {
            self.filled += 1;
        }
    }

    /// Sum of all 60 slots; unwritten slots are zero
    pub fn sum(&self) -> u32 {
        self.buckets
            .iter()
            .fold(0u32, |acc, &count| acc.saturating_add(count))
    }

    /// Number of seconds written so far, capped at 60
    pub fn filled(&self) -> usize {
        self.filled
    }

    pub fn is_full(&self) -> bool {
        self.filled == RATE_WINDOW_SECONDS
    }

    /// Iterate the written buckets oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        let start = if self.is_full() { self.cursor } else { 0 };
        (0..self.filled).map(move |i| self.buckets[(start + i) % RATE_WINDOW_SECONDS])
    }
}

/// Moving average over the most recent `window` rate samples.
///
/// Before `window` samples have arrived the average covers only what has been
/// seen, so the output does not ramp up from zero.
#[derive(Debug, Clone)]
pub struct RateSmoother {
    samples: Deque<f32, MAX_SMOOTHING_SAMPLES>,
    window: usize,
}

impl RateSmoother {
    /// `window` is clamped to `1..=MAX_SMOOTHING_SAMPLES`
    pub fn new(window: usize) -> Self {
        Self {
            samples: Deque::new(),
            window: window.clamp(1, MAX_SMOOTHING_SAMPLES),
        }
    }

    /// Add a sample and return the current average
    pub fn push(&mut self, value: f32) -> f32 {
        while self.samples.len() >= self.window {
            self.samples.pop_front();
        }
        // Cannot fail: the loop above leaves room for one more sample
        let _ = self.samples.push_back(value);
        self.average()
    }

    pub fn average(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f32>() / self.samples.len() as f32
    }
}

/// One evaluation of the estimator, taken on an update tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RateReading {
    /// Counts per minute under the configured warm-up policy
    pub cpm: f32,
    /// `cpm / conversion_factor`, µSv/h
    pub instant_rate: f32,
    /// Moving average of `instant_rate`, µSv/h
    pub smoothed_rate: f32,
    /// Estimator state when the reading was taken
    pub state: EstimatorState,
}

pub struct RateEstimator {
    window: RateWindow,
    smoother: RateSmoother,
    state: EstimatorState,
    policy: WarmupPolicy,
    conversion_factor: f32,
}

impl RateEstimator {
    pub fn new(config: &MeasurementConfig) -> Self {
        Self {
            window: RateWindow::new(),
            smoother: RateSmoother::new(config.smoothing_samples),
            state: EstimatorState::WarmingUp,
            policy: config.warmup_policy,
            conversion_factor: config.conversion_factor,
        }
    }

    /// Store one completed second in the window
    pub fn record_second(&mut self, bucket: SecondBucket) {
        self.window.push(bucket);
        if self.state == EstimatorState::WarmingUp && self.window.is_full() {
            self.state = EstimatorState::Steady;
            info!("Rate window full, CPM estimate is now steady");
        }
    }

    /// Counts per minute over the last 60 seconds.
    ///
    /// While warming up the result follows the configured [`WarmupPolicy`].
    /// Returns zero before the first second has been recorded.
    pub fn current_cpm(&self) -> f32 {
        let sum = self.window.sum() as f32;
        match (self.state, self.policy) {
            (EstimatorState::Steady, _) | (_, WarmupPolicy::ZeroPadded) => sum,
            (EstimatorState::WarmingUp, WarmupPolicy::Extrapolated) => {
                let filled = self.window.filled();
                if filled == 0 {
                    0.0
                } else {
                    sum * RATE_WINDOW_SECONDS as f32 / filled as f32
                }
            }
        }
    }

    /// Evaluate the window and feed the result through the smoother.
    ///
    /// Call once per update tick.
    pub fn sample(&mut self) -> RateReading {
        let cpm = self.current_cpm();
        let instant_rate = cpm / self.conversion_factor;
        let smoothed_rate = self.smoother.push(instant_rate);
        RateReading {
            cpm,
            instant_rate,
            smoothed_rate,
            state: self.state,
        }
    }

    pub fn state(&self) -> EstimatorState {
        self.state
    }

    pub fn window(&self) -> &RateWindow {
        &self.window
    }

    pub fn conversion_factor(&self) -> f32 {
        self.conversion_factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator(policy: WarmupPolicy) -> RateEstimator {
        RateEstimator::new(&MeasurementConfig {
            warmup_policy: policy,
            ..Default::default()
        })
    }

    #[test]
    fn test_window_overwrites_oldest() {
        let mut window = RateWindow::new();
        for i in 0..65u32 {
            window.push(SecondBucket::new(i));
        }

        assert!(window.is_full());
        // Seconds 5..65 remain
        assert_eq!(window.sum(), (5..65).sum::<u32>());
        assert_eq!(window.iter().next(), Some(5));
        assert_eq!(window.iter().last(), Some(64));
    }

    #[test]
    fn test_zero_padded_warmup_biases_low() {
        let mut est = estimator(WarmupPolicy::ZeroPadded);
        for _ in 0..30 {
            est.record_second(SecondBucket::new(2));
        }

        assert_eq!(est.state(), EstimatorState::WarmingUp);
        assert_eq!(est.current_cpm(), 60.0);
    }

    #[test]
    fn test_extrapolated_warmup_scales_partial_sum() {
        let mut est = estimator(WarmupPolicy::Extrapolated);
        assert_eq!(est.current_cpm(), 0.0);

        for _ in 0..30 {
            est.record_second(SecondBucket::new(2));
        }

        assert_eq!(est.current_cpm(), 120.0);
    }

    #[test]
    fn test_steady_state_is_permanent() {
        let mut est = estimator(WarmupPolicy::Extrapolated);
        for _ in 0..60 {
            est.record_second(SecondBucket::new(1));
        }
        assert_eq!(est.state(), EstimatorState::Steady);

        for _ in 0..120 {
            est.record_second(SecondBucket::new(0));
        }
        assert_eq!(est.state(), EstimatorState::Steady);
        assert_eq!(est.current_cpm(), 0.0);
    }

    #[test]
    fn test_constant_rate_gives_exact_cpm_and_dose_rate() {
        let mut est = estimator(WarmupPolicy::ZeroPadded);
        for _ in 0..75 {
            est.record_second(SecondBucket::new(4));
        }

        let mut reading = RateReading::default();
        for _ in 0..5 {
            reading = est.sample();
        }

        assert_eq!(reading.cpm, 240.0);
        let expected = 240.0 / est.conversion_factor();
        assert!((reading.instant_rate - expected).abs() < 1e-5);
        assert!((reading.smoothed_rate - expected).abs() < 1e-5);
    }

    #[test]
    fn test_smoother_averages_recent_samples_only() {
        let mut smoother = RateSmoother::new(3);

        assert_eq!(smoother.push(3.0), 3.0);
        assert_eq!(smoother.push(6.0), 4.5);
        assert_eq!(smoother.push(9.0), 6.0);
        // 3.0 drops out
        assert_eq!(smoother.push(0.0), 5.0);
    }

    #[test]
    fn test_smoother_clamps_window() {
        let mut smoother = RateSmoother::new(0);
        smoother.push(1.0);
        assert_eq!(smoother.push(5.0), 5.0);
    }
}
