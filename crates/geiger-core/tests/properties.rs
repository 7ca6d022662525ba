//! Property-based tests using proptest
//!
//! Invariants of the measurement pipeline that must hold for any pulse
//! stream and any scheduling pattern.

use geiger_core::MeasurementCore;
use geiger_core::acquisition::{PulseAcquisition, PulseCounter, SecondBucket};
use geiger_core::config::MeasurementConfig;
use geiger_core::rate::{RATE_WINDOW_SECONDS, RateEstimator, RateWindow};
use proptest::prelude::*;

/// Counter replaying arbitrary raw register values, including jumps backwards
struct ReplayCounter {
    readings: Vec<i32>,
    next: usize,
}

impl PulseCounter for ReplayCounter {
    fn read_raw(&mut self) -> i32 {
        let value = self.readings.get(self.next).copied().unwrap_or(0);
        self.next += 1;
        value
    }
}

proptest! {
    // Property: a full window sums exactly the last 60 seconds
    #[test]
    fn test_window_sum_is_last_minute(
        counts in prop::collection::vec(0u32..500, RATE_WINDOW_SECONDS..300)
    ) {
        let mut window = RateWindow::new();
        for &count in &counts {
            window.push(SecondBucket::new(count));
        }

        let expected: u32 = counts[counts.len() - RATE_WINDOW_SECONDS..].iter().sum();
        prop_assert_eq!(window.sum(), expected);
        prop_assert!(window.iter().eq(counts[counts.len() - RATE_WINDOW_SECONDS..].iter().copied()));
    }

    // Property: constant R pulses/second gives CPM of exactly 60 * R
    #[test]
    fn test_constant_rate_cpm(rate in 0u32..1000, extra_seconds in 0usize..120) {
        let mut estimator = RateEstimator::new(&MeasurementConfig::default());
        for _ in 0..RATE_WINDOW_SECONDS + extra_seconds {
            estimator.record_second(SecondBucket::new(rate));
        }

        prop_assert_eq!(estimator.current_cpm(), (60 * rate) as f32);
        let reading = estimator.sample();
        let expected = (60 * rate) as f32 / estimator.conversion_factor();
        prop_assert!((reading.instant_rate - expected).abs() <= expected * 1e-6);
    }

    // Property: arbitrary raw counter sequences never decrease the pulse total
    // and never yield a negative CPM
    #[test]
    fn test_counter_anomalies_are_harmless(
        readings in prop::collection::vec(any::<i16>(), 1..200)
    ) {
        let counter = ReplayCounter {
            readings: readings.iter().map(|&r| r as i32).collect(),
            next: 0,
        };
        let mut acquisition = PulseAcquisition::new(counter, 0);
        let mut core = MeasurementCore::new(MeasurementConfig::default()).unwrap();

        let mut previous_total = 0;
        for step in 1..readings.len() as u64 {
            if let Some(bucket) = acquisition.tick(step * 100) {
                core.record_second(bucket);
                core.update(1.0);
            }
            prop_assert!(acquisition.total_pulses() >= previous_total);
            previous_total = acquisition.total_pulses();
            prop_assert!(core.current_cpm() >= 0.0);
            prop_assert!(core.snapshot().current_rate >= 0.0);
        }
    }

    // Property: cumulative dose never decreases, whatever the tick timing
    #[test]
    fn test_cumulative_dose_is_monotonic(
        ticks in prop::collection::vec((0u32..200, 0.0f32..5.0), 1..300)
    ) {
        let mut core = MeasurementCore::new(MeasurementConfig::default()).unwrap();

        let mut previous = 0.0f64;
        for (pulses, dt) in ticks {
            core.record_second(SecondBucket::new(pulses));
            core.update(dt);

            let dose = core.dose_state().cumulative_dose;
            prop_assert!(dose >= previous, "dose fell from {} to {}", previous, dose);
            previous = dose;
        }
    }
}
