//! Pulse acquisition
//!
//! Turns a free-running hardware edge counter into per-second pulse buckets.
//! The counter is polled at a fixed cadence (100 ms on the device); each poll
//! produces the non-negative number of edges seen since the previous poll, and
//! once a full second has been accumulated a [`SecondBucket`] is emitted.
//!
//! Two counter sources implement [`PulseCounter`]:
//!
//! - the ESP32-S3 PCNT peripheral (firmware crate), whose 16-bit value wraps
//!   back to zero at its high limit, and
//! - [`IsrEdgeCounter`], fed from a GPIO edge interrupt through a software
//!   minimum-pulse-width filter.
//!
//! A negative delta between two raw readings (wraparound or an external reset)
//! is counted as zero pulses for that poll. Acquisition itself never fails.

use core::cell::Cell;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Milliseconds of accumulation that make up one [`SecondBucket`]
pub const BUCKET_PERIOD_MS: u64 = 1000;

/// Source of a raw, monotonically counting edge register.
///
/// Implementations return the register value as-is. Interpretation of
/// wraparound is left to [`PulseAcquisition`].
pub trait PulseCounter {
    /// Read the current raw counter value
    fn read_raw(&mut self) -> i32;
}

impl<T: PulseCounter + ?Sized> PulseCounter for &mut T {
    fn read_raw(&mut self) -> i32 {
        (**self).read_raw()
    }
}

/// Edges observed during one polling interval
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PulseSample {
    pub pulses: u32,
}

/// Pulses counted during one elapsed second
///
/// Always non-negative by construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondBucket {
    pub pulses: u32,
}

impl SecondBucket {
    pub const fn new(pulses: u32) -> Self {
        Self { pulses }
    }

    /// Fold another bucket's pulses into this one
    pub fn merge(self, other: SecondBucket) -> Self {
        Self {
            pulses: self.pulses.saturating_add(other.pulses),
        }
    }
}

/// Polls a [`PulseCounter`] and aggregates the deltas into one-second buckets.
pub struct PulseAcquisition<C> {
    counter: C,
    last_raw: i32,
    pending: u32,
    bucket_start_ms: u64,
    total_pulses: u64,
    anomalies: u32,
}

impl<C: PulseCounter> PulseAcquisition<C> {
    /// Take ownership of the counter and use its current value as the reference
    /// point. `now_ms` starts the first one-second bucket.
    pub fn new(mut counter: C, now_ms: u64) -> Self {
        let last_raw = counter.read_raw();
        Self {
            counter,
            last_raw,
            pending: 0,
            bucket_start_ms: now_ms,
            total_pulses: 0,
            anomalies: 0,
        }
    }

    /// Read the counter once and return the edges since the previous read.
    pub fn poll(&mut self) -> PulseSample {
        let raw = self.counter.read_raw();
        let delta = raw.wrapping_sub(self.last_raw);
        self.last_raw = raw;

        let pulses = if delta < 0 {
            self.anomalies = self.anomalies.saturating_add(1);
            warn!(
                "Pulse counter went backwards ({} -> {}), counting 0 pulses",
                raw.wrapping_sub(delta),
                raw
            );
            0
        } else {
            delta as u32
        };

        self.pending = self.pending.saturating_add(pulses);
        self.total_pulses = self.total_pulses.saturating_add(pulses as u64);

        PulseSample { pulses }
    }

    /// Poll the counter and, once a full second has been accumulated, return it.
    ///
    /// Buckets are phase-locked to the start time so scheduling jitter does not
    /// stretch them. If the caller fell more than a whole bucket behind, the
    /// phase is re-anchored to `now_ms` and the late pulses land in one bucket.
    pub fn tick(&mut self, now_ms: u64) -> Option<SecondBucket> {
        self.poll();

        let elapsed = now_ms.saturating_sub(self.bucket_start_ms);
        if elapsed < BUCKET_PERIOD_MS {
            return None;
        }

        if elapsed >= 2 * BUCKET_PERIOD_MS {
            warn!("Acquisition stalled for {} ms, re-anchoring bucket phase", elapsed);
            self.bucket_start_ms = now_ms;
        } else {
            self.bucket_start_ms += BUCKET_PERIOD_MS;
        }

        let bucket = SecondBucket::new(self.pending);
        self.pending = 0;
        debug!("Second bucket: {} pulses", bucket.pulses);
        Some(bucket)
    }

    /// Lifetime number of pulses seen by this acquisition
    pub fn total_pulses(&self) -> u64 {
        self.total_pulses
    }

    /// Number of polls where the raw counter moved backwards
    pub fn anomalies(&self) -> u32 {
        self.anomalies
    }

    /// Give back the underlying counter
    pub fn release(self) -> C {
        self.counter
    }
}

/// Minimum pulse width filter for interrupt-driven edge detection.
///
/// An edge arriving sooner than `min_width_us` after the previously accepted
/// edge is treated as ringing on the same pulse and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeFilter {
    min_width_us: u32,
    last_edge_us: Option<u64>,
}

impl EdgeFilter {
    pub const fn new(min_width_us: u32) -> Self {
        Self {
            min_width_us,
            last_edge_us: None,
        }
    }

    /// Returns true if the edge at `timestamp_us` should be counted
    pub fn accept(&mut self, timestamp_us: u64) -> bool {
        if let Some(last) = self.last_edge_us {
            if timestamp_us.saturating_sub(last) < self.min_width_us as u64 {
                return false;
            }
        }
        self.last_edge_us = Some(timestamp_us);
        true
    }
}

#[derive(Debug, Clone, Copy)]
struct EdgeCounterState {
    count: u32,
    rejected: u32,
    filter: EdgeFilter,
}

/// Edge counter shared between a GPIO interrupt handler and the acquisition task.
///
/// The interrupt handler calls [`IsrEdgeCounter::on_edge`]; the acquisition
/// task polls it through [`PulseCounter`] like any hardware counter. All state
/// sits behind a `critical_section::Mutex`, so it can live in a `static`.
///
/// ```rust,ignore
/// static EDGES: IsrEdgeCounter = IsrEdgeCounter::new(50);
///
/// #[handler]
/// fn gpio_isr() {
///     EDGES.on_edge(now_us());
/// }
///
/// let mut acquisition = PulseAcquisition::new(&EDGES, now_ms);
/// ```
pub struct IsrEdgeCounter {
    state: critical_section::Mutex<Cell<EdgeCounterState>>,
}

impl IsrEdgeCounter {
    /// Create a counter rejecting edges closer together than `min_width_us`
    pub const fn new(min_width_us: u32) -> Self {
        Self {
            state: critical_section::Mutex::new(Cell::new(EdgeCounterState {
                count: 0,
                rejected: 0,
                filter: EdgeFilter::new(min_width_us),
            })),
        }
    }

    /// Record an edge seen at `timestamp_us`. Safe to call from interrupt context.
    pub fn on_edge(&self, timestamp_us: u64) {
        critical_section::with(|cs| {
            let cell = self.state.borrow(cs);
            let mut state = cell.get();
            if state.filter.accept(timestamp_us) {
                state.count = state.count.wrapping_add(1);
            } else {
                state.rejected = state.rejected.saturating_add(1);
            }
            cell.set(state);
        });
    }

    /// Current raw edge count (wraps at `u32::MAX`)
    pub fn count(&self) -> u32 {
        critical_section::with(|cs| self.state.borrow(cs).get().count)
    }

    /// Number of edges dropped by the pulse width filter
    pub fn rejected(&self) -> u32 {
        critical_section::with(|cs| self.state.borrow(cs).get().rejected)
    }
}

impl PulseCounter for &IsrEdgeCounter {
    fn read_raw(&mut self) -> i32 {
        self.count() as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Counter replaying a fixed list of raw readings
    struct ScriptedCounter<'a> {
        readings: &'a [i32],
        next: usize,
    }

    impl<'a> ScriptedCounter<'a> {
        fn new(readings: &'a [i32]) -> Self {
            Self { readings, next: 0 }
        }
    }

    impl PulseCounter for ScriptedCounter<'_> {
        fn read_raw(&mut self) -> i32 {
            let value = self.readings[self.next.min(self.readings.len() - 1)];
            self.next += 1;
            value
        }
    }

    #[test]
    fn test_poll_reports_delta_since_previous_read() {
        let mut acq = PulseAcquisition::new(ScriptedCounter::new(&[10, 13, 13, 20]), 0);

        assert_eq!(acq.poll().pulses, 3);
        assert_eq!(acq.poll().pulses, 0);
        assert_eq!(acq.poll().pulses, 7);
        assert_eq!(acq.total_pulses(), 10);
    }

    #[test]
    fn test_negative_delta_counts_as_zero() {
        // 16-bit PCNT wrapping from its high limit back to zero
        let mut acq = PulseAcquisition::new(ScriptedCounter::new(&[32_760, 32_767, 2, 5]), 0);

        assert_eq!(acq.poll().pulses, 7);
        assert_eq!(acq.poll().pulses, 0);
        assert_eq!(acq.poll().pulses, 3);
        assert_eq!(acq.total_pulses(), 10);
        assert_eq!(acq.anomalies(), 1);
    }

    #[test]
    fn test_tick_emits_one_bucket_per_second() {
        // One raw reading per 100 ms poll, 2 pulses per poll
        let readings: [i32; 22] = core::array::from_fn(|i| (i as i32) * 2);
        let mut acq = PulseAcquisition::new(ScriptedCounter::new(&readings), 0);

        let mut buckets = heapless::Vec::<SecondBucket, 4>::new();
        for step in 1..=21u64 {
            if let Some(bucket) = acq.tick(step * 100) {
                buckets.push(bucket).unwrap();
            }
        }

        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].pulses, 20);
        assert_eq!(buckets[1].pulses, 20);
    }

    #[test]
    fn test_tick_reanchors_after_stall() {
        let mut acq = PulseAcquisition::new(ScriptedCounter::new(&[0, 5, 9]), 0);

        let bucket = acq.tick(3_500).unwrap();
        assert_eq!(bucket.pulses, 5);

        // Phase now anchored at 3500 ms
        assert!(acq.tick(4_400).is_none());
    }

    #[test]
    fn test_edge_filter_rejects_ringing() {
        let mut filter = EdgeFilter::new(50);

        assert!(filter.accept(1_000));
        assert!(!filter.accept(1_020));
        assert!(filter.accept(1_060));
        assert!(filter.accept(5_000));
    }

    #[test]
    fn test_isr_counter_feeds_acquisition() {
        let edges = IsrEdgeCounter::new(100);
        let mut acq = PulseAcquisition::new(&edges, 0);

        edges.on_edge(0);
        edges.on_edge(30); // ringing
        edges.on_edge(500);
        edges.on_edge(1_000);

        assert_eq!(acq.poll().pulses, 3);
        assert_eq!(edges.rejected(), 1);
    }
}
