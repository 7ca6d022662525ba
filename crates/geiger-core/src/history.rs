//! Multi-resolution dose-rate history for trend charts
//!
//! Two decimation tiers run side by side, each fed the same rate every tick:
//!
//! - **Short-term**: 20 × 3-minute means (last hour)
//! - **Long-term**: 24 × 1-hour means (last day)
//!
//! Each tier time-weights the rate over its interval (`Σ rate·dt / Σ dt`),
//! dividing by the seconds actually accumulated rather than the nominal
//! interval, then appends the mean to a fixed-depth FIFO. Completed intervals
//! are reported as [`HistoryEvent`]s so chart owners can redraw on change.

use heapless::Vec;
use log::info;
use serde::{Deserialize, Serialize};

use crate::config::{LONG_TERM_DEPTH, MeasurementConfig, SHORT_TERM_DEPTH};

/// Headroom applied above the largest value when scaling a chart axis
const AXIS_HEADROOM: f32 = 1.2;
/// Smallest axis ceiling, so background levels do not zoom in on noise
const AXIS_FLOOR: f32 = 1.0;

/// Which history tier an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryResolution {
    ShortTerm,
    LongTerm,
}

impl HistoryResolution {
    /// Get a short label for display
    pub const fn label(self) -> &'static str {
        match self {
            Self::ShortTerm => "1h",
            Self::LongTerm => "24h",
        }
    }
}

/// A decimation interval was completed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub resolution: HistoryResolution,
    /// Time-weighted mean dose rate over the interval (µSv/h)
    pub mean_rate: f32,
    /// Seconds actually covered by the interval
    pub covered_secs: f32,
}

/// Fixed-depth FIFO of interval means.
///
/// Stored as a ring with a head index so appending never shifts memory.
/// Consumers only ever see the values oldest to newest.
#[derive(Debug, Clone)]
pub struct HistoryBuffer<const N: usize> {
    values: [f32; N],
    head: usize,
    len: usize,
    max: f32,
}

impl<const N: usize> Default for HistoryBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> HistoryBuffer<N> {
    pub const fn new() -> Self {
        Self {
            values: [0.0; N],
            head: 0,
            len: 0,
            max: 0.0,
        }
    }

    /// Append a value, returning the evicted oldest value once full
    pub fn push(&mut self, value: f32) -> Option<f32> {
        let evicted = if self.len < N {
            self.values[(self.head + self.len) % N] = value;
            self.len += 1;
            None
        } else {
            let oldest = self.values[self.head];
            self.values[self.head] = value;
            self.head = (self.head + 1) % N;
            Some(oldest)
        };

        self.max = self.iter().fold(0.0, f32::max);
        evicted
    }

    /// Values oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        (0..self.len).map(move |i| self.values[(self.head + i) % N])
    }

    /// Values oldest to newest, zero-filled after the last written entry
    pub fn to_array(&self) -> [f32; N] {
        let mut out = [0.0; N];
        for (slot, value) in out.iter_mut().zip(self.iter()) {
            *slot = value;
        }
        out
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == N
    }

    pub fn latest(&self) -> Option<f32> {
        if self.len == 0 {
            None
        } else {
            Some(self.values[(self.head + self.len - 1) % N])
        }
    }

    /// Largest stored value, recomputed on every append
    pub fn max_value(&self) -> f32 {
        self.max
    }

    /// Y-axis ceiling suitable for charting this buffer
    pub fn axis_ceiling(&self) -> f32 {
        axis_ceiling(self.max)
    }

    pub const fn capacity(&self) -> usize {
        N
    }
}

/// Chart axis maximum for a series peaking at `max`: 20% headroom, rounded up
/// to a whole unit, never below 1.0.
pub fn axis_ceiling(max: f32) -> f32 {
    if !max.is_finite() {
        return AXIS_FLOOR;
    }
    libm::ceilf(max * AXIS_HEADROOM).max(AXIS_FLOOR)
}

/// Running `Σ rate·dt` and `Σ dt` for one decimation interval
#[derive(Debug, Clone, Copy)]
pub struct IntervalAccumulator {
    interval_secs: f64,
    rate_dt: f64,
    elapsed_secs: f64,
}

impl IntervalAccumulator {
    pub fn new(interval_secs: u32) -> Self {
        Self {
            interval_secs: interval_secs as f64,
            rate_dt: 0.0,
            elapsed_secs: 0.0,
        }
    }

    /// Add one tick. Returns `(mean, covered_secs)` when the interval completes.
    pub fn accumulate(&mut self, rate: f32, dt_secs: f32) -> Option<(f32, f32)> {
        if !dt_secs.is_finite() || dt_secs <= 0.0 || !rate.is_finite() {
            return None;
        }

        self.rate_dt += rate as f64 * dt_secs as f64;
        self.elapsed_secs += dt_secs as f64;

        if self.elapsed_secs < self.interval_secs {
            return None;
        }

        let mean = self.rate_dt / self.elapsed_secs;
        let covered = self.elapsed_secs;
        self.rate_dt = 0.0;
        self.elapsed_secs = 0.0;
        Some((mean as f32, covered as f32))
    }

    /// Seconds accumulated toward the current interval
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed_secs
    }
}

/// One history tier: an accumulator feeding a FIFO
#[derive(Debug, Clone)]
pub struct DecimatedHistory<const N: usize> {
    resolution: HistoryResolution,
    accumulator: IntervalAccumulator,
    buffer: HistoryBuffer<N>,
}

impl<const N: usize> DecimatedHistory<N> {
    pub fn new(resolution: HistoryResolution, interval_secs: u32) -> Self {
        Self {
            resolution,
            accumulator: IntervalAccumulator::new(interval_secs),
            buffer: HistoryBuffer::new(),
        }
    }

    pub fn tick(&mut self, rate: f32, dt_secs: f32) -> Option<HistoryEvent> {
        let (mean_rate, covered_secs) = self.accumulator.accumulate(rate, dt_secs)?;
        self.buffer.push(mean_rate);

        info!(
            "{} history interval closed: {} uSv/h over {} s ({} / {} entries)",
            self.resolution.label(),
            mean_rate,
            covered_secs,
            self.buffer.len(),
            N
        );

        Some(HistoryEvent {
            resolution: self.resolution,
            mean_rate,
            covered_secs,
        })
    }

    pub fn buffer(&self) -> &HistoryBuffer<N> {
        &self.buffer
    }

    pub fn accumulator(&self) -> &IntervalAccumulator {
        &self.accumulator
    }
}

/// Both history tiers, fed together
pub struct HistoryAggregator {
    short_term: DecimatedHistory<SHORT_TERM_DEPTH>,
    long_term: DecimatedHistory<LONG_TERM_DEPTH>,
}

impl HistoryAggregator {
    pub fn new(config: &MeasurementConfig) -> Self {
        Self {
            short_term: DecimatedHistory::new(
                HistoryResolution::ShortTerm,
                config.short_term_interval_secs,
            ),
            long_term: DecimatedHistory::new(
                HistoryResolution::LongTerm,
                config.long_term_interval_secs,
            ),
        }
    }

    /// Feed one tick's rate to both tiers, returning any completed intervals
    pub fn tick(&mut self, rate: f32, dt_secs: f32) -> Vec<HistoryEvent, 2> {
        let mut events = Vec::new();
        if let Some(event) = self.short_term.tick(rate, dt_secs) {
            let _ = events.push(event);
        }
        if let Some(event) = self.long_term.tick(rate, dt_secs) {
            let _ = events.push(event);
        }
        events
    }

    pub fn short_term(&self) -> &HistoryBuffer<SHORT_TERM_DEPTH> {
        self.short_term.buffer()
    }

    pub fn long_term(&self) -> &HistoryBuffer<LONG_TERM_DEPTH> {
        self.long_term.buffer()
    }
}
