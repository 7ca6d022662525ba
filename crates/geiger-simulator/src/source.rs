//! Synthetic Geiger tube
//!
//! Produces Poisson-distributed pulse timestamps and drives them into an
//! [`IsrEdgeCounter`] the same way the GPIO interrupt does on hardware.
//! A small fraction of pulses ring and produce a second edge a few
//! microseconds later, which the edge filter is expected to reject.

use geiger_core::acquisition::IsrEdgeCounter;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp};

/// Chance that a pulse produces a ringing edge
const RINGING_PROBABILITY: f64 = 0.02;
/// Delay of the ringing edge after the real one
const RINGING_DELAY_US: u64 = 8;

/// Inter-arrival distribution in microseconds, `None` for a silent source
fn gap_distribution(cpm: f64) -> Option<Exp<f64>> {
    if cpm > 0.0 && cpm.is_finite() {
        Exp::new(cpm / 60_000_000.0).ok()
    } else {
        None
    }
}

pub struct GeigerSource {
    rng: StdRng,
    cpm: f64,
    gaps: Option<Exp<f64>>,
    next_pulse_us: Option<u64>,
    emitted: u64,
}

impl GeigerSource {
    pub fn new(cpm: f64, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            cpm,
            gaps: gap_distribution(cpm),
            next_pulse_us: None,
            emitted: 0,
        }
    }

    /// Change the source strength from `now_us` onwards
    pub fn set_cpm(&mut self, cpm: f64, now_us: u64) {
        if cpm != self.cpm {
            self.cpm = cpm;
            self.gaps = gap_distribution(cpm);
            self.next_pulse_us = self.schedule_after(now_us);
        }
    }

    pub fn cpm(&self) -> f64 {
        self.cpm
    }

    /// Pulses generated so far, not counting ringing edges
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Fire every pulse that falls before `until_us` into `edges`
    pub fn run_until(&mut self, until_us: u64, edges: &IsrEdgeCounter) {
        if self.next_pulse_us.is_none() {
            self.next_pulse_us = self.schedule_after(0);
        }

        while let Some(at) = self.next_pulse_us {
            if at >= until_us {
                break;
            }

            edges.on_edge(at);
            self.emitted += 1;
            if self.rng.gen_bool(RINGING_PROBABILITY) {
                edges.on_edge(at + RINGING_DELAY_US);
            }

            self.next_pulse_us = self.schedule_after(at);
        }
    }

    fn schedule_after(&mut self, from_us: u64) -> Option<u64> {
        let gap = self.gaps.as_ref()?.sample(&mut self.rng);
        Some(from_us + gap.max(1.0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_rate_close_to_configured() {
        let edges = IsrEdgeCounter::new(50);
        let mut source = GeigerSource::new(600.0, 1);

        source.run_until(600_000_000, &edges);

        // 6000 expected pulses; Poisson sigma is ~77
        let emitted = source.emitted() as f64;
        assert!((emitted - 6000.0).abs() < 400.0, "emitted {}", emitted);
        assert!(edges.rejected() > 0);
        assert!(u64::from(edges.count()) <= source.emitted());
    }

    #[test]
    fn test_same_seed_same_pulse_train() {
        let a_edges = IsrEdgeCounter::new(50);
        let b_edges = IsrEdgeCounter::new(50);
        let mut a = GeigerSource::new(1200.0, 42);
        let mut b = GeigerSource::new(1200.0, 42);

        a.run_until(30_000_000, &a_edges);
        b.run_until(30_000_000, &b_edges);

        assert_eq!(a.emitted(), b.emitted());
        assert_eq!(a_edges.count(), b_edges.count());
        assert_eq!(a_edges.rejected(), b_edges.rejected());
    }

    #[test]
    fn test_set_cpm_to_zero_stops_pulses() {
        let edges = IsrEdgeCounter::new(50);
        let mut source = GeigerSource::new(600.0, 7);
        source.run_until(10_000_000, &edges);
        let before = source.emitted();
        assert!(before > 0);

        source.set_cpm(0.0, 10_000_000);
        source.run_until(60_000_000, &edges);
        assert_eq!(source.emitted(), before);
    }

    #[test]
    fn test_silent_source() {
        let edges = IsrEdgeCounter::new(50);
        let mut source = GeigerSource::new(0.0, 1);
        source.run_until(10_000_000, &edges);
        assert_eq!(edges.count(), 0);
    }
}
