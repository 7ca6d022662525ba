//! Threshold alarm and two-tone siren sequencing
//!
//! [`AlarmEvaluator::evaluate`] is called once per presentation tick with the
//! latest published rate and dose. It never touches hardware; it returns a
//! [`BuzzerCommand`] that the caller applies to whatever implements [`Buzzer`]
//! (the LEDC peripheral on the device, a logger in the simulator).
//!
//! While the alarm condition holds, the siren alternates between tone A and
//! tone B. Each tone sounds for `tone_ms`, then the buzzer is silent for
//! `pause_ms` before the other tone starts. When the condition clears the
//! buzzer is silenced on the same tick.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::AlarmCadence;

/// User-configured alarm limits.
///
/// Stored by the settings layer; an absent value means the alarm is off.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct AlarmThresholds {
    /// Dose rate above which the alarm sounds (µSv/h)
    pub current_rate_limit: f32,
    /// Cumulative dose above which the alarm sounds (mSv)
    pub cumulative_dose_limit: f32,
    pub enabled: bool,
}

impl Default for AlarmThresholds {
    fn default() -> Self {
        Self {
            current_rate_limit: 10.0,
            cumulative_dose_limit: 1.0,
            enabled: false,
        }
    }
}

/// True when either limit is exceeded on enabled thresholds
pub fn alarm_condition(
    current_rate: f32,
    cumulative_dose: f64,
    thresholds: Option<&AlarmThresholds>,
) -> bool {
    let Some(thresholds) = thresholds else {
        return false;
    };
    if !thresholds.enabled {
        return false;
    }

    current_rate > thresholds.current_rate_limit
        || cumulative_dose > thresholds.cumulative_dose_limit as f64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    A,
    B,
}

impl Tone {
    fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    pub fn frequency_hz(self, cadence: &AlarmCadence) -> u32 {
        match self {
            Self::A => cadence.tone_a_hz,
            Self::B => cadence.tone_b_hz,
        }
    }
}

/// Siren oscillator: which tone is current and when it last changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmToneState {
    pub tone: Tone,
    pub last_toggle_ms: u64,
    /// The current tone has finished and the pause is running
    pub pausing: bool,
}

/// What the buzzer should do after an evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuzzerCommand {
    /// Start (or switch to) a tone
    Play { frequency_hz: u32 },
    /// Stop any sound
    Silence,
    /// Leave the buzzer as it is
    Hold,
}

impl BuzzerCommand {
    pub fn apply<B: Buzzer + ?Sized>(self, buzzer: &mut B) {
        match self {
            Self::Play { frequency_hz } => buzzer.play(frequency_hz),
            Self::Silence => buzzer.silence(),
            Self::Hold => {}
        }
    }
}

/// Anything that can make the alarm sound
pub trait Buzzer {
    fn play(&mut self, frequency_hz: u32);
    fn silence(&mut self);
}

impl<T: Buzzer + ?Sized> Buzzer for &mut T {
    fn play(&mut self, frequency_hz: u32) {
        (**self).play(frequency_hz)
    }

    fn silence(&mut self) {
        (**self).silence()
    }
}

pub struct AlarmEvaluator {
    cadence: AlarmCadence,
    siren: Option<AlarmToneState>,
    toggles: u32,
}

impl AlarmEvaluator {
    pub fn new(cadence: AlarmCadence) -> Self {
        Self {
            cadence,
            siren: None,
            toggles: 0,
        }
    }

    /// Re-evaluate the alarm at `now_ms` and decide what the buzzer does.
    ///
    /// Missing or disabled thresholds always produce [`BuzzerCommand::Silence`].
    pub fn evaluate(
        &mut self,
        current_rate: f32,
        cumulative_dose: f64,
        thresholds: Option<&AlarmThresholds>,
        now_ms: u64,
    ) -> BuzzerCommand {
        if !alarm_condition(current_rate, cumulative_dose, thresholds) {
            if self.siren.take().is_some() {
                info!("Alarm cleared");
            }
            return BuzzerCommand::Silence;
        }

        let Some(siren) = self.siren.as_mut() else {
            info!(
                "Alarm raised: {} uSv/h, {} mSv",
                current_rate, cumulative_dose
            );
            self.siren = Some(AlarmToneState {
                tone: Tone::A,
                last_toggle_ms: now_ms,
                pausing: false,
            });
            return BuzzerCommand::Play {
                frequency_hz: Tone::A.frequency_hz(&self.cadence),
            };
        };

        let since_toggle = now_ms.saturating_sub(siren.last_toggle_ms);
        if since_toggle >= self.cadence.period_ms() {
            siren.tone = siren.tone.other();
            siren.last_toggle_ms = now_ms;
            siren.pausing = false;
            self.toggles = self.toggles.wrapping_add(1);
            let frequency_hz = siren.tone.frequency_hz(&self.cadence);
            debug!("Alarm tone -> {} Hz", frequency_hz);
            BuzzerCommand::Play { frequency_hz }
        } else if !siren.pausing && since_toggle >= self.cadence.tone_ms as u64 {
            siren.pausing = true;
            BuzzerCommand::Silence
        } else {
            BuzzerCommand::Hold
        }
    }

    pub fn is_sounding(&self) -> bool {
        self.siren.is_some()
    }

    pub fn tone_state(&self) -> Option<&AlarmToneState> {
        self.siren.as_ref()
    }

    /// Number of tone changes since start, not counting the first tone of an episode
    pub fn toggles(&self) -> u32 {
        self.toggles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENABLED: AlarmThresholds = AlarmThresholds {
        current_rate_limit: 1.0,
        cumulative_dose_limit: 5.0,
        enabled: true,
    };

    #[derive(Default)]
    struct RecordingBuzzer {
        plays: u32,
        silences: u32,
        frequency: Option<u32>,
    }

    impl Buzzer for RecordingBuzzer {
        fn play(&mut self, frequency_hz: u32) {
            self.plays += 1;
            self.frequency = Some(frequency_hz);
        }

        fn silence(&mut self) {
            self.silences += 1;
            self.frequency = None;
        }
    }

    #[test]
    fn test_condition_requires_enabled_thresholds() {
        let disabled = AlarmThresholds {
            enabled: false,
            ..ENABLED
        };

        assert!(!alarm_condition(1e6, 1e6, None));
        assert!(!alarm_condition(1e6, 1e6, Some(&disabled)));
        assert!(alarm_condition(1.5, 0.0, Some(&ENABLED)));
        assert!(alarm_condition(0.0, 5.1, Some(&ENABLED)));
        assert!(!alarm_condition(1.0, 5.0, Some(&ENABLED)));
    }

    #[test]
    fn test_toggles_at_cadence() {
        let mut alarm = AlarmEvaluator::new(AlarmCadence::default());
        let mut buzzer = RecordingBuzzer::default();

        for now in (0..=1000).step_by(10) {
            alarm
                .evaluate(2.0, 0.0, Some(&ENABLED), now)
                .apply(&mut buzzer);
        }

        // First tone at 0 ms, then a switch every 250 ms
        assert_eq!(alarm.toggles(), 4);
        assert_eq!(buzzer.plays, 5);
        // One pause after each of the first four tones
        assert_eq!(buzzer.silences, 4);
        assert_eq!(buzzer.frequency, Some(1000));
    }

    #[test]
    fn test_tone_pattern_alternates() {
        let cadence = AlarmCadence::default();
        let mut alarm = AlarmEvaluator::new(cadence);

        assert_eq!(
            alarm.evaluate(2.0, 0.0, Some(&ENABLED), 0),
            BuzzerCommand::Play { frequency_hz: 1000 }
        );
        assert_eq!(alarm.evaluate(2.0, 0.0, Some(&ENABLED), 100), BuzzerCommand::Hold);
        assert_eq!(alarm.evaluate(2.0, 0.0, Some(&ENABLED), 200), BuzzerCommand::Silence);
        assert_eq!(alarm.evaluate(2.0, 0.0, Some(&ENABLED), 220), BuzzerCommand::Hold);
        assert_eq!(
            alarm.evaluate(2.0, 0.0, Some(&ENABLED), 250),
            BuzzerCommand::Play { frequency_hz: 1500 }
        );
    }

    #[test]
    fn test_clears_immediately() {
        let mut alarm = AlarmEvaluator::new(AlarmCadence::default());
        alarm.evaluate(2.0, 0.0, Some(&ENABLED), 0);
        assert!(alarm.is_sounding());

        assert_eq!(alarm.evaluate(0.5, 0.0, Some(&ENABLED), 10), BuzzerCommand::Silence);
        assert!(!alarm.is_sounding());

        // A new episode starts again on tone A
        assert_eq!(
            alarm.evaluate(2.0, 0.0, Some(&ENABLED), 20),
            BuzzerCommand::Play { frequency_hz: 1000 }
        );
    }

    #[test]
    fn test_disabled_never_plays() {
        let disabled = AlarmThresholds {
            enabled: false,
            ..ENABLED
        };
        let mut alarm = AlarmEvaluator::new(AlarmCadence::default());
        let mut buzzer = RecordingBuzzer::default();

        for now in (0..5000).step_by(50) {
            alarm
                .evaluate(1e4, 1e4, Some(&disabled), now)
                .apply(&mut buzzer);
            alarm.evaluate(1e4, 1e4, None, now).apply(&mut buzzer);
        }

        assert_eq!(buzzer.plays, 0);
        assert_eq!(alarm.toggles(), 0);
    }
}
