//! Piezo buzzer driven by the LEDC peripheral
//!
//! LEDC timers have a fixed frequency once configured, so each siren tone
//! gets its own timer and playing a tone means pointing the channel at the
//! matching timer with a 50% duty cycle.

use esp_hal::gpio::interconnect::PeripheralOutput;
use esp_hal::ledc::channel::{self, ChannelIFace};
use esp_hal::ledc::timer::{self, TimerIFace};
use esp_hal::ledc::{LSGlobalClkSource, Ledc, LowSpeed};
use esp_hal::time::Rate;
use geiger_core::alarm::Buzzer;
use geiger_core::config::AlarmCadence;
use log::warn;
use static_cell::StaticCell;

use crate::error::AppError;

const TONE_DUTY_PCT: u8 = 50;

pub struct LedcBuzzer {
    channel: channel::Channel<'static, LowSpeed>,
    tone_a: &'static timer::Timer<'static, LowSpeed>,
    tone_b: &'static timer::Timer<'static, LowSpeed>,
    tone_b_hz: u32,
    playing: Option<u32>,
}

impl LedcBuzzer {
    pub fn new(
        ledc: esp_hal::peripherals::LEDC<'static>,
        pin: impl PeripheralOutput<'static>,
        cadence: &AlarmCadence,
    ) -> Result<Self, AppError> {
        static LEDC: StaticCell<Ledc<'static>> = StaticCell::new();
        static TONE_TIMERS: StaticCell<[timer::Timer<'static, LowSpeed>; 2]> = StaticCell::new();

        let ledc = LEDC.init(Ledc::new(ledc));
        ledc.set_global_slow_clock(LSGlobalClkSource::APBClk);

        let mut tone_a = ledc.timer::<LowSpeed>(timer::Number::Timer0);
        configure_timer(&mut tone_a, cadence.tone_a_hz)?;
        let mut tone_b = ledc.timer::<LowSpeed>(timer::Number::Timer1);
        configure_timer(&mut tone_b, cadence.tone_b_hz)?;

        let timers: &'static [timer::Timer<'static, LowSpeed>; 2] =
            TONE_TIMERS.init([tone_a, tone_b]);
        let [tone_a, tone_b] = timers;

        let mut channel = ledc.channel(channel::Number::Channel0, pin);
        channel
            .configure(channel::config::Config {
                timer: tone_a,
                duty_pct: 0,
                pin_config: channel::config::PinConfig::PushPull,
            })
            .map_err(|_| AppError::Buzzer)?;

        Ok(Self {
            channel,
            tone_a,
            tone_b,
            tone_b_hz: cadence.tone_b_hz,
            playing: None,
        })
    }
}

fn configure_timer(timer: &mut timer::Timer<'static, LowSpeed>, hz: u32) -> Result<(), AppError> {
    timer
        .configure(timer::config::Config {
            duty: timer::config::Duty::Duty10Bit,
            clock_source: timer::LSClockSource::APBClk,
            frequency: Rate::from_hz(hz),
        })
        .map_err(|_| AppError::Buzzer)
}

impl Buzzer for LedcBuzzer {
    fn play(&mut self, frequency_hz: u32) {
        if self.playing == Some(frequency_hz) {
            return;
        }

        let timer = if frequency_hz == self.tone_b_hz {
            self.tone_b
        } else {
            self.tone_a
        };

        let result = self.channel.configure(channel::config::Config {
            timer,
            duty_pct: TONE_DUTY_PCT,
            pin_config: channel::config::PinConfig::PushPull,
        });
        match result {
            Ok(()) => self.playing = Some(frequency_hz),
            Err(e) => warn!("Buzzer tone {} Hz failed: {:?}", frequency_hz, e),
        }
    }

    fn silence(&mut self) {
        if self.playing.take().is_some() {
            if let Err(e) = self.channel.set_duty(0) {
                warn!("Buzzer silence failed: {:?}", e);
            }
        }
    }
}
