//! PCNT-backed Geiger pulse counter

use esp_hal::gpio::{Input, InputConfig, InputPin, Pull};
use esp_hal::pcnt::channel::EdgeMode;
use esp_hal::pcnt::unit::Unit;
use geiger_core::acquisition::PulseCounter;

use crate::config::{PCNT_FILTER_CYCLES, PCNT_HIGH_LIMIT};
use crate::error::AppError;

/// PCNT unit 0 counting rising edges on the tube output.
///
/// The 16-bit hardware counter restarts from zero at [`PCNT_HIGH_LIMIT`];
/// `PulseAcquisition` treats that jump as an anomaly.
pub struct PcntCounter {
    unit: Unit<'static, 0>,
    _pin: Input<'static>,
}

impl PcntCounter {
    pub fn new(unit: Unit<'static, 0>, pin: impl InputPin + 'static) -> Result<Self, AppError> {
        let pin = Input::new(pin, InputConfig::default().with_pull(Pull::Down));

        unit.set_low_limit(None).map_err(|_| AppError::PulseCounter)?;
        unit.set_high_limit(Some(PCNT_HIGH_LIMIT))
            .map_err(|_| AppError::PulseCounter)?;
        unit.set_filter(Some(PCNT_FILTER_CYCLES))
            .map_err(|_| AppError::PulseCounter)?;
        unit.clear();

        let channel = &unit.channel0;
        channel.set_edge_signal(pin.peripheral_input());
        // Count rising edges only
        channel.set_input_mode(EdgeMode::Hold, EdgeMode::Increment);

        unit.resume();

        Ok(Self { unit, _pin: pin })
    }
}

impl PulseCounter for PcntCounter {
    fn read_raw(&mut self) -> i32 {
        self.unit.value() as i32
    }
}
