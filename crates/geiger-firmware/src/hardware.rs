//! Hardware bring-up for the CoreS3 board
//!
//! Order matters: the AXP2101 must power the LCD rail before the display
//! controller is initialized.

use axp2101_embedded::AsyncAxp2101;
use embassy_sync::mutex::Mutex;
use embedded_hal_bus::spi::{ExclusiveDevice, NoDelay};
use esp_hal::gpio::{Level, Output, OutputConfig, OutputPin};
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::spi::master::{Config as SpiConfig, Spi};
use esp_hal::time::Rate;
use esp_hal::{Async, Blocking};
use log::info;
use mipidsi::interface::SpiInterface;
use mipidsi::models::ILI9342CRgb565;
use mipidsi::{Builder as MipidsiBuilder, NoResetPin};
use static_cell::StaticCell;

use crate::config::{DISPLAY_HEIGHT, DISPLAY_WIDTH};
use crate::error::AppError;
use crate::shared_i2c::{I2cBus, SharedI2c};

/// GPIO expander address on the internal I2C bus
const AW9523_ADDRESS: u8 = 0x58;
/// LCD panel supply on ALDO4
const LCD_RAIL_MV: u16 = 3300;

pub type LcdSpi = ExclusiveDevice<Spi<'static, Blocking>, Output<'static>, NoDelay>;
pub type Lcd = mipidsi::Display<SpiInterface<'static, LcdSpi, Output<'static>>, ILI9342CRgb565, NoResetPin>;

/// Create the internal I2C bus (400 kHz)
pub fn create_i2c_bus(
    i2c0: esp_hal::peripherals::I2C0<'static>,
    sda: esp_hal::peripherals::GPIO12<'static>,
    scl: esp_hal::peripherals::GPIO11<'static>,
) -> Result<I2c<'static, Async>, AppError> {
    Ok(
        I2c::new(i2c0, I2cConfig::default().with_frequency(Rate::from_khz(400)))
            .map_err(|_| AppError::I2c)?
            .with_sda(sda)
            .with_scl(scl)
            .into_async(),
    )
}

/// Power the display and peripheral rails
///
/// Brings up the AXP2101 regulators and the AW9523 expander, which holds the
/// LCD reset line.
pub async fn init_power(i2c0: I2c<'static, Async>) -> Result<(), AppError> {
    static I2C0_BUS: StaticCell<I2cBus<I2c<'static, Async>>> = StaticCell::new();
    let bus = I2C0_BUS.init(Mutex::new(i2c0));

    info!("Configuring power management");
    let mut pmu = AsyncAxp2101::new(SharedI2c::new(bus));
    pmu.init().await.map_err(|_| AppError::Power)?;
    pmu.set_charging_led_mode(axp2101_embedded::ChargeLedMode::On)
        .await
        .map_err(|_| AppError::Power)?;

    pmu.enable_aldo1().await.map_err(|_| AppError::Power)?;
    pmu.enable_aldo2().await.map_err(|_| AppError::Power)?;
    pmu.enable_aldo3().await.map_err(|_| AppError::Power)?;
    pmu.enable_aldo4().await.map_err(|_| AppError::Power)?;
    pmu.enable_bldo1().await.map_err(|_| AppError::Power)?;
    pmu.enable_bldo2().await.map_err(|_| AppError::Power)?;
    pmu.enable_dldo1().await.map_err(|_| AppError::Power)?;
    pmu.set_aldo4_voltage(LCD_RAIL_MV)
        .await
        .map_err(|_| AppError::Power)?;

    let mut expander =
        aw9523_embedded::r#async::Aw9523Async::new(SharedI2c::new(bus), AW9523_ADDRESS);
    expander.init().await.map_err(|_| AppError::Power)?;

    info!("Power rails ready");
    Ok(())
}

/// Bring up the ILI9342C panel on SPI2
pub fn init_display(
    spi2: esp_hal::peripherals::SPI2<'static>,
    sck: esp_hal::peripherals::GPIO36<'static>,
    mosi: esp_hal::peripherals::GPIO37<'static>,
    cs: impl OutputPin + 'static,
    dc: impl OutputPin + 'static,
) -> Result<Lcd, AppError> {
    static SPI_BUFFER: StaticCell<[u8; 512]> = StaticCell::new();

    let spi_bus = Spi::new(spi2, SpiConfig::default().with_frequency(Rate::from_mhz(40)))
        .map_err(|_| AppError::Spi)?
        .with_sck(sck)
        .with_mosi(mosi);

    // The panel has no MISO and a dedicated CS line
    let cs = Output::new(cs, Level::High, OutputConfig::default());
    let spi_device = ExclusiveDevice::new_no_delay(spi_bus, cs).map_err(|_| AppError::Spi)?;
    let dc = Output::new(dc, Level::Low, OutputConfig::default());

    let di = SpiInterface::new(spi_device, dc, SPI_BUFFER.init([0; 512]));

    let display = MipidsiBuilder::new(ILI9342CRgb565, di)
        .display_size(DISPLAY_WIDTH, DISPLAY_HEIGHT)
        .init(&mut embassy_time::Delay)
        .map_err(|_| AppError::Display)?;

    info!("Display ready");
    Ok(display)
}
