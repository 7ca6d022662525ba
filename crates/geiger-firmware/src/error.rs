use geiger_core::config::ConfigError;
use thiserror_no_std::Error;

/// Hardware bring-up failures. Once running, the measurement path has no
/// error states.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum AppError {
    #[error("Invalid measurement configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Pulse counter configuration failed")]
    PulseCounter,
    #[error("Buzzer configuration failed")]
    Buzzer,
    #[error("SPI bus configuration failed")]
    Spi,
    #[error("Display initialization failed")]
    Display,
    #[error("I2C bus configuration failed")]
    I2c,
    #[error("Power management setup failed")]
    Power,
    #[error("Could not spawn the {0} task")]
    Spawn(&'static str),
}
