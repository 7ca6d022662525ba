//! Shared async I2C bus
//!
//! The CoreS3 power chip and GPIO expander sit on the same I2C bus. Each gets
//! a [`SharedI2c`] handle; transactions lock the bus with an embassy async
//! mutex, so a task waiting for the bus yields to the executor instead of
//! spinning.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embedded_hal_async::i2c::{ErrorType, I2c, Operation};

pub type I2cBus<T> = Mutex<CriticalSectionRawMutex, T>;

pub struct SharedI2c<'a, T> {
    bus: &'a I2cBus<T>,
}

impl<'a, T> SharedI2c<'a, T> {
    pub const fn new(bus: &'a I2cBus<T>) -> Self {
        Self { bus }
    }
}

impl<T: ErrorType> ErrorType for SharedI2c<'_, T> {
    type Error = T::Error;
}

// `read`, `write` and `write_read` fall back to `transaction`
impl<T: I2c> I2c for SharedI2c<'_, T> {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.bus.lock().await.transaction(address, operations).await
    }
}
