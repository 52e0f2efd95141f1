/*
Peripheral access for the device: the user button, the status and RGB LEDs
and the temperature/humidity sensor.

Everything is behind small traits so the device loop can run against
in-memory stand-ins by default; the `pi` feature swaps in rppal-backed
GPIO/I2C implementations.
*/

mod button;
mod leds;
#[cfg(feature = "pi")]
pub mod pi;
mod sensor;
mod sim;

pub use button::Button;
pub use leds::{Actuator, LedBank};
pub use sensor::{Reading, SensorError, SimulatedSensor, TempHumiditySensor};
pub use sim::{SimInput, SimOutput};

use thiserror::Error;

/// Electrical level of a GPIO line. The button and the LEDs are active-low.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct PinError(pub String);

pub trait InputPin {
    fn read(&mut self) -> Result<Level, PinError>;
}

pub trait OutputPin {
    fn write(&mut self, level: Level);
}
