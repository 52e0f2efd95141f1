//! rppal-backed peripherals for Raspberry Pi class hardware.

use std::time::Duration;

use rppal::gpio::Gpio;
use rppal::i2c::I2c;

use super::{InputPin, Level, OutputPin, PinError, Reading, SensorError, TempHumiditySensor};

// BCM pin assignments for the reference wiring.
pub const BUTTON_PIN: u8 = 6;
pub const STATUS_LED_PIN: u8 = 17;
pub const RED_LED_PIN: u8 = 27;
pub const GREEN_LED_PIN: u8 = 22;
pub const BLUE_LED_PIN: u8 = 23;

pub struct PiInput(rppal::gpio::InputPin);

impl PiInput {
    pub fn open(pin: u8) -> Result<Self, PinError> {
        let gpio = Gpio::new().map_err(|e| PinError(e.to_string()))?;
        let pin = gpio.get(pin).map_err(|e| PinError(e.to_string()))?;
        Ok(Self(pin.into_input_pullup()))
    }
}

impl InputPin for PiInput {
    fn read(&mut self) -> Result<Level, PinError> {
        Ok(if self.0.is_low() {
            Level::Low
        } else {
            Level::High
        })
    }
}

pub struct PiOutput(rppal::gpio::OutputPin);

impl PiOutput {
    pub fn open(pin: u8) -> Result<Self, PinError> {
        let gpio = Gpio::new().map_err(|e| PinError(e.to_string()))?;
        let pin = gpio.get(pin).map_err(|e| PinError(e.to_string()))?;
        Ok(Self(pin.into_output_high()))
    }
}

impl OutputPin for PiOutput {
    fn write(&mut self, level: Level) {
        match level {
            Level::Low => self.0.set_low(),
            Level::High => self.0.set_high(),
        }
    }
}

const SHT31_ADDRESS: u16 = 0x44;
const CMD_SOFT_RESET: [u8; 2] = [0x30, 0xa2];
const CMD_SINGLE_HIGH: [u8; 2] = [0x24, 0x00];
const MEASUREMENT_DELAY: Duration = Duration::from_millis(20);

/// SHT31 temperature/humidity sensor in single-shot high-repeatability
/// mode. Each read blocks for the ~15 ms measurement window, short
/// enough to run inline on the loop.
pub struct Sht31 {
    i2c: I2c,
}

impl Sht31 {
    pub fn open() -> Result<Self, SensorError> {
        let mut i2c = I2c::new().map_err(|e| SensorError(e.to_string()))?;
        i2c.set_slave_address(SHT31_ADDRESS)
            .map_err(|e| SensorError(e.to_string()))?;
        i2c.write(&CMD_SOFT_RESET)
            .map_err(|e| SensorError(e.to_string()))?;
        std::thread::sleep(MEASUREMENT_DELAY);
        Ok(Self { i2c })
    }
}

impl TempHumiditySensor for Sht31 {
    fn read(&mut self) -> Result<Reading, SensorError> {
        self.i2c
            .write(&CMD_SINGLE_HIGH)
            .map_err(|e| SensorError(e.to_string()))?;
        std::thread::sleep(MEASUREMENT_DELAY);

        let mut frame = [0u8; 6];
        self.i2c
            .read(&mut frame)
            .map_err(|e| SensorError(e.to_string()))?;
        decode_frame(&frame)
    }
}

// CRC-8 with polynomial 0x31 and initial value 0xff, per the SHT31
// datasheet.
fn crc8(data: &[u8]) -> u8 {
    let mut crc: u8 = 0xff;
    for byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x31
            } else {
                crc << 1
            };
        }
    }
    crc
}

fn decode_frame(frame: &[u8; 6]) -> Result<Reading, SensorError> {
    if frame[2] != crc8(&frame[0..2]) {
        return Err(SensorError("temperature CRC mismatch".to_string()));
    }
    if frame[5] != crc8(&frame[3..5]) {
        return Err(SensorError("humidity CRC mismatch".to_string()));
    }

    let st = u16::from_be_bytes([frame[0], frame[1]]);
    let srh = u16::from_be_bytes([frame[3], frame[4]]);
    Ok(Reading {
        temperature: st as f32 * 175.0 / 0xffff as f32 - 45.0,
        humidity: srh as f32 * 100.0 / 0xffff as f32,
    })
}
