use thiserror::Error;

/// One temperature/humidity sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Reading {
    pub temperature: f32,
    pub humidity: f32,
}

#[derive(Debug, Error)]
#[error("sensor read failed: {0}")]
pub struct SensorError(pub String);

pub trait TempHumiditySensor {
    fn read(&mut self) -> Result<Reading, SensorError>;
}

/// Random-walk sensor used when no hardware is present.
pub struct SimulatedSensor {
    temperature: f32,
    humidity: f32,
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self {
            temperature: 50.0,
            humidity: 45.0,
        }
    }
}

impl TempHumiditySensor for SimulatedSensor {
    fn read(&mut self) -> Result<Reading, SensorError> {
        self.temperature += rand::random_range(-1.0f32..=1.0);
        self.humidity = (self.humidity + rand::random_range(-0.5f32..=0.5)).clamp(0.0, 100.0);
        Ok(Reading {
            temperature: self.temperature,
            humidity: self.humidity,
        })
    }
}
