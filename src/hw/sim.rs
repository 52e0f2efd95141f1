//! In-memory stand-ins used when running without device hardware.

use tracing::debug;

use super::{InputPin, Level, OutputPin, PinError};

/// Input that always reads released. The demo binary never sees a button
/// press without real hardware; tests script their own pins.
pub struct SimInput;

impl InputPin for SimInput {
    fn read(&mut self) -> Result<Level, PinError> {
        Ok(Level::High)
    }
}

/// Output that logs level changes instead of driving a line.
pub struct SimOutput {
    name: &'static str,
    level: Option<Level>,
}

impl SimOutput {
    pub fn new(name: &'static str) -> Self {
        Self { name, level: None }
    }
}

impl OutputPin for SimOutput {
    fn write(&mut self, level: Level) {
        if self.level != Some(level) {
            self.level = Some(level);
            debug!(pin = self.name, ?level, "output changed");
        }
    }
}
