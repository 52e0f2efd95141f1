use super::{InputPin, Level, PinError};

/// Edge detector over an active-low push button.
pub struct Button<P> {
    pin: P,
    last: Level,
}

impl<P: InputPin> Button<P> {
    pub fn new(pin: P) -> Self {
        Self {
            pin,
            last: Level::High,
        }
    }

    /// True exactly once per released-to-pressed transition; a held button
    /// reads as a single press.
    pub fn pressed_edge(&mut self) -> Result<bool, PinError> {
        let level = self.pin.read()?;
        let pressed = level != self.last && level == Level::Low;
        self.last = level;
        Ok(pressed)
    }
}
