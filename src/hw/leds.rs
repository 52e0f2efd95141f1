use super::{Level, OutputPin};

/// The four independently toggled actuators mirrored in the device twin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Actuator {
    Status,
    Red,
    Green,
    Blue,
}

impl Actuator {
    pub const ALL: [Actuator; 4] = [
        Actuator::Status,
        Actuator::Red,
        Actuator::Green,
        Actuator::Blue,
    ];

    /// Field name used for this actuator in desired and reported state.
    pub fn field(&self) -> &'static str {
        match self {
            Actuator::Status => "StatusLED",
            Actuator::Red => "RLED",
            Actuator::Green => "GLED",
            Actuator::Blue => "BLED",
        }
    }
}

/// In-memory actuator flags plus their physical outputs. The flags are the
/// state reported back to the cloud; the pins follow them (active-low).
pub struct LedBank<P> {
    pins: [P; 4],
    flags: [bool; 4],
}

impl<P: OutputPin> LedBank<P> {
    /// All LEDs start off and dark.
    pub fn new(status: P, red: P, green: P, blue: P) -> Self {
        let mut bank = Self {
            pins: [status, red, green, blue],
            flags: [false; 4],
        };
        for pin in &mut bank.pins {
            pin.write(Level::High);
        }
        bank
    }

    pub fn set(&mut self, actuator: Actuator, on: bool) {
        let index = actuator as usize;
        self.flags[index] = on;
        self.pins[index].write(if on { Level::Low } else { Level::High });
    }

    pub fn get(&self, actuator: Actuator) -> bool {
        self.flags[actuator as usize]
    }

    /// Leave the LEDs dark, e.g. on shutdown. Flags are kept as-is so a
    /// report issued mid-shutdown still reflects the last cloud-visible
    /// state.
    pub fn all_dark(&mut self) {
        for pin in &mut self.pins {
            pin.write(Level::High);
        }
    }
}
