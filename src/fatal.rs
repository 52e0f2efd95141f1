//! Fatal failure categories and their process exit codes.
//!
//! Fatal conditions are carried up to `main` as a tagged error and mapped
//! to an enumerated exit code at the process boundary, one distinct small
//! integer per distinguishable category. Zero is reserved for clean
//! shutdown.

use thiserror::Error;

use crate::config::ConfigError;
use crate::hw::PinError;

/// Peripheral that failed to open during startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Peripheral {
    Button,
    StatusLed,
    RedLed,
    GreenLed,
    BlueLed,
    Sensor,
}

impl std::fmt::Display for Peripheral {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Peripheral::Button => "button",
            Peripheral::StatusLed => "status LED",
            Peripheral::RedLed => "red LED",
            Peripheral::GreenLed => "green LED",
            Peripheral::BlueLed => "blue LED",
            Peripheral::Sensor => "temperature sensor",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum FatalError {
    #[error("termination signal received")]
    Terminated,

    #[error("event loop failed: {0}")]
    EventLoop(String),

    #[error("could not read button: {0}")]
    ButtonRead(#[source] PinError),

    #[error("connectivity probe failed: {0}")]
    Probe(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("could not open {peripheral}: {reason}")]
    PeripheralOpen {
        peripheral: Peripheral,
        reason: String,
    },
}

impl FatalError {
    pub fn exit_code(&self) -> u8 {
        match self {
            FatalError::Terminated => 1,
            FatalError::EventLoop(_) => 2,
            FatalError::ButtonRead(_) => 3,
            FatalError::Probe(_) => 4,
            FatalError::Config(err) => match err {
                ConfigError::ConnectionType => 10,
                ConfigError::MissingScopeId => 11,
                ConfigError::MissingHostname => 12,
                // Missing and malformed device ids share a code; both name
                // the same configuration input.
                ConfigError::MissingDeviceId | ConfigError::DeviceIdNotLowercase => 13,
                ConfigError::ZeroTunable(_) => 14,
            },
            FatalError::PeripheralOpen { peripheral, .. } => match peripheral {
                Peripheral::Button => 20,
                Peripheral::StatusLed => 21,
                Peripheral::RedLed => 22,
                Peripheral::GreenLed => 23,
                Peripheral::BlueLed => 24,
                Peripheral::Sensor => 25,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct_and_nonzero() {
        let errors = [
            FatalError::Terminated,
            FatalError::EventLoop(String::new()),
            FatalError::ButtonRead(PinError(String::new())),
            FatalError::Probe(String::new()),
            FatalError::Config(ConfigError::ConnectionType),
            FatalError::Config(ConfigError::MissingScopeId),
            FatalError::Config(ConfigError::MissingHostname),
            FatalError::Config(ConfigError::MissingDeviceId),
            FatalError::Config(ConfigError::ZeroTunable("button poll interval")),
            FatalError::PeripheralOpen {
                peripheral: Peripheral::Button,
                reason: String::new(),
            },
            FatalError::PeripheralOpen {
                peripheral: Peripheral::Sensor,
                reason: String::new(),
            },
        ];

        let mut codes: Vec<u8> = errors.iter().map(FatalError::exit_code).collect();
        codes.sort_unstable();
        let before = codes.len();
        codes.dedup();
        assert_eq!(codes.len(), before);
        assert!(codes.iter().all(|&code| code != 0));
    }
}
