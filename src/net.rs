//! Connectivity probe for the path to the cloud endpoint.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Connectivity {
    Internet,
    NoInternet,
}

#[derive(Debug, Error)]
pub enum ProbeError {
    /// The probe itself is temporarily unavailable; try again next tick.
    #[error("connectivity probe unavailable: {0}")]
    Transient(String),

    /// The network stack is unusable and the process cannot continue.
    #[error("connectivity probe failed: {0}")]
    Fatal(String),
}

pub trait ConnectivityProbe {
    fn status(&mut self) -> Result<Connectivity, ProbeError>;
}

/// Probe backed by the kernel's view of one network interface.
///
/// A missing interface is unrecoverable; any other read error is treated as
/// transient and the loop carries on.
pub struct InterfaceProbe {
    operstate: PathBuf,
}

impl InterfaceProbe {
    pub fn new(interface: &str) -> Self {
        Self {
            operstate: PathBuf::from(format!("/sys/class/net/{interface}/operstate")),
        }
    }

    #[cfg(test)]
    fn with_path(operstate: PathBuf) -> Self {
        Self { operstate }
    }
}

impl ConnectivityProbe for InterfaceProbe {
    fn status(&mut self) -> Result<Connectivity, ProbeError> {
        match std::fs::read_to_string(&self.operstate) {
            Ok(state) if state.trim() == "up" => Ok(Connectivity::Internet),
            Ok(_) => Ok(Connectivity::NoInternet),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(ProbeError::Fatal(format!(
                "{} does not exist",
                self.operstate.display()
            ))),
            Err(err) => Err(ProbeError::Transient(err.to_string())),
        }
    }
}
