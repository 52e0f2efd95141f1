use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::cli::Cli;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("connection type must be \"DPS\" or \"Direct\"")]
    ConnectionType,

    #[error("DPS connections require a scope id")]
    MissingScopeId,

    #[error("direct connections require a hub hostname")]
    MissingHostname,

    #[error("direct connections require a device id")]
    MissingDeviceId,

    #[error("device id must be lowercase")]
    DeviceIdNotLowercase,

    #[error("{0} must be greater than zero")]
    ZeroTunable(&'static str),
}

/// How the device reaches its hub. Immutable once validated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Connection {
    /// Resolve the assigned hub through the provisioning service.
    Dps { scope_id: String },
    /// Connect straight to a known hub with a device identity.
    Direct { hostname: String, device_id: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub connection: Connection,
    pub default_poll_period: Duration,
    pub min_reconnect_period: Duration,
    pub max_reconnect_period: Duration,
    pub polls_per_telemetry: u32,
    pub button_poll_interval: Duration,
    pub net_interface: String,
}

impl Config {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let connection = match cli.connection_type.as_deref() {
            Some("DPS") => {
                let scope_id = cli.scope_id.ok_or(ConfigError::MissingScopeId)?;
                info!(%scope_id, "using DPS connection");
                Connection::Dps { scope_id }
            }
            Some("Direct") => {
                let hostname = cli.hostname.ok_or(ConfigError::MissingHostname)?;
                let device_id = cli.device_id.ok_or(ConfigError::MissingDeviceId)?;
                if device_id.chars().any(|c| c.is_uppercase()) {
                    return Err(ConfigError::DeviceIdNotLowercase);
                }
                info!(%hostname, "using direct connection");
                Connection::Direct {
                    hostname,
                    device_id,
                }
            }
            _ => return Err(ConfigError::ConnectionType),
        };

        // A zero period would panic the loop timers; catch it here so the
        // process exits with a configuration code instead.
        for (name, period) in [
            ("default poll period", cli.default_poll_period),
            ("min reconnect period", cli.min_reconnect_period),
            ("max reconnect period", cli.max_reconnect_period),
            ("button poll interval", cli.button_poll_interval),
        ] {
            if period.is_zero() {
                return Err(ConfigError::ZeroTunable(name));
            }
        }
        if cli.polls_per_telemetry == 0 {
            return Err(ConfigError::ZeroTunable("polls per telemetry"));
        }

        Ok(Self {
            connection,
            default_poll_period: cli.default_poll_period,
            min_reconnect_period: cli.min_reconnect_period,
            max_reconnect_period: cli.max_reconnect_period,
            polls_per_telemetry: cli.polls_per_telemetry,
            button_poll_interval: cli.button_poll_interval,
            net_interface: cli.net_interface,
        })
    }
}
