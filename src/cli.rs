use clap::Parser;
use std::num::ParseIntError;
use std::time::Duration;

fn parse_secs(s: &str) -> Result<Duration, ParseIntError> {
    let secs: u64 = s.parse()?;
    Ok(Duration::from_secs(secs))
}

fn parse_millis(s: &str) -> Result<Duration, ParseIntError> {
    let millis: u64 = s.parse()?;
    Ok(Duration::from_millis(millis))
}

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)] // read from Cargo.toml
pub struct Cli {
    /// How to reach the device-management endpoint: "DPS" or "Direct"
    #[arg(
        env = "TWINLINK_CONNECTION_TYPE",
        long = "connection-type",
        value_name = "type"
    )]
    pub connection_type: Option<String>,

    /// Provisioning service scope identifier (DPS connections)
    #[arg(env = "TWINLINK_SCOPE_ID", long = "scope-id", value_name = "id")]
    pub scope_id: Option<String>,

    /// Hub hostname (Direct connections)
    #[arg(env = "TWINLINK_HUB_HOSTNAME", long = "hostname", value_name = "host")]
    pub hostname: Option<String>,

    /// Device identifier, must be lowercase (Direct connections)
    #[arg(env = "TWINLINK_DEVICE_ID", long = "device-id", value_name = "id")]
    pub device_id: Option<String>,

    /// Cloud poll period while the link is healthy, in seconds
    #[arg(
        env = "TWINLINK_DEFAULT_POLL_PERIOD_S",
        long = "default-poll-period-s",
        value_name = "secs",
        value_parser = parse_secs,
        default_value = "2"
    )]
    pub default_poll_period: Duration,

    /// Poll period after the first failed reconnect, in seconds
    #[arg(
        env = "TWINLINK_MIN_RECONNECT_PERIOD_S",
        long = "min-reconnect-period-s",
        value_name = "secs",
        value_parser = parse_secs,
        default_value = "60"
    )]
    pub min_reconnect_period: Duration,

    /// Backoff ceiling for the reconnect poll period, in seconds
    #[arg(
        env = "TWINLINK_MAX_RECONNECT_PERIOD_S",
        long = "max-reconnect-period-s",
        value_name = "secs",
        value_parser = parse_secs,
        default_value = "600"
    )]
    pub max_reconnect_period: Duration,

    /// Number of cloud poll ticks between telemetry emissions
    #[arg(
        env = "TWINLINK_POLLS_PER_TELEMETRY",
        long = "polls-per-telemetry",
        value_name = "int",
        default_value = "10"
    )]
    pub polls_per_telemetry: u32,

    /// Button sampling interval in milliseconds
    #[arg(
        env = "TWINLINK_BUTTON_POLL_INTERVAL_MS",
        long = "button-poll-interval-ms",
        value_name = "ms",
        value_parser = parse_millis,
        default_value = "10"
    )]
    pub button_poll_interval: Duration,

    /// Network interface watched by the connectivity probe
    #[arg(
        env = "TWINLINK_NET_INTERFACE",
        long = "net-interface",
        value_name = "iface",
        default_value = "wlan0"
    )]
    pub net_interface: String,
}

pub fn parse() -> Cli {
    Parser::parse()
}
