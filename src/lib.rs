//! Bridge between local device peripherals (button, temperature/humidity
//! sensor, status and RGB LEDs) and a cloud device-management endpoint.
//!
//! The interesting parts are the connection state machine in [`cloud`],
//! the reconnect policy in [`backoff`] and the poll loop in [`scheduler`];
//! the transport protocol and the peripherals are collaborators behind
//! traits.

pub mod backoff;
pub mod cli;
pub mod cloud;
pub mod config;
pub mod fatal;
pub mod hw;
pub mod net;
pub mod scheduler;
pub mod telemetry;
pub mod twin;
