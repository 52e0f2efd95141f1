//! Transport collaborator seam.
//!
//! A [`Transport`] dispatches session setup for one of the two provisioning
//! strategies and hands back a live [`Session`] together with its event
//! channel. Sessions deliver asynchronous callbacks (connection status,
//! desired-state updates, remote commands, send confirmations) as
//! [`SessionEvent`]s consumed on the device loop, never on a separate
//! callback thread.

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Session setup could not even be initiated. Never retried inline; the
/// caller widens the poll period instead.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("provisioning failed: {0}")]
    Provisioning(String),

    #[error("hub unreachable: {0}")]
    Unreachable(String),
}

/// Why an established connection dropped back to unauthenticated. Only used
/// for logging; every reason collapses to the same state change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisconnectReason {
    ExpiredToken,
    DeviceDisabled,
    BadCredential,
    RetryExpired,
    NoNetwork,
    CommunicationError,
    NoPingResponse,
    Unknown,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisconnectReason::ExpiredToken => "token expired",
            DisconnectReason::DeviceDisabled => "device disabled",
            DisconnectReason::BadCredential => "bad credential",
            DisconnectReason::RetryExpired => "retry expired",
            DisconnectReason::NoNetwork => "no network",
            DisconnectReason::CommunicationError => "communication error",
            DisconnectReason::NoPingResponse => "no ping response",
            DisconnectReason::Unknown => "unknown reason",
        }
    }
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    Authenticated,
    Disconnected(DisconnectReason),
}

/// Which outbound queue a send confirmation refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendKind {
    Telemetry,
    ReportedState,
}

/// Response returned to the backend for a remote command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandResponse {
    pub status: i32,
    pub body: String,
}

/// Asynchronous callback delivered by the transport for a live session.
#[derive(Debug)]
pub enum SessionEvent {
    Status(ConnectionStatus),
    /// Raw desired-state document; parsing happens on the loop thread so a
    /// malformed payload can be dropped without touching any actuator.
    Desired(String),
    Command {
        name: String,
        reply: oneshot::Sender<CommandResponse>,
    },
    SendConfirmation {
        kind: SendKind,
        accepted: bool,
    },
}

#[derive(Debug, Error)]
#[error("send rejected: {0}")]
pub struct SendError(pub String);

/// Live session handle. Exactly one exists per setup attempt; it is dropped,
/// never reused, when a fresh attempt is required.
pub trait Session {
    /// Queue a telemetry message for delivery on the next work pump.
    fn send_telemetry(&mut self, payload: &str) -> Result<(), SendError>;

    /// Queue a reported-state document for delivery on the next work pump.
    fn report_state(&mut self, payload: &str) -> Result<(), SendError>;

    /// Process queued sends and receives. Must not block; no-op when there
    /// is nothing to do.
    fn pump(&mut self);
}

pub trait Transport {
    type Session: Session;

    /// Resolve the assigned hub through the provisioning service and
    /// dispatch session setup.
    fn connect_dps(
        &mut self,
        scope_id: &str,
    ) -> Result<(Self::Session, mpsc::UnboundedReceiver<SessionEvent>), SetupError>;

    /// Dispatch session setup straight to a known hub.
    fn connect_direct(
        &mut self,
        hostname: &str,
        device_id: &str,
    ) -> Result<(Self::Session, mpsc::UnboundedReceiver<SessionEvent>), SetupError>;
}
