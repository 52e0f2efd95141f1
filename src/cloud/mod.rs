/*
This module is home to everything related to the cloud backend that is
managing the device we're running on.

The transport protocol itself is an external collaborator hidden behind the
`Transport`/`Session` traits; this module owns the connection state machine
that decides when a fresh session must be set up and how asynchronous
status events move it between authentication states.
*/

mod link;
mod session;
mod sim;

pub use link::{AuthState, CloudLink, SetupOutcome};
pub use session::{
    CommandResponse, ConnectionStatus, DisconnectReason, SendError, SendKind, Session,
    SessionEvent, SetupError, Transport,
};
pub use sim::SimTransport;
