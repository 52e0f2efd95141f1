//! Connection state machine for the cloud session.
//!
//! Authentication is asynchronous: dispatching setup only moves the link to
//! `AuthenticationInitiated`; the transport confirms (or denies) through a
//! status event later. The link owns the session handle and destroys it
//! before every fresh attempt, so at most one handle is ever live.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Connection;
use crate::twin;

use super::session::{ConnectionStatus, Session, SessionEvent, Transport};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthState {
    /// No session, or the last one was rejected or expired.
    NotAuthenticated,
    /// Setup was dispatched and the link is waiting for the asynchronous
    /// confirmation. Prevents re-entrant setup attempts.
    AuthenticationInitiated,
    Authenticated,
}

/// What a call to [`CloudLink::maybe_begin_setup`] did.
pub enum SetupOutcome {
    /// A fresh attempt was dispatched; the caller should reset the poll
    /// period and start consuming the new session's events.
    Started(mpsc::UnboundedReceiver<SessionEvent>),
    /// Dispatch failed; the caller should widen the poll period.
    Failed,
    /// An attempt is already outstanding or the link is up.
    Skipped,
}

pub struct CloudLink<T: Transport> {
    transport: T,
    connection: Connection,
    auth: AuthState,
    session: Option<T::Session>,
}

impl<T: Transport> CloudLink<T> {
    pub fn new(transport: T, connection: Connection) -> Self {
        Self {
            transport,
            connection,
            auth: AuthState::NotAuthenticated,
            session: None,
        }
    }

    pub fn auth(&self) -> AuthState {
        self.auth
    }

    /// Dispatches session setup if, and only if, no session is live and no
    /// attempt is outstanding. A session token can expire at any time, so
    /// this is called on every poll tick rather than once at startup.
    pub fn maybe_begin_setup(&mut self) -> SetupOutcome {
        if self.auth != AuthState::NotAuthenticated {
            return SetupOutcome::Skipped;
        }

        // An expired or rejected handle must be gone before a new attempt.
        self.session = None;

        let dispatched = match &self.connection {
            Connection::Dps { scope_id } => self.transport.connect_dps(scope_id),
            Connection::Direct {
                hostname,
                device_id,
            } => self.transport.connect_direct(hostname, device_id),
        };

        match dispatched {
            Ok((session, events)) => {
                // Set synchronously, before any confirmation can arrive.
                self.auth = AuthState::AuthenticationInitiated;
                self.session = Some(session);
                debug!("cloud session setup dispatched");
                SetupOutcome::Started(events)
            }
            Err(err) => {
                warn!("cloud session setup failed: {err}");
                SetupOutcome::Failed
            }
        }
    }

    /// Consumes an asynchronous connection status event. Anything short of
    /// full authentication drops the link back to `NotAuthenticated`,
    /// including while a pending setup confirmation is still awaited.
    pub fn on_status(&mut self, status: ConnectionStatus) {
        match status {
            ConnectionStatus::Authenticated => {
                info!("cloud connection authenticated");
                self.auth = AuthState::Authenticated;
                // Announce static device metadata once per authentication.
                self.report_state(&twin::device_info());
            }
            ConnectionStatus::Disconnected(reason) => {
                warn!("cloud connection status: {reason}");
                self.auth = AuthState::NotAuthenticated;
            }
        }
    }

    /// Queues one telemetry message. Dropped with a warning when the link
    /// is not authenticated; failed sends are not retried or queued.
    pub fn send_telemetry(&mut self, payload: &str) {
        if self.auth != AuthState::Authenticated {
            warn!("not authenticated, dropping telemetry");
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match session.send_telemetry(payload) {
            Ok(()) => debug!(%payload, "telemetry queued"),
            Err(err) => warn!("telemetry send failed: {err}"),
        }
    }

    /// Queues one reported-state document.
    pub fn report_state(&mut self, payload: &str) {
        let Some(session) = self.session.as_mut() else {
            warn!("no cloud session, dropping state report");
            return;
        };
        match session.report_state(payload) {
            Ok(()) => debug!(%payload, "state report queued"),
            Err(err) => warn!("state report failed: {err}"),
        }
    }

    /// Pumps the transport's queued work. No-op without a session.
    pub fn pump(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.pump();
        }
    }
}
