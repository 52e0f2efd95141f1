//! Loopback transport for running the demo without a real broker.
//!
//! Sessions authenticate on their first work pump and acknowledge every
//! queued send on the next one, which exercises the full authentication
//! and confirmation flow end to end.

use tokio::sync::mpsc;
use tracing::{debug, info};

use super::session::{
    ConnectionStatus, SendError, SendKind, Session, SessionEvent, SetupError, Transport,
};

pub struct SimTransport;

pub struct SimSession {
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    outbox: Vec<(SendKind, String)>,
    announced: bool,
}

impl SimSession {
    fn open() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        (
            Self {
                events_tx,
                outbox: Vec::new(),
                announced: false,
            },
            events_rx,
        )
    }
}

impl Session for SimSession {
    fn send_telemetry(&mut self, payload: &str) -> Result<(), SendError> {
        self.outbox.push((SendKind::Telemetry, payload.to_string()));
        Ok(())
    }

    fn report_state(&mut self, payload: &str) -> Result<(), SendError> {
        self.outbox
            .push((SendKind::ReportedState, payload.to_string()));
        Ok(())
    }

    fn pump(&mut self) {
        if !self.announced {
            self.announced = true;
            let _ = self
                .events_tx
                .send(SessionEvent::Status(ConnectionStatus::Authenticated));
        }

        for (kind, payload) in self.outbox.drain(..) {
            debug!(%payload, "loopback delivery");
            let _ = self.events_tx.send(SessionEvent::SendConfirmation {
                kind,
                accepted: true,
            });
        }
    }
}

impl Transport for SimTransport {
    type Session = SimSession;

    fn connect_dps(
        &mut self,
        scope_id: &str,
    ) -> Result<(Self::Session, mpsc::UnboundedReceiver<SessionEvent>), SetupError> {
        info!(%scope_id, "dispatching simulated DPS provisioning");
        Ok(SimSession::open())
    }

    fn connect_direct(
        &mut self,
        hostname: &str,
        device_id: &str,
    ) -> Result<(Self::Session, mpsc::UnboundedReceiver<SessionEvent>), SetupError> {
        info!(%hostname, %device_id, "dispatching simulated direct connection");
        Ok(SimSession::open())
    }
}
