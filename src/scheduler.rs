//! The device poll loop.
//!
//! One task owns every piece of mutable state (session handle, actuator
//! flags, poll period) and consumes timers and session events strictly
//! sequentially, so nothing needs a lock. The cloud timer re-arms itself
//! with the current poll period each tick, which is how the backoff policy
//! takes effect; an independent, faster ticker samples the button.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::backoff;
use crate::cloud::{AuthState, CloudLink, SessionEvent, SetupOutcome, Transport};
use crate::config::Config;
use crate::fatal::FatalError;
use crate::hw::{Button, InputPin, LedBank, OutputPin, TempHumiditySensor};
use crate::net::{Connectivity, ConnectivityProbe, ProbeError};
use crate::telemetry;
use crate::twin;

pub struct DeviceLoop<T, C, B, O, S>
where
    T: Transport,
{
    config: Config,
    link: CloudLink<T>,
    probe: C,
    button: Button<B>,
    leds: LedBank<O>,
    sensor: S,
    poll_period: Duration,
    telemetry_count: u32,
}

impl<T, C, B, O, S> DeviceLoop<T, C, B, O, S>
where
    T: Transport,
    C: ConnectivityProbe,
    B: InputPin,
    O: OutputPin,
    S: TempHumiditySensor,
{
    pub fn new(
        config: Config,
        transport: T,
        probe: C,
        button: Button<B>,
        leds: LedBank<O>,
        sensor: S,
    ) -> Self {
        let link = CloudLink::new(transport, config.connection.clone());
        let poll_period = config.default_poll_period;
        Self {
            config,
            link,
            probe,
            button,
            leds,
            sensor,
            poll_period,
            telemetry_count: 0,
        }
    }

    /// Runs until a termination request or a fatal condition. The LEDs are
    /// left dark on every exit path.
    pub async fn run(mut self, shutdown: broadcast::Receiver<()>) -> Result<(), FatalError> {
        let result = self.drive(shutdown).await;
        self.leds.all_dark();
        result
    }

    async fn drive(&mut self, mut shutdown: broadcast::Receiver<()>) -> Result<(), FatalError> {
        let mut events: Option<mpsc::UnboundedReceiver<SessionEvent>> = None;
        let mut next_cloud_tick = Instant::now() + self.poll_period;
        let mut button_ticker = interval(self.config.button_poll_interval);
        button_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                received = shutdown.recv() => {
                    return match received {
                        Ok(()) => {
                            info!("termination requested, shutting down");
                            Err(FatalError::Terminated)
                        }
                        Err(_) => Err(FatalError::EventLoop(
                            "shutdown channel closed".to_string(),
                        )),
                    };
                }

                _ = sleep_until(next_cloud_tick) => {
                    if let Some(fresh) = self.cloud_tick()? {
                        events = Some(fresh);
                    }
                    next_cloud_tick = Instant::now() + self.poll_period;
                }

                _ = button_ticker.tick() => {
                    self.button_tick()?;
                }

                event = Self::next_event(&mut events) => {
                    match event {
                        Some(event) => self.on_session_event(event),
                        // The transport dropped its end; status events will
                        // drive reconnection.
                        None => events = None,
                    }
                }
            }
        }
    }

    async fn next_event(
        events: &mut Option<mpsc::UnboundedReceiver<SessionEvent>>,
    ) -> Option<SessionEvent> {
        match events {
            Some(receiver) => receiver.recv().await,
            None => std::future::pending().await,
        }
    }

    /// One cloud timer tick: probe connectivity, begin session setup when
    /// needed, emit telemetry on the sub-sampled cadence, pump the
    /// transport.
    fn cloud_tick(
        &mut self,
    ) -> Result<Option<mpsc::UnboundedReceiver<SessionEvent>>, FatalError> {
        let mut fresh_events = None;

        match self.probe.status() {
            Ok(Connectivity::Internet) => match self.link.maybe_begin_setup() {
                SetupOutcome::Started(events) => {
                    self.poll_period = self.next_period(true);
                    fresh_events = Some(events);
                }
                SetupOutcome::Failed => {
                    self.poll_period = self.next_period(false);
                    warn!("will retry cloud setup in {:?}", self.poll_period);
                }
                SetupOutcome::Skipped => {}
            },
            Ok(Connectivity::NoInternet) => {}
            Err(ProbeError::Transient(reason)) => {
                debug!("connectivity probe unavailable: {reason}");
                self.link.pump();
                return Ok(None);
            }
            Err(ProbeError::Fatal(reason)) => return Err(FatalError::Probe(reason)),
        }

        if self.link.auth() == AuthState::Authenticated {
            self.telemetry_count += 1;
            if self.telemetry_count >= self.config.polls_per_telemetry {
                self.telemetry_count = 0;
                self.emit_telemetry();
            }
        }

        self.link.pump();
        Ok(fresh_events)
    }

    fn next_period(&self, succeeded: bool) -> Duration {
        backoff::next_poll_period(
            self.poll_period,
            self.config.default_poll_period,
            self.config.min_reconnect_period,
            self.config.max_reconnect_period,
            succeeded,
        )
    }

    fn emit_telemetry(&mut self) {
        match self.sensor.read() {
            Ok(reading) => {
                debug!(
                    temperature = reading.temperature,
                    humidity = reading.humidity,
                    "sensor sample"
                );
                self.link
                    .send_telemetry(&telemetry::temperature(reading.temperature));
                self.link
                    .send_telemetry(&telemetry::humidity(reading.humidity));
            }
            Err(err) => warn!("{err}"),
        }
    }

    /// One button ticker tick. A press is forwarded only while the link is
    /// authenticated and connectivity is confirmed; otherwise it is
    /// dropped, not queued.
    fn button_tick(&mut self) -> Result<(), FatalError> {
        let pressed = self
            .button
            .pressed_edge()
            .map_err(FatalError::ButtonRead)?;
        if !pressed {
            return Ok(());
        }

        if self.link.auth() != AuthState::Authenticated {
            debug!("button press dropped, not authenticated");
            return Ok(());
        }
        match self.probe.status() {
            Ok(Connectivity::Internet) => self.link.send_telemetry(telemetry::button_press()),
            Ok(Connectivity::NoInternet) | Err(ProbeError::Transient(_)) => {
                debug!("button press dropped, no connectivity");
            }
            Err(ProbeError::Fatal(reason)) => return Err(FatalError::Probe(reason)),
        }
        Ok(())
    }

    fn on_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Status(status) => self.link.on_status(status),
            SessionEvent::Desired(payload) => {
                if let Some(reports) = twin::reconcile(&payload, &mut self.leds) {
                    for report in reports {
                        self.link.report_state(&report);
                    }
                }
            }
            SessionEvent::Command { name, reply } => {
                info!(command = %name, "remote command received");
                let _ = reply.send(twin::handle_command(&name));
            }
            SessionEvent::SendConfirmation { kind, accepted } => {
                // Failed sends are logged and never resubmitted.
                if accepted {
                    debug!(?kind, "send confirmed");
                } else {
                    warn!(?kind, "send rejected by transport");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::{SendError, SendKind, Session, SetupError};
    use crate::config::Connection;
    use crate::hw::{Level, PinError};
    use std::sync::{Arc, Mutex};
    use tokio::time::timeout;

    #[derive(Clone, Default)]
    struct Outbox(Arc<Mutex<Vec<(SendKind, String)>>>);

    impl Outbox {
        fn take(&self) -> Vec<(SendKind, String)> {
            std::mem::take(&mut self.0.lock().unwrap())
        }
    }

    struct AutoAuthSession {
        events_tx: mpsc::UnboundedSender<SessionEvent>,
        outbox: Outbox,
        announced: bool,
    }

    impl Session for AutoAuthSession {
        fn send_telemetry(&mut self, payload: &str) -> Result<(), SendError> {
            self.outbox
                .0
                .lock()
                .unwrap()
                .push((SendKind::Telemetry, payload.to_string()));
            Ok(())
        }

        fn report_state(&mut self, payload: &str) -> Result<(), SendError> {
            self.outbox
                .0
                .lock()
                .unwrap()
                .push((SendKind::ReportedState, payload.to_string()));
            Ok(())
        }

        fn pump(&mut self) {
            if !self.announced {
                self.announced = true;
                let _ = self
                    .events_tx
                    .send(SessionEvent::Status(crate::cloud::ConnectionStatus::Authenticated));
            }
        }
    }

    struct FakeTransport {
        fail: bool,
        outbox: Outbox,
        attempts: Arc<Mutex<Vec<Instant>>>,
    }

    impl FakeTransport {
        fn succeeding(outbox: Outbox) -> Self {
            Self {
                fail: false,
                outbox,
                attempts: Arc::default(),
            }
        }

        fn failing() -> (Self, Arc<Mutex<Vec<Instant>>>) {
            let attempts: Arc<Mutex<Vec<Instant>>> = Arc::default();
            (
                Self {
                    fail: true,
                    outbox: Outbox::default(),
                    attempts: Arc::clone(&attempts),
                },
                attempts,
            )
        }
    }

    impl Transport for FakeTransport {
        type Session = AutoAuthSession;

        fn connect_dps(
            &mut self,
            _scope_id: &str,
        ) -> Result<(Self::Session, mpsc::UnboundedReceiver<SessionEvent>), SetupError> {
            self.attempts.lock().unwrap().push(Instant::now());
            if self.fail {
                return Err(SetupError::Provisioning("scripted failure".to_string()));
            }
            let (events_tx, events_rx) = mpsc::unbounded_channel();
            Ok((
                AutoAuthSession {
                    events_tx,
                    outbox: self.outbox.clone(),
                    announced: false,
                },
                events_rx,
            ))
        }

        fn connect_direct(
            &mut self,
            _hostname: &str,
            _device_id: &str,
        ) -> Result<(Self::Session, mpsc::UnboundedReceiver<SessionEvent>), SetupError> {
            self.connect_dps("")
        }
    }

    struct ConstProbe(Result<Connectivity, ()>);

    impl ConnectivityProbe for ConstProbe {
        fn status(&mut self) -> Result<Connectivity, ProbeError> {
            match self.0 {
                Ok(connectivity) => Ok(connectivity),
                Err(()) => Err(ProbeError::Fatal("scripted".to_string())),
            }
        }
    }

    struct ScriptedPin {
        samples: Vec<Level>,
        index: usize,
    }

    impl ScriptedPin {
        fn new(samples: &[Level]) -> Self {
            Self {
                samples: samples.to_vec(),
                index: 0,
            }
        }
    }

    impl InputPin for ScriptedPin {
        fn read(&mut self) -> Result<Level, PinError> {
            let sample = self.samples[self.index.min(self.samples.len() - 1)];
            self.index += 1;
            Ok(sample)
        }
    }

    struct NullPin;
    impl OutputPin for NullPin {
        fn write(&mut self, _level: Level) {}
    }

    struct FixedSensor;
    impl TempHumiditySensor for FixedSensor {
        fn read(&mut self) -> Result<crate::hw::Reading, crate::hw::SensorError> {
            Ok(crate::hw::Reading {
                temperature: 21.5,
                humidity: 40.0,
            })
        }
    }

    fn test_config(polls_per_telemetry: u32) -> Config {
        Config {
            connection: Connection::Dps {
                scope_id: "0ne0042".to_string(),
            },
            default_poll_period: Duration::from_secs(2),
            min_reconnect_period: Duration::from_secs(60),
            max_reconnect_period: Duration::from_secs(600),
            polls_per_telemetry,
            // Kept long so loop tests are not dominated by button ticks.
            button_poll_interval: Duration::from_secs(3600),
            net_interface: "wlan0".to_string(),
        }
    }

    fn device_loop(
        config: Config,
        transport: FakeTransport,
        probe: ConstProbe,
        pin: ScriptedPin,
    ) -> DeviceLoop<FakeTransport, ConstProbe, ScriptedPin, NullPin, FixedSensor> {
        DeviceLoop::new(
            config,
            transport,
            probe,
            Button::new(pin),
            LedBank::new(NullPin, NullPin, NullPin, NullPin),
            FixedSensor,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn authenticates_then_emits_telemetry_on_the_cadence() {
        let outbox = Outbox::default();
        let device = device_loop(
            test_config(3),
            FakeTransport::succeeding(outbox.clone()),
            ConstProbe(Ok(Connectivity::Internet)),
            ScriptedPin::new(&[Level::High]),
        );
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        // Setup at t=2s, cadence ticks at 4/6/8s; telemetry due at t=8s.
        let _ = timeout(Duration::from_secs(9), device.run(shutdown_rx)).await;

        let sent = outbox.take();
        assert_eq!(
            sent[0],
            (SendKind::ReportedState, twin::device_info()),
            "static metadata must be reported on authentication"
        );
        let telemetry: Vec<&str> = sent
            .iter()
            .filter(|(kind, _)| *kind == SendKind::Telemetry)
            .map(|(_, payload)| payload.as_str())
            .collect();
        assert_eq!(
            telemetry,
            vec!["{\"Temperature\":21.50}", "{\"Humidity\":40.00}"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_setup_attempts_back_off_exponentially() {
        let (transport, attempts) = FakeTransport::failing();
        let device = device_loop(
            test_config(10),
            transport,
            ConstProbe(Ok(Connectivity::Internet)),
            ScriptedPin::new(&[Level::High]),
        );
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let start = Instant::now();
        // Attempts land at t = 2, 62, 182, 422 seconds.
        let _ = timeout(Duration::from_secs(430), device.run(shutdown_rx)).await;

        let offsets: Vec<u64> = attempts
            .lock()
            .unwrap()
            .iter()
            .map(|at| at.duration_since(start).as_secs())
            .collect();
        assert_eq!(offsets, vec![2, 62, 182, 422]);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_request_exits_with_the_termination_code() {
        let device = device_loop(
            test_config(10),
            FakeTransport::succeeding(Outbox::default()),
            ConstProbe(Ok(Connectivity::Internet)),
            ScriptedPin::new(&[Level::High]),
        );
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = tokio::spawn(device.run(shutdown_rx));
        tokio::task::yield_now().await;
        shutdown_tx.send(()).unwrap();

        let result = handle.await.unwrap();
        let error = result.unwrap_err();
        assert!(matches!(error, FatalError::Terminated));
        assert_eq!(error.exit_code(), 1);
    }

    #[tokio::test]
    async fn fatal_probe_errors_abort_the_tick() {
        let mut device = device_loop(
            test_config(10),
            FakeTransport::succeeding(Outbox::default()),
            ConstProbe(Err(())),
            ScriptedPin::new(&[Level::High]),
        );

        let error = device.cloud_tick().unwrap_err();
        assert!(matches!(error, FatalError::Probe(_)));
    }

    #[tokio::test]
    async fn button_press_is_dropped_until_authenticated() {
        let outbox = Outbox::default();
        let mut device = device_loop(
            test_config(10),
            FakeTransport::succeeding(outbox.clone()),
            ConstProbe(Ok(Connectivity::Internet)),
            ScriptedPin::new(&[Level::Low, Level::High, Level::Low]),
        );

        // Press edge while not authenticated: dropped.
        device.button_tick().unwrap();
        assert!(outbox.take().is_empty());

        // Authenticate the link, then press again.
        let _ = device.cloud_tick().unwrap();
        device
            .link
            .on_status(crate::cloud::ConnectionStatus::Authenticated);
        outbox.take(); // discard the metadata report

        device.button_tick().unwrap(); // release sample
        device.button_tick().unwrap(); // press edge
        let sent = outbox.take();
        assert_eq!(
            sent,
            vec![(SendKind::Telemetry, "{\"ButtonPress\":\"True\"}".to_string())]
        );
    }

    #[tokio::test]
    async fn button_press_is_dropped_without_connectivity() {
        let outbox = Outbox::default();
        let mut device = device_loop(
            test_config(10),
            FakeTransport::succeeding(outbox.clone()),
            ConstProbe(Ok(Connectivity::Internet)),
            ScriptedPin::new(&[Level::Low]),
        );

        let _ = device.cloud_tick().unwrap();
        device
            .link
            .on_status(crate::cloud::ConnectionStatus::Authenticated);
        outbox.take(); // discard the metadata report
        device.probe = ConstProbe(Ok(Connectivity::NoInternet));

        device.button_tick().unwrap();
        assert!(outbox.take().is_empty());
    }

    #[tokio::test]
    async fn desired_state_events_drive_reports() {
        let outbox = Outbox::default();
        let mut device = device_loop(
            test_config(10),
            FakeTransport::succeeding(outbox.clone()),
            ConstProbe(Ok(Connectivity::Internet)),
            ScriptedPin::new(&[Level::High]),
        );
        let _ = device.cloud_tick().unwrap();
        outbox.take();

        device.on_session_event(SessionEvent::Desired(
            r#"{"desired":{"StatusLED":true}}"#.to_string(),
        ));

        let reports: Vec<String> = outbox
            .take()
            .into_iter()
            .filter(|(kind, _)| *kind == SendKind::ReportedState)
            .map(|(_, payload)| payload)
            .collect();
        assert_eq!(
            reports,
            vec![
                "{\"StatusLED\":true}",
                "{\"RLED\":false}",
                "{\"GLED\":false}",
                "{\"BLED\":false}",
            ]
        );
    }

    #[tokio::test]
    async fn commands_are_answered_through_the_reply_channel() {
        let mut device = device_loop(
            test_config(10),
            FakeTransport::succeeding(Outbox::default()),
            ConstProbe(Ok(Connectivity::Internet)),
            ScriptedPin::new(&[Level::High]),
        );

        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        device.on_session_event(SessionEvent::Command {
            name: "TriggerAlarm".to_string(),
            reply: reply_tx,
        });
        let response = reply_rx.await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "\"Alarm Triggered\"");

        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        device.on_session_event(SessionEvent::Command {
            name: "Reboot".to_string(),
            reply: reply_tx,
        });
        let response = reply_rx.await.unwrap();
        assert!(response.status < 0);
        assert_eq!(response.body, "{}");
    }
}
