use std::process::ExitCode;

use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use twinlink::cli;
use twinlink::cloud::SimTransport;
use twinlink::config::Config;
use twinlink::fatal::FatalError;
use twinlink::net::InterfaceProbe;
use twinlink::scheduler::DeviceLoop;

fn init_tracing() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .event_format(fmt::format().compact().with_target(false))
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// Translates process signals into a broadcast that the device loop
/// listens on. The sender half lives in the spawned task; every receiver
/// sees `RecvError::Closed` if that task somehow dies first, which the
/// loop treats as a fault rather than a clean shutdown.
fn spawn_signal_listener() -> broadcast::Receiver<()> {
    let (tx, rx) = broadcast::channel(1);

    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(stream) => stream,
                Err(err) => {
                    error!("could not install SIGTERM handler: {err}");
                    return;
                }
            };

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }

        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }

        let _ = tx.send(());
    });

    rx
}

#[cfg(not(feature = "pi"))]
mod peripherals {
    use twinlink::fatal::FatalError;
    use twinlink::hw::{Button, LedBank, SimInput, SimOutput, SimulatedSensor};
    use tracing::info;

    pub type Input = SimInput;
    pub type Output = SimOutput;
    pub type Sensor = SimulatedSensor;

    pub fn open() -> Result<(Button<Input>, LedBank<Output>, Sensor), FatalError> {
        info!("using simulated peripherals");

        let button = Button::new(SimInput);
        let leds = LedBank::new(
            SimOutput::new("status"),
            SimOutput::new("red"),
            SimOutput::new("green"),
            SimOutput::new("blue"),
        );

        Ok((button, leds, SimulatedSensor::default()))
    }
}

#[cfg(feature = "pi")]
mod peripherals {
    use twinlink::fatal::{FatalError, Peripheral};
    use twinlink::hw::pi::{self, PiInput, PiOutput, Sht31};
    use twinlink::hw::{Button, LedBank};

    pub type Input = PiInput;
    pub type Output = PiOutput;
    pub type Sensor = Sht31;

    fn open_failed(peripheral: Peripheral, err: impl std::fmt::Display) -> FatalError {
        FatalError::PeripheralOpen {
            peripheral,
            reason: err.to_string(),
        }
    }

    pub fn open() -> Result<(Button<Input>, LedBank<Output>, Sensor), FatalError> {
        let button = Button::new(
            PiInput::open(pi::BUTTON_PIN).map_err(|e| open_failed(Peripheral::Button, e))?,
        );

        let leds = LedBank::new(
            PiOutput::open(pi::STATUS_LED_PIN)
                .map_err(|e| open_failed(Peripheral::StatusLed, e))?,
            PiOutput::open(pi::RED_LED_PIN).map_err(|e| open_failed(Peripheral::RedLed, e))?,
            PiOutput::open(pi::GREEN_LED_PIN).map_err(|e| open_failed(Peripheral::GreenLed, e))?,
            PiOutput::open(pi::BLUE_LED_PIN).map_err(|e| open_failed(Peripheral::BlueLed, e))?,
        );

        let sensor = Sht31::open().map_err(|e| open_failed(Peripheral::Sensor, e))?;

        Ok((button, leds, sensor))
    }
}

async fn run(cli: cli::Cli) -> Result<(), FatalError> {
    let config = Config::from_cli(cli)?;

    let (button, leds, sensor) = peripherals::open()?;
    let probe = InterfaceProbe::new(&config.net_interface);

    let shutdown = spawn_signal_listener();

    let device = DeviceLoop::new(config, SimTransport, probe, button, leds, sensor);

    device.run(shutdown).await
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = cli::parse();

    if let Err(err) = init_tracing() {
        eprintln!("could not initialize logging: {err}");
        return ExitCode::from(1);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(FatalError::Terminated) => {
            info!("terminated by signal");
            ExitCode::from(FatalError::Terminated.exit_code())
        }
        Err(err) => {
            error!("fatal: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
