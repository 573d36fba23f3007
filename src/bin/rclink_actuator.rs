//! On-car actuator receiver.
//!
//! Listens for one sender at a time, re-clamps every record, and drives
//! the steering servo and ESC. Any disconnect, stall, or shutdown puts the
//! car in the safe state (motor neutral, steering centred).
//!
//! ```bash
//! # Desktop: log pulses instead of driving pins
//! RUST_LOG=rc_link=debug rclink-actuator --backend simulated
//!
//! # On the Pi (build with --features rpi)
//! rclink-actuator --backend rpi --config car.json
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use rc_link::actuator::ActuatorController;
use rc_link::config::Config;
use rc_link::hal::{SimulatedOutput, TcpAcceptor};
use rc_link::services::ActuatorServer;
use rc_link::traits::PulseOutput;
use tracing_subscriber::EnvFilter;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Backend {
    /// Log pulses only
    Simulated,
    /// Raspberry Pi hardware PWM
    Rpi,
}

#[derive(Parser, Debug)]
#[command(name = "rclink-actuator", version, about = "Drive an RC car's servo and ESC from a sender")]
struct Opts {
    /// JSON config file
    #[arg(long, env = "RCLINK_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address
    #[arg(long, env = "RCLINK_LISTEN")]
    listen: Option<String>,

    /// Listen port
    #[arg(long, env = "RCLINK_PORT")]
    port: Option<u16>,

    /// Pulse output backend
    #[arg(long, value_enum, env = "RCLINK_BACKEND", default_value = "simulated")]
    backend: Backend,
}

impl Opts {
    fn load_config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_json_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => Config::default(),
        };
        if let Some(listen) = &self.listen {
            config.link = config.link.with_listen(listen);
        }
        if let Some(port) = self.port {
            config.link = config.link.with_port(port);
        }
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

async fn ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("interrupt received");
}

async fn serve<P: PulseOutput>(config: &Config, output: P) -> anyhow::Result<()> {
    let shutdown = ctrl_c();
    tokio::pin!(shutdown);

    // Outputs first, socket second.
    let mut controller = ActuatorController::new(output, config.actuator);

    let bind = config.link.bind_address();
    let acceptor = tokio::select! {
        _ = &mut shutdown => {
            return controller
                .shutdown()
                .map_err(|err| anyhow::anyhow!("releasing outputs: {err:?}"));
        }
        bound = TcpAcceptor::bind(&bind) => bound.with_context(|| format!("binding {bind}"))?,
    };
    tracing::info!(addr = %bind, "listening");

    let mut server = ActuatorServer::new(acceptor, controller);
    let result = match server.arm_until(&mut shutdown).await {
        Ok(true) => server.run(&mut shutdown).await,
        Ok(false) => Ok(()),
        Err(err) => Err(err),
    };

    let stats = server.stats();
    tracing::info!(
        sessions = stats.sessions,
        records = stats.records,
        rejected = stats.rejected,
        watchdog_trips = stats.watchdog_trips,
        "receiver stopped"
    );

    server.release(result).map_err(|err| anyhow::anyhow!("{err}"))
}

#[cfg(feature = "rpi")]
async fn serve_rpi(config: &Config) -> anyhow::Result<()> {
    let output = rc_link::hal::RpiPwmOutput::open(&config.actuator).context("opening PWM")?;
    serve(config, output).await
}

#[cfg(not(feature = "rpi"))]
async fn serve_rpi(_config: &Config) -> anyhow::Result<()> {
    anyhow::bail!("this build has no Raspberry Pi support; rebuild with --features rpi")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let opts = Opts::parse();
    let config = opts.load_config()?;
    tracing::info!(backend = ?opts.backend, "starting actuator");

    match opts.backend {
        Backend::Simulated => serve(&config, SimulatedOutput::new()).await,
        Backend::Rpi => serve_rpi(&config).await,
    }
}
