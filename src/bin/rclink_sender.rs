//! Operator-station sender.
//!
//! Reads wheel/pedal samples as JSON lines on stdin, runs the virtual
//! gearbox, and streams control records to the car at a fixed tick.
//!
//! ```bash
//! # Pipe a joystick reader into the sender
//! wheel-reader | rclink-sender --host 192.168.1.40
//!
//! # Using a config file, with debug logs of every command
//! RUST_LOG=rc_link=debug rclink-sender --config car.json
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use rc_link::config::Config;
use rc_link::hal::{IntervalTicker, TcpConnector};
use rc_link::services::{DriveLoop, SessionState, StdinInput};
use rc_link::transport::TransportLink;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rclink-sender", version, about = "Stream wheel input to an RC car")]
struct Opts {
    /// JSON config file
    #[arg(long, env = "RCLINK_CONFIG")]
    config: Option<PathBuf>,

    /// Receiver host
    #[arg(long, env = "RCLINK_HOST")]
    host: Option<String>,

    /// Receiver port
    #[arg(long, env = "RCLINK_PORT")]
    port: Option<u16>,

    /// Control tick in milliseconds
    #[arg(long, env = "RCLINK_TICK_MS")]
    tick_ms: Option<u32>,

    /// Invert the steering axis
    #[arg(long, env = "RCLINK_INVERT_STEERING")]
    invert_steering: bool,
}

impl Opts {
    fn load_config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_json_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => Config::default(),
        };
        if let Some(host) = &self.host {
            config.link = config.link.with_host(host);
        }
        if let Some(port) = self.port {
            config.link = config.link.with_port(port);
        }
        if let Some(tick_ms) = self.tick_ms {
            config.drive = config.drive.with_tick_ms(tick_ms);
        }
        if self.invert_steering {
            config.input = config.input.with_steering_inverted(true);
        }
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
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

    tracing::info!(
        target_addr = %config.link.target_address(),
        tick_ms = config.drive.tick_ms,
        "starting sender"
    );

    let link = TransportLink::new(TcpConnector::from_config(&config.link), &config.link);
    let mut drive = DriveLoop::new(
        StdinInput::spawn(),
        link,
        IntervalTicker::new(config.drive.tick_ms),
        SessionState::from_config(&config),
    );

    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        tracing::info!("interrupt received");
    };
    tokio::pin!(shutdown);

    tokio::select! {
        _ = &mut shutdown => return Ok(()),
        attempts = drive.start() => {
            tracing::info!(attempts, "link established");
        }
    }

    drive.run(shutdown).await;
    Ok(())
}
