//! Sender drive loop: sample, normalize, encode, send, once per tick.
//!
//! All per-session state (current gear, calibration, mapping) lives in an
//! owned [`SessionState`] that is threaded through each tick. The loop
//! itself adds only the collaborators: input device, link, and ticker.
//!
//! ```text
//! tick ─▶ sample ─▶ gear edge ─▶ normalize ─▶ encode ─▶ send
//!                                                        │ error
//!                                                        ▼
//!                                           reconnect (blocks until up)
//! ```
//!
//! A command that fails to send is dropped, never queued: the next tick
//! after a reconnect samples the input again, so the freshest state wins.
//!
//! # Example
//!
//! ```rust
//! # tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(async {
//! use rc_link::config::Config;
//! use rc_link::hal::{MockConnector, MockInput, MockTicker};
//! use rc_link::services::{DriveLoop, SessionState, TickOutcome};
//! use rc_link::transport::TransportLink;
//!
//! let config = Config::default();
//! let (connector, _remote) = MockConnector::new();
//! let link = TransportLink::new(connector, &config.link);
//! let mut drive = DriveLoop::new(
//!     MockInput::new(),
//!     link,
//!     MockTicker::new(),
//!     SessionState::from_config(&config),
//! );
//!
//! drive.start().await;
//! let outcome = drive.step().await;
//! assert!(matches!(outcome, TickOutcome::Sent(cmd) if cmd.motor_pulse == 1500));
//! # });
//! ```

use core::future::Future;

use crate::axis::AxisNormalizer;
use crate::commands::ControlCommand;
use crate::config::Config;
use crate::encoder::CommandEncoder;
use crate::gear::{Gear, GearStateMachine};
use crate::traits::{Connector, InputDevice, InputSample, Ticker};
use crate::transport::TransportLink;

/// Everything the sender remembers between ticks.
#[derive(Clone, Debug, Default)]
pub struct SessionState {
    /// Current gear and shift-button edges.
    pub gears: GearStateMachine,
    /// Axis calibration.
    pub normalizer: AxisNormalizer,
    /// Gear-dependent pulse mapping.
    pub encoder: CommandEncoder,
}

impl SessionState {
    /// Session starting in neutral.
    pub fn new(normalizer: AxisNormalizer, encoder: CommandEncoder) -> Self {
        Self {
            gears: GearStateMachine::new(),
            normalizer,
            encoder,
        }
    }

    /// Session from the input and drive sections of `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.input.normalizer(),
            CommandEncoder::new(config.drive.motor),
        )
    }

    /// Current gear.
    pub fn gear(&self) -> Gear {
        self.gears.gear()
    }

    /// Turn one raw sample into a command, applying any shift first.
    pub fn process(&mut self, sample: &InputSample) -> ControlCommand {
        let gear = self.gears.update(sample.shift_up, sample.shift_down);
        let axes = self.normalizer.normalize(sample);
        self.encoder.encode(&axes, gear)
    }
}

/// What happened on one tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TickOutcome {
    /// The command was written to the link.
    Sent(ControlCommand),
    /// The send failed; the command was dropped and the link re-established.
    Reconnected {
        /// The command that was lost.
        dropped: ControlCommand,
        /// Connect attempts it took.
        attempts: u32,
    },
    /// The input device could not be read; nothing was sent.
    InputUnavailable,
}

/// The sender's fixed-period control loop.
pub struct DriveLoop<I, C, T>
where
    I: InputDevice,
    C: Connector,
    T: Ticker,
{
    input: I,
    link: TransportLink<C>,
    ticker: T,
    session: SessionState,
    ticks: u64,
}

impl<I, C, T> DriveLoop<I, C, T>
where
    I: InputDevice,
    C: Connector,
    T: Ticker,
{
    /// Assemble a loop from its collaborators.
    pub fn new(input: I, link: TransportLink<C>, ticker: T, session: SessionState) -> Self {
        Self {
            input,
            link,
            ticker,
            session,
            ticks: 0,
        }
    }

    /// Session state.
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// The link.
    pub fn link(&self) -> &TransportLink<C> {
        &self.link
    }

    /// Mutable access to the link.
    pub fn link_mut(&mut self) -> &mut TransportLink<C> {
        &mut self.link
    }

    /// Mutable access to the input device.
    pub fn input_mut(&mut self) -> &mut I {
        &mut self.input
    }

    /// Ticks processed so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Establish the first connection. Returns the attempts it took.
    pub async fn start(&mut self) -> u32 {
        self.link.reconnect().await
    }

    /// Process one tick without waiting for the ticker.
    pub async fn step(&mut self) -> TickOutcome {
        self.ticks += 1;

        let sample = match self.input.sample() {
            Ok(sample) => sample,
            Err(err) => {
                tracing::warn!(error = ?err, "input unavailable, skipping tick");
                return TickOutcome::InputUnavailable;
            }
        };

        let cmd = self.session.process(&sample);
        tracing::debug!(
            steering = cmd.steering_angle,
            motor = cmd.motor_pulse,
            gear = %cmd.gear,
            gas = cmd.gas,
            brake = cmd.brake,
            "sending"
        );

        match self.link.send(&cmd).await {
            Ok(()) => TickOutcome::Sent(cmd),
            Err(err) => {
                tracing::warn!(error = %err, "link lost");
                let attempts = self.link.reconnect().await;
                TickOutcome::Reconnected {
                    dropped: cmd,
                    attempts,
                }
            }
        }
    }

    /// Wait for the next tick, then process it.
    pub async fn tick(&mut self) -> TickOutcome {
        self.ticker.tick().await;
        self.step().await
    }

    /// Run ticks until `shutdown` completes. Returns the ticks processed.
    pub async fn run<S>(&mut self, shutdown: S) -> u64
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = self.tick() => {}
            }
        }
        tracing::info!(ticks = self.ticks, "drive loop stopped");
        self.ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LinkConfig;
    use crate::hal::{MockConnector, MockInput, MockRemote, MockTicker};

    fn floored(shift_up: bool) -> InputSample {
        InputSample {
            gas: -1.0,
            shift_up,
            ..InputSample::default()
        }
    }

    fn drive() -> (DriveLoop<MockInput, MockConnector, MockTicker>, MockRemote) {
        let (connector, remote) = MockConnector::new();
        let link = TransportLink::new(connector, &LinkConfig::default());
        let drive = DriveLoop::new(
            MockInput::new(),
            link,
            MockTicker::new(),
            SessionState::default(),
        );
        (drive, remote)
    }

    #[test]
    fn session_shifts_before_encoding() {
        let mut session = SessionState::default();
        let cmd = session.process(&floored(true));
        assert_eq!(cmd.gear, Gear::First);
        assert_eq!(cmd.motor_pulse, 1600);
        assert_eq!(cmd.gas, 1.0);
    }

    #[test]
    fn session_held_shift_is_one_shift() {
        let mut session = SessionState::default();
        for _ in 0..10 {
            session.process(&floored(true));
        }
        assert_eq!(session.gear(), Gear::First);
    }

    #[test]
    fn session_neutral_ignores_pedals() {
        let mut session = SessionState::default();
        let cmd = session.process(&floored(false));
        assert_eq!(cmd.gear, Gear::Neutral);
        assert_eq!(cmd.motor_pulse, 1500);
    }

    #[tokio::test]
    async fn step_sends_fresh_command() {
        let (mut drive, _remote) = drive();
        drive.start().await;
        drive.input_mut().queue(floored(true));
        let outcome = drive.step().await;
        match outcome {
            TickOutcome::Sent(cmd) => assert_eq!(cmd.gear, Gear::First),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(drive.link().records_sent(), 1);
        assert_eq!(drive.ticks(), 1);
    }

    #[tokio::test]
    async fn input_error_skips_tick() {
        let (mut drive, _remote) = drive();
        drive.start().await;
        drive.input_mut().queue_error();
        assert_eq!(drive.step().await, TickOutcome::InputUnavailable);
        assert_eq!(drive.link().records_sent(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn send_failure_reconnects_and_drops_command() {
        let (mut drive, mut remote) = drive();
        drive.start().await;
        drop(remote.next_session().await);

        let outcome = drive.step().await;
        assert!(matches!(outcome, TickOutcome::Reconnected { attempts: 1, .. }));
        assert!(drive.link().is_connected());
        assert_eq!(drive.link().sessions(), 2);

        assert!(matches!(drive.step().await, TickOutcome::Sent(_)));
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let (mut drive, _remote) = drive();
        drive.start().await;
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        tx.send(()).unwrap();
        let ticks = drive
            .run(async {
                let _ = rx.await;
            })
            .await;
        assert_eq!(ticks, drive.ticks());
    }
}
